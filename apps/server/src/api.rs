use std::{convert::Infallible, sync::Arc};

use axum::http::{HeaderValue, StatusCode};
use axum::{
    extract::{Path, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use dzgold_market_data::{chart::NormalizedSeries, Karat};
use futures_core::stream::Stream;
use serde::Serialize;
use serde_json::json;
use tokio_stream::wrappers::WatchStream;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    main_lib::AppState,
    models::DashboardView,
};

pub async fn healthz() -> &'static str {
    "ok"
}

/// Latest published dashboard state.
async fn get_dashboard(State(state): State<Arc<AppState>>) -> Json<DashboardView> {
    let current = state.scheduler.current_state();
    Json(DashboardView::from(current.as_ref()))
}

/// Every published state as a server-sent event, starting with the current one.
async fn stream_dashboard(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let updates = WatchStream::new(state.scheduler.watch());
    let stream = tokio_stream::StreamExt::filter_map(updates, |dashboard| {
        match SseEvent::default()
            .event("dashboard")
            .json_data(DashboardView::from(dashboard.as_ref()))
        {
            Ok(event) => Some(Ok(event)),
            Err(err) => {
                tracing::error!("Failed to serialize dashboard event: {}", err);
                None
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Normalized chart bars for one karat, e.g. `/chart/24k` or `/chart/24`.
async fn get_chart(
    State(state): State<Arc<AppState>>,
    Path(karat): Path<String>,
) -> ApiResult<Json<NormalizedSeries>> {
    let karat: Karat = karat.parse().map_err(ApiError::BadRequest)?;
    if !state.refresh.karats.contains(&karat) {
        return Err(ApiError::NotFound);
    }
    Ok(Json(state.chart.normalized(karat)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SchedulerStatus {
    phase: String,
    running: bool,
    ticks: u64,
    dropped_ticks: u64,
    poll_interval_ms: u128,
    stale_after_ms: u128,
}

async fn get_scheduler_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    let scheduler = &state.scheduler;
    Json(SchedulerStatus {
        phase: scheduler.phase().to_string(),
        running: scheduler.is_running(),
        ticks: scheduler.ticks(),
        dropped_ticks: scheduler.dropped_ticks(),
        poll_interval_ms: state.refresh.poll_interval.as_millis(),
        stale_after_ms: state.refresh.stale_after().as_millis(),
    })
}

/// Run a cycle outside the timer. 409 while one is in flight.
async fn refresh_now(
    State(state): State<Arc<AppState>>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    if state.scheduler.refresh_now() {
        Ok((StatusCode::ACCEPTED, Json(json!({ "started": true }))))
    } else {
        Err(ApiError::Conflict("A refresh is already in progress".to_string()))
    }
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", o);
                    None
                }
            })
            .collect::<Vec<HeaderValue>>();
        CorsLayer::new().allow_origin(origins)
    };

    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/dashboard", get(get_dashboard))
        .route("/dashboard/stream", get(stream_dashboard))
        .route("/chart/{karat}", get(get_chart))
        .route("/scheduler", get(get_scheduler_status))
        .route("/refresh", post(refresh_now));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
}
