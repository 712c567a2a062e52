use std::sync::Arc;

use dzgold_market_data::{
    ChartSeries, HttpPriceSource, PriceSource, RefreshConfig, RefreshScheduler,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub scheduler: RefreshScheduler,
    pub chart: Arc<ChartSeries>,
    pub refresh: RefreshConfig,
}

pub fn init_tracing() {
    let log_format = std::env::var("DZG_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Wire the scheduler to the configured HTTP source. Does not start it.
pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let source = Arc::new(HttpPriceSource::new(
        config.source_url.clone(),
        config.refresh.fetch_timeout,
    ));
    tracing::info!("Price source: {}", source.url());
    build_state_with_source(source, config.refresh.clone())
}

/// Same as [`build_state`] with an explicit source.
pub fn build_state_with_source(
    source: Arc<dyn PriceSource>,
    refresh: RefreshConfig,
) -> anyhow::Result<Arc<AppState>> {
    let scheduler = RefreshScheduler::new(source, refresh.clone())?;
    let chart = Arc::new(ChartSeries::default());
    scheduler.subscribe(chart.clone());

    Ok(Arc::new(AppState {
        scheduler,
        chart,
        refresh,
    }))
}
