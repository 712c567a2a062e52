use chrono::{DateTime, Utc};
use dzgold_market_data::{DashboardState, DashboardStatus, KaratMetric};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricView {
    #[serde(flatten)]
    pub metric: KaratMetric,
    pub label: &'static str,
    pub change_percent_display: Option<String>,
}

impl From<&KaratMetric> for MetricView {
    fn from(metric: &KaratMetric) -> Self {
        Self {
            label: metric.karat.label(),
            change_percent_display: metric.change_percent_display(),
            metric: metric.clone(),
        }
    }
}

/// Dashboard payload served to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub status: DashboardStatus,
    pub last_successful_update: Option<DateTime<Utc>>,
    pub metrics: Vec<MetricView>,
}

impl From<&DashboardState> for DashboardView {
    fn from(state: &DashboardState) -> Self {
        Self {
            status: state.status.clone(),
            last_successful_update: state.last_successful_update,
            metrics: state.metrics.iter().map(MetricView::from).collect(),
        }
    }
}
