use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::karat::Karat;
use super::metric::KaratMetric;

/// Freshness of the published dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason")]
pub enum DashboardStatus {
    /// No cycle has completed yet.
    Loading,
    /// Metrics reflect a recently accepted snapshot.
    Ready,
    /// Last accepted snapshot is older than the staleness threshold.
    Stale,
    /// The last cycle failed; metrics are the last known good values.
    Error(String),
}

impl DashboardStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for DashboardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading"),
            Self::Ready => write!(f, "Ready"),
            Self::Stale => write!(f, "Stale"),
            Self::Error(reason) => write!(f, "Error({})", reason),
        }
    }
}

/// The full cross-karat view handed to subscribers.
///
/// Replaced wholesale on every cycle; consumers never see a partially
/// updated set of metrics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    /// One entry per configured karat, in karat order. Empty until the
    /// first snapshot is accepted.
    pub metrics: Vec<KaratMetric>,
    pub status: DashboardStatus,
    pub last_successful_update: Option<DateTime<Utc>>,
}

impl DashboardState {
    /// Initial state before any cycle has run.
    pub fn loading() -> Self {
        Self {
            metrics: Vec::new(),
            status: DashboardStatus::Loading,
            last_successful_update: None,
        }
    }

    /// Same metrics, different status.
    pub fn with_status(&self, status: DashboardStatus) -> Self {
        Self {
            metrics: self.metrics.clone(),
            status,
            last_successful_update: self.last_successful_update,
        }
    }

    pub fn metric(&self, karat: Karat) -> Option<&KaratMetric> {
        self.metrics.iter().find(|m| m.karat == karat)
    }

    /// Whether the last accepted snapshot is older than `stale_after` at `now`.
    ///
    /// A state that never accepted a snapshot is not considered stale.
    pub fn is_stale_at(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        self.last_successful_update
            .map(|last| now - last > stale_after)
            .unwrap_or(false)
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::loading()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ready_state(at: DateTime<Utc>) -> DashboardState {
        DashboardState {
            metrics: vec![KaratMetric {
                karat: Karat::K18,
                current_price: dec!(13900),
                change_24h: None,
                change_percent: None,
                high_24h: dec!(13900),
                low_24h: dec!(13900),
                last_updated: at,
            }],
            status: DashboardStatus::Ready,
            last_successful_update: Some(at),
        }
    }

    #[test]
    fn test_with_status_keeps_metrics() {
        let at = Utc.with_ymd_and_hms(2025, 2, 7, 10, 0, 0).unwrap();
        let state = ready_state(at);
        let failed = state.with_status(DashboardStatus::Error("boom".to_string()));

        assert_eq!(failed.metrics, state.metrics);
        assert_eq!(failed.last_successful_update, Some(at));
        assert!(failed.status.is_error());
        assert_eq!(state.status, DashboardStatus::Ready);
    }

    #[test]
    fn test_staleness_threshold_is_exclusive() {
        let at = Utc.with_ymd_and_hms(2025, 2, 7, 10, 0, 0).unwrap();
        let state = ready_state(at);
        let threshold = Duration::minutes(10);

        assert!(!state.is_stale_at(at + Duration::minutes(10), threshold));
        assert!(state.is_stale_at(at + Duration::minutes(11), threshold));
        assert!(!DashboardState::loading().is_stale_at(at, threshold));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(DashboardStatus::Error("Timeout".to_string())).unwrap();
        assert_eq!(json["kind"], "Error");
        assert_eq!(json["reason"], "Timeout");

        let json = serde_json::to_value(DashboardStatus::Ready).unwrap();
        assert_eq!(json["kind"], "Ready");
    }
}
