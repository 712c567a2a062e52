use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::karat::Karat;
use crate::chart::format_percent;

/// Derived metrics for one karat over the rolling window.
///
/// Recomputed from the window on every accepted snapshot, never patched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KaratMetric {
    pub karat: Karat,

    /// Price from the latest accepted snapshot.
    pub current_price: Decimal,

    /// `current - oldest surviving`; `None` with fewer than two window entries.
    pub change_24h: Option<Decimal>,

    /// `change_24h / oldest surviving * 100`, unrounded.
    pub change_percent: Option<f64>,

    /// Maximum price among window entries.
    pub high_24h: Decimal,

    /// Minimum price among window entries.
    pub low_24h: Decimal,

    pub last_updated: DateTime<Utc>,
}

impl KaratMetric {
    /// Percent change rounded to 2 decimals for display, e.g. `"+0.72%"`.
    pub fn change_percent_display(&self) -> Option<String> {
        self.change_percent.map(format_percent)
    }
}
