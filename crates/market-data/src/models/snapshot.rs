use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::karat::Karat;

/// Point-in-time set of per-karat prices (currency units per gram).
///
/// Immutable once constructed. Construction does not validate the prices;
/// the fetcher and the metrics engine reject snapshots that are missing a
/// karat or carry a non-positive price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    timestamp: DateTime<Utc>,
    prices: BTreeMap<Karat, Decimal>,
}

impl PriceSnapshot {
    pub fn new(
        timestamp: DateTime<Utc>,
        prices: impl IntoIterator<Item = (Karat, Decimal)>,
    ) -> Self {
        Self {
            timestamp,
            prices: prices.into_iter().collect(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Price for a karat, if present.
    pub fn price(&self, karat: Karat) -> Option<Decimal> {
        self.prices.get(&karat).copied()
    }

    pub fn prices(&self) -> &BTreeMap<Karat, Decimal> {
        &self.prices
    }
}
