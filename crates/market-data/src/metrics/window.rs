//! Time-bounded history of accepted snapshots.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;

use crate::models::{Karat, PriceSnapshot};

/// Accepted snapshots ordered oldest to newest, bounded by a lookback
/// duration measured from the newest entry.
///
/// Eviction is driven purely by snapshot timestamps, never by the wall clock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollingWindow {
    span: TimeDelta,
    entries: VecDeque<PriceSnapshot>,
}

impl RollingWindow {
    pub fn new(span: Duration) -> Self {
        Self {
            span: TimeDelta::from_std(span).unwrap_or(TimeDelta::MAX),
            entries: VecDeque::new(),
        }
    }

    /// Appends a snapshot and evicts everything older than the window
    /// relative to it. An entry exactly one span old survives.
    ///
    /// Callers are responsible for monotonic ordering.
    pub fn push(&mut self, snapshot: PriceSnapshot) {
        let cutoff = snapshot.timestamp().checked_sub_signed(self.span);
        self.entries.push_back(snapshot);

        if let Some(cutoff) = cutoff {
            while self
                .entries
                .front()
                .is_some_and(|oldest| oldest.timestamp() < cutoff)
            {
                self.entries.pop_front();
            }
        }
    }

    pub fn latest(&self) -> Option<&PriceSnapshot> {
        self.entries.back()
    }

    pub fn oldest(&self) -> Option<&PriceSnapshot> {
        self.entries.front()
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.latest().map(PriceSnapshot::timestamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceSnapshot> {
        self.entries.iter()
    }

    /// Prices for one karat across the window, oldest first.
    pub fn prices(&self, karat: Karat) -> impl Iterator<Item = Decimal> + '_ {
        self.entries.iter().filter_map(move |s| s.price(karat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn snapshot_at(hours: i64, price: Decimal) -> PriceSnapshot {
        let base = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        PriceSnapshot::new(base + TimeDelta::hours(hours), [(Karat::K18, price)])
    }

    #[test]
    fn test_push_keeps_entries_within_span() {
        let mut window = RollingWindow::new(Duration::from_secs(24 * 3600));
        window.push(snapshot_at(0, dec!(100)));
        window.push(snapshot_at(12, dec!(110)));
        window.push(snapshot_at(24, dec!(120)));

        // Exactly 24h old survives
        assert_eq!(window.len(), 3);

        window.push(snapshot_at(25, dec!(130)));
        assert_eq!(window.len(), 3);
        assert_eq!(window.oldest().unwrap().price(Karat::K18), Some(dec!(110)));
        assert_eq!(window.latest().unwrap().price(Karat::K18), Some(dec!(130)));
    }

    #[test]
    fn test_large_gap_evicts_everything_but_newest() {
        let mut window = RollingWindow::new(Duration::from_secs(3600));
        window.push(snapshot_at(0, dec!(100)));
        window.push(snapshot_at(1, dec!(101)));
        window.push(snapshot_at(10, dec!(102)));

        assert_eq!(window.len(), 1);
        let prices: Vec<_> = window.prices(Karat::K18).collect();
        assert_eq!(prices, vec![dec!(102)]);
    }

    #[test]
    fn test_empty_window() {
        let window = RollingWindow::new(Duration::from_secs(60));
        assert!(window.is_empty());
        assert!(window.latest_timestamp().is_none());
        assert_eq!(window.prices(Karat::K24).count(), 0);
    }
}
