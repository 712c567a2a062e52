//! Derived per-karat metrics over the rolling window.

use std::time::Duration;

use log::{debug, warn};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::validator::SnapshotValidator;
use super::window::RollingWindow;
use crate::config::RefreshConfig;
use crate::errors::ValidationError;
use crate::models::{DashboardState, DashboardStatus, Karat, KaratMetric, PriceSnapshot};

/// Turns accepted snapshots into a fresh [`DashboardState`].
///
/// The engine holds no mutable state of its own: the rolling history is
/// passed in by the caller, and results depend only on snapshot contents
/// and timestamps.
#[derive(Clone, Debug)]
pub struct MetricsEngine {
    karats: Vec<Karat>,
    window: Duration,
    validator: SnapshotValidator,
}

impl MetricsEngine {
    pub fn new(config: &RefreshConfig) -> Self {
        Self {
            karats: config.karats.clone(),
            window: config.window,
            validator: SnapshotValidator::new(config.karats.clone()),
        }
    }

    pub fn with_validator(mut self, validator: SnapshotValidator) -> Self {
        self.validator = validator;
        self
    }

    /// An empty history sized to this engine's window.
    pub fn new_history(&self) -> RollingWindow {
        RollingWindow::new(self.window)
    }

    /// Apply `incoming` and return the next state.
    ///
    /// On rejection the history is left untouched and the previous state is
    /// returned with an `Error` status; metrics are never partially updated.
    pub fn update(
        &self,
        history: &mut RollingWindow,
        previous: &DashboardState,
        incoming: PriceSnapshot,
    ) -> DashboardState {
        match self.try_update(history, incoming) {
            Ok(state) => state,
            Err(e) => {
                warn!("Rejected price snapshot: {}", e);
                previous.with_status(DashboardStatus::Error(e.to_string()))
            }
        }
    }

    /// Validate, append, evict, and recompute.
    ///
    /// `history` is only modified when the snapshot is accepted.
    pub fn try_update(
        &self,
        history: &mut RollingWindow,
        incoming: PriceSnapshot,
    ) -> Result<DashboardState, ValidationError> {
        self.validator.validate(&incoming, history.latest())?;

        let accepted_at = incoming.timestamp();
        history.push(incoming);
        debug!(
            "Accepted snapshot at {} ({} in window)",
            accepted_at,
            history.len()
        );

        Ok(DashboardState {
            metrics: self.compute(history),
            status: DashboardStatus::Ready,
            last_successful_update: Some(accepted_at),
        })
    }

    /// Metrics for every configured karat from the current window contents.
    pub fn compute(&self, history: &RollingWindow) -> Vec<KaratMetric> {
        let (Some(latest), Some(oldest)) = (history.latest(), history.oldest()) else {
            return Vec::new();
        };
        let has_baseline = history.len() >= 2;

        self.karats
            .iter()
            .filter_map(|&karat| {
                let current = latest.price(karat)?;
                let (high, low) = history
                    .prices(karat)
                    .fold((current, current), |(high, low), p| (high.max(p), low.min(p)));

                let baseline = if has_baseline { oldest.price(karat) } else { None };
                let change = baseline.map(|base| current - base);
                let change_percent = match (change, baseline) {
                    (Some(change), Some(base)) => percent_of(change, base),
                    _ => None,
                };

                Some(KaratMetric {
                    karat,
                    current_price: current,
                    change_24h: change,
                    change_percent,
                    high_24h: high,
                    low_24h: low,
                    last_updated: latest.timestamp(),
                })
            })
            .collect()
    }
}

/// `change / base * 100` in floating point, unrounded.
fn percent_of(change: Decimal, base: Decimal) -> Option<f64> {
    if base.is_zero() {
        return None;
    }
    Some(change.to_f64()? / base.to_f64()? * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 7, 9, 0, 0).unwrap()
    }

    fn snapshot(hours: i64, prices: [Decimal; 4]) -> PriceSnapshot {
        PriceSnapshot::new(t0() + TimeDelta::hours(hours), Karat::ALL.into_iter().zip(prices))
    }

    fn engine() -> MetricsEngine {
        MetricsEngine::new(&RefreshConfig::default())
    }

    #[test]
    fn test_first_snapshot_has_no_change() {
        let engine = engine();
        let mut history = engine.new_history();

        let state = engine
            .try_update(
                &mut history,
                snapshot(0, [dec!(13900), dec!(16200), dec!(17000), dec!(18500)]),
            )
            .unwrap();

        assert_eq!(state.status, DashboardStatus::Ready);
        assert_eq!(state.metrics.len(), 4);
        let k18 = state.metric(Karat::K18).unwrap();
        assert_eq!(k18.current_price, dec!(13900));
        assert_eq!(k18.change_24h, None);
        assert_eq!(k18.change_percent, None);
        assert_eq!(k18.high_24h, dec!(13900));
        assert_eq!(k18.low_24h, dec!(13900));
        assert_eq!(state.last_successful_update, Some(t0()));
    }

    #[test]
    fn test_second_snapshot_computes_change_against_oldest() {
        let engine = engine();
        let mut history = engine.new_history();
        engine
            .try_update(
                &mut history,
                snapshot(0, [dec!(13900), dec!(16200), dec!(17000), dec!(18500)]),
            )
            .unwrap();

        let state = engine
            .try_update(
                &mut history,
                snapshot(1, [dec!(14000), dec!(16200), dec!(16900), dec!(18500)]),
            )
            .unwrap();

        let k18 = state.metric(Karat::K18).unwrap();
        assert_eq!(k18.change_24h, Some(dec!(100)));
        let percent = k18.change_percent.unwrap();
        assert!((percent - 0.719424).abs() < 1e-4);
        assert_eq!(k18.change_percent_display().as_deref(), Some("+0.72%"));
        assert_eq!(k18.high_24h, dec!(14000));
        assert_eq!(k18.low_24h, dec!(13900));

        let k21 = state.metric(Karat::K21).unwrap();
        assert_eq!(k21.change_24h, Some(dec!(0)));
        assert_eq!(k21.change_percent, Some(0.0));

        let k22 = state.metric(Karat::K22).unwrap();
        assert_eq!(k22.change_24h, Some(dec!(-100)));
        assert_eq!(k22.high_24h, dec!(17000));
        assert_eq!(k22.low_24h, dec!(16900));
    }

    #[test]
    fn test_extrema_drop_out_with_the_window() {
        let engine = engine();
        let mut history = engine.new_history();
        let prices = |p: Decimal| [p, dec!(16200), dec!(17000), dec!(18500)];

        engine.try_update(&mut history, snapshot(0, prices(dec!(15000)))).unwrap();
        engine.try_update(&mut history, snapshot(10, prices(dec!(13000)))).unwrap();
        let state = engine
            .try_update(&mut history, snapshot(30, prices(dec!(14000))))
            .unwrap();

        // t=0 is now more than 24h old
        let k18 = state.metric(Karat::K18).unwrap();
        assert_eq!(k18.high_24h, dec!(14000));
        assert_eq!(k18.low_24h, dec!(13000));
        assert_eq!(k18.change_24h, Some(dec!(1000)));
    }

    #[test]
    fn test_lone_survivor_has_no_change() {
        let engine = engine();
        let mut history = engine.new_history();
        let prices = [dec!(13900), dec!(16200), dec!(17000), dec!(18500)];

        engine.try_update(&mut history, snapshot(0, prices)).unwrap();
        let state = engine.try_update(&mut history, snapshot(48, prices)).unwrap();

        assert_eq!(history.len(), 1);
        assert!(state.metrics.iter().all(|m| m.change_percent.is_none()));
        assert!(state.metrics.iter().all(|m| m.change_24h.is_none()));
    }

    #[test]
    fn test_rejection_keeps_previous_metrics() {
        let engine = engine();
        let mut history = engine.new_history();
        let previous = engine.update(
            &mut history,
            &DashboardState::loading(),
            snapshot(2, [dec!(13900), dec!(16200), dec!(17000), dec!(18500)]),
        );

        let rejected = engine.update(
            &mut history,
            &previous,
            snapshot(1, [dec!(99999), dec!(16200), dec!(17000), dec!(18500)]),
        );

        assert!(rejected.status.is_error());
        assert_eq!(rejected.metrics, previous.metrics);
        assert_eq!(rejected.last_successful_update, previous.last_successful_update);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_missing_karat_rejected_without_partial_update() {
        let engine = engine();
        let mut history = engine.new_history();
        let partial = PriceSnapshot::new(t0(), [(Karat::K18, dec!(13900))]);

        let result = engine.try_update(&mut history, partial);
        assert_eq!(result, Err(ValidationError::MissingKarat(Karat::K21)));
        assert!(history.is_empty());
    }

    #[test]
    fn test_same_inputs_same_state() {
        let engine = engine();
        let mut history = engine.new_history();
        engine
            .try_update(
                &mut history,
                snapshot(0, [dec!(13900), dec!(16200), dec!(17000), dec!(18500)]),
            )
            .unwrap();
        let incoming = snapshot(3, [dec!(13950), dec!(16250), dec!(17050), dec!(18550)]);

        let mut first = history.clone();
        let mut second = history.clone();
        let a = engine.try_update(&mut first, incoming.clone()).unwrap();
        let b = engine.try_update(&mut second, incoming).unwrap();

        assert_eq!(a, b);
        assert_eq!(first, second);
    }
}
