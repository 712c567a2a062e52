//! Chart normalization and presentation helpers.
//!
//! [`ChartSeries`] subscribes to published states and keeps a bounded price
//! series per karat, one point per accepted snapshot. [`normalize`] turns a
//! series into bar heights for rendering.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::warn;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{DashboardState, Karat};
use crate::scheduler::StateSubscriber;

/// Lowest bar height, so the minimum price stays visible.
pub const MIN_BAR_PERCENT: f64 = 10.0;

/// Default number of points kept per karat.
pub const DEFAULT_SERIES_CAPACITY: usize = 288;

/// A price observation for one karat.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

/// A point scaled for rendering.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBar {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    /// Height in percent of the chart, in `[MIN_BAR_PERCENT, 100]`.
    pub height_percent: f64,
}

/// A normalized series with its bounds.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSeries {
    pub bars: Vec<ChartBar>,
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

/// Scale prices to bar heights.
///
/// `(price - min) / (max - min) * 100`, floored at [`MIN_BAR_PERCENT`]. A flat
/// series uses a range of 1 so every bar sits at the floor.
pub fn normalize(points: &[ChartPoint]) -> NormalizedSeries {
    let min = points.iter().map(|p| p.price).min();
    let max = points.iter().map(|p| p.price).max();

    let (Some(lo), Some(hi)) = (min, max) else {
        return NormalizedSeries {
            bars: Vec::new(),
            min,
            max,
        };
    };

    let range = if hi == lo { Decimal::ONE } else { hi - lo };
    let bars = points
        .iter()
        .map(|p| {
            let ratio = ((p.price - lo) / range).to_f64().unwrap_or(0.0);
            ChartBar {
                timestamp: p.timestamp,
                price: p.price,
                height_percent: (ratio * 100.0).max(MIN_BAR_PERCENT),
            }
        })
        .collect();

    NormalizedSeries { bars, min, max }
}

/// Signed percentage rounded to 2 decimals, e.g. `+0.72%`, `-1.50%`.
pub fn format_percent(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    // Avoid "-0.00%"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    if rounded > 0.0 {
        format!("+{:.2}%", rounded)
    } else {
        format!("{:.2}%", rounded)
    }
}

struct SeriesState {
    last_seen: Option<DateTime<Utc>>,
    points: BTreeMap<Karat, VecDeque<ChartPoint>>,
}

/// Per-karat price history built from published dashboard states.
///
/// Only states carrying a new `last_successful_update` add points, so error
/// and stale republications do not duplicate the last price.
pub struct ChartSeries {
    capacity: usize,
    inner: Mutex<SeriesState>,
}

impl ChartSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(SeriesState {
                last_seen: None,
                points: BTreeMap::new(),
            }),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, SeriesState> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Chart series mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Record the current prices of `state` if it carries a new update.
    pub fn record(&self, state: &DashboardState) {
        let Some(updated) = state.last_successful_update else {
            return;
        };

        let mut inner = self.lock_inner();
        if inner.last_seen.is_some_and(|seen| seen >= updated) {
            return;
        }
        inner.last_seen = Some(updated);

        for metric in &state.metrics {
            let series = inner.points.entry(metric.karat).or_default();
            series.push_back(ChartPoint {
                timestamp: metric.last_updated,
                price: metric.current_price,
            });
            while series.len() > self.capacity {
                series.pop_front();
            }
        }
    }

    /// Raw points for one karat, oldest first.
    pub fn points(&self, karat: Karat) -> Vec<ChartPoint> {
        self.lock_inner()
            .points
            .get(&karat)
            .map(|series| series.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Normalized bars for one karat.
    pub fn normalized(&self, karat: Karat) -> NormalizedSeries {
        normalize(&self.points(karat))
    }
}

impl Default for ChartSeries {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_CAPACITY)
    }
}

impl StateSubscriber for ChartSeries {
    fn on_state(&self, state: Arc<DashboardState>) {
        self.record(&state);
    }
}
