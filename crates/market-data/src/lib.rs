//! DZ Gold Market Data Crate
//!
//! Periodically fetches per-karat gold prices, derives rolling 24-hour
//! metrics and publishes a consistent dashboard state to subscribers.
//!
//! # Overview
//!
//! - A fixed set of karats (18k, 21k, 22k, 24k), all updated together
//! - Pluggable price sources (JSON over HTTP, scripted/static)
//! - A rolling window keyed by snapshot timestamp, never by wall clock
//! - Failure tolerance: the last good metrics survive a failed refresh
//! - Staleness detection against an injectable clock
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  RefreshScheduler |  (timer, one cycle in flight)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! | SnapshotFetcher  | --> |   PriceSource    |  (HTTP JSON, static)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |  MetricsEngine   | --> |  RollingWindow   |  (24h of snapshots)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! |  DashboardState  | --> subscribers, watch channel, ChartSeries
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Karat`] - Purity grade
//! - [`PriceSnapshot`] - Prices for every karat at one instant
//! - [`KaratMetric`] - Current price, 24h change, high and low for one karat
//! - [`DashboardState`] - Everything a view needs, replaced atomically
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use dzgold_market_data::{HttpPriceSource, RefreshConfig, RefreshScheduler};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RefreshConfig::default();
//! let source = Arc::new(HttpPriceSource::new(
//!     "https://prices.example.dz/api/gold",
//!     config.fetch_timeout,
//! ));
//! let scheduler = RefreshScheduler::new(source, config.clone())?;
//! scheduler.subscribe(Arc::new(|state: Arc<dzgold_market_data::DashboardState>| {
//!     println!("{}", state.status);
//! }));
//! scheduler.start(config.poll_interval);
//! tokio::time::sleep(Duration::from_secs(600)).await;
//! scheduler.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod chart;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod provider;
pub mod scheduler;

// Re-export all public types from models
pub use models::{DashboardState, DashboardStatus, Karat, KaratMetric, PriceSnapshot};

pub use chart::{format_percent, normalize, ChartBar, ChartPoint, ChartSeries, NormalizedSeries};
pub use config::{RefreshConfig, RefreshConfigFile};
pub use errors::{ConfigError, FetchError, RefreshError, ValidationError};
pub use metrics::{MetricsEngine, RollingWindow, SnapshotValidator, ValidatorConfig};
pub use provider::{HttpPriceSource, PriceSource, SnapshotFetcher, StaticPriceSource};
pub use scheduler::{
    Clock, ManualClock, RefreshScheduler, SchedulerPhase, StateSubscriber, SubscriptionId,
    SystemClock,
};
