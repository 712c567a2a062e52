//! Gold price data models
//!
//! - `karat` - The fixed set of purity grades (Karat)
//! - `snapshot` - Fetched per-karat prices at a point in time (PriceSnapshot)
//! - `metric` - Derived per-karat window metrics (KaratMetric)
//! - `state` - The published cross-karat view (DashboardState, DashboardStatus)

mod karat;
mod metric;
mod snapshot;
mod state;

pub use karat::Karat;
pub use metric::KaratMetric;
pub use snapshot::PriceSnapshot;
pub use state::{DashboardState, DashboardStatus};
