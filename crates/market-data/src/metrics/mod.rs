//! Metrics engine: snapshot validation, the rolling window, and derived
//! per-karat metrics.

mod engine;
mod validator;
mod window;

pub use engine::MetricsEngine;
pub use validator::{SnapshotValidator, ValidatorConfig};
pub use window::RollingWindow;
