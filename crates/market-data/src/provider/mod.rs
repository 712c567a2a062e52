//! Price source abstractions and implementations.
//!
//! This module contains:
//! - The `PriceSource` trait every source implements
//! - `SnapshotFetcher`, the bounded single-attempt wrapper used by the scheduler
//! - Concrete sources (JSON over HTTP, scripted/static)
//!
//! # Architecture
//!
//! Sources only know how to produce a snapshot. Timeouts and payload checks
//! against the configured karats live in the fetcher; retry cadence is the
//! scheduler's polling interval.

mod fetcher;
mod traits;

pub mod http_json;
pub mod static_source;

pub use fetcher::SnapshotFetcher;
pub use http_json::HttpPriceSource;
pub use static_source::StaticPriceSource;
pub use traits::PriceSource;
