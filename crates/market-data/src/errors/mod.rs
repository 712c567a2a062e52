//! Error types for the price refresh pipeline.
//!
//! This module provides:
//! - [`FetchError`]: Failures of a single bounded fetch attempt
//! - [`ValidationError`]: Snapshots rejected by the metrics engine
//! - [`RefreshError`]: Either of the above, terminal for the current cycle only
//! - [`ConfigError`]: Invalid refresh configuration

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::Karat;

/// Errors from one fetch attempt against a price source.
///
/// The fetcher never retries; the next scheduled tick is the retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The source did not answer within the configured timeout.
    #[error("Timeout after {}ms", after.as_millis())]
    Timeout {
        /// The timeout that was exceeded
        after: Duration,
    },

    /// Network or protocol failure talking to the source.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response could not be turned into a valid snapshot.
    /// For example a missing karat, a non-positive price, or a malformed timestamp.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Reasons the metrics engine rejects an incoming snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A configured karat has no price in the snapshot.
    #[error("Missing karat: {0}")]
    MissingKarat(Karat),

    /// A price is zero or negative.
    #[error("Non-positive price for {karat}: {price}")]
    NonPositivePrice {
        /// The offending karat
        karat: Karat,
        /// The rejected price
        price: Decimal,
    },

    /// The snapshot is older than the latest accepted one.
    #[error("Non-monotonic timestamp: {incoming} is before latest accepted {latest}")]
    NonMonotonicTimestamp {
        /// Timestamp of the rejected snapshot
        incoming: DateTime<Utc>,
        /// Timestamp of the most recent accepted snapshot
        latest: DateTime<Utc>,
    },
}

/// A failed refresh cycle.
///
/// Never fatal to the process: the scheduler publishes the last known
/// good metrics with an `Error` status carrying this error's message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Invalid refresh configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("Fetch timeout must be greater than zero")]
    ZeroFetchTimeout,

    #[error("Fetch timeout ({timeout:?}) must be shorter than the poll interval ({interval:?})")]
    TimeoutNotBelowInterval {
        timeout: Duration,
        interval: Duration,
    },

    #[error("Rolling window must be greater than zero")]
    ZeroWindow,

    #[error("At least one karat must be configured")]
    NoKarats,

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
