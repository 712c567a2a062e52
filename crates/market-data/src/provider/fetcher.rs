//! Bounded single-attempt fetch.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use rust_decimal::Decimal;

use super::traits::PriceSource;
use crate::config::RefreshConfig;
use crate::errors::FetchError;
use crate::models::{Karat, PriceSnapshot};

/// Wraps a [`PriceSource`] with a timeout and payload checks.
///
/// One call is one attempt; nothing is retried here.
#[derive(Clone)]
pub struct SnapshotFetcher {
    source: Arc<dyn PriceSource>,
    timeout: Duration,
    karats: Vec<Karat>,
}

impl SnapshotFetcher {
    pub fn new(source: Arc<dyn PriceSource>, config: &RefreshConfig) -> Self {
        Self {
            source,
            timeout: config.fetch_timeout,
            karats: config.karats.clone(),
        }
    }

    pub fn source_id(&self) -> &'static str {
        self.source.id()
    }

    /// Fetch one snapshot within the configured timeout.
    ///
    /// Fails with `Timeout` when the source does not answer in time and with
    /// `InvalidPayload` when a configured karat is missing or not positive.
    pub async fn fetch(&self) -> Result<PriceSnapshot, FetchError> {
        debug!(
            "Fetching snapshot from {} (timeout {}ms)",
            self.source.id(),
            self.timeout.as_millis()
        );

        let snapshot = match tokio::time::timeout(self.timeout, self.source.fetch()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(FetchError::Timeout {
                    after: self.timeout,
                })
            }
        };

        self.check_payload(&snapshot)?;
        Ok(snapshot)
    }

    fn check_payload(&self, snapshot: &PriceSnapshot) -> Result<(), FetchError> {
        for &karat in &self.karats {
            match snapshot.price(karat) {
                None => {
                    return Err(FetchError::InvalidPayload(format!(
                        "missing price for {}",
                        karat
                    )))
                }
                Some(price) if price <= Decimal::ZERO => {
                    return Err(FetchError::InvalidPayload(format!(
                        "non-positive price for {}: {}",
                        karat, price
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticPriceSource;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn full_snapshot() -> PriceSnapshot {
        PriceSnapshot::new(
            Utc::now(),
            Karat::ALL.into_iter().zip([
                dec!(13900),
                dec!(16200),
                dec!(17000),
                dec!(18500),
            ]),
        )
    }

    fn config() -> RefreshConfig {
        RefreshConfig::new(Duration::from_secs(10)).with_fetch_timeout(Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_fetch_passes_valid_snapshot_through() {
        let source = Arc::new(StaticPriceSource::new());
        let expected = full_snapshot();
        source.push_ok(expected.clone());

        let fetcher = SnapshotFetcher::new(source, &config());
        assert_eq!(fetcher.fetch().await, Ok(expected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out() {
        let source = Arc::new(StaticPriceSource::new());
        source.push_delayed(Ok(full_snapshot()), Duration::from_secs(5));

        let fetcher = SnapshotFetcher::new(source, &config());
        assert_eq!(
            fetcher.fetch().await,
            Err(FetchError::Timeout {
                after: Duration::from_secs(2)
            })
        );
    }

    #[tokio::test]
    async fn test_missing_karat_is_invalid_payload() {
        let source = Arc::new(StaticPriceSource::new());
        source.push_ok(PriceSnapshot::new(Utc::now(), [(Karat::K18, dec!(13900))]));

        let fetcher = SnapshotFetcher::new(source, &config());
        assert!(matches!(
            fetcher.fetch().await,
            Err(FetchError::InvalidPayload(msg)) if msg.contains("21k")
        ));
    }

    #[tokio::test]
    async fn test_non_positive_price_is_invalid_payload() {
        let source = Arc::new(StaticPriceSource::new());
        source.push_ok(PriceSnapshot::new(
            Utc::now(),
            Karat::ALL.into_iter().zip([dec!(13900), dec!(0), dec!(17000), dec!(18500)]),
        ));

        let fetcher = SnapshotFetcher::new(source, &config());
        assert!(matches!(
            fetcher.fetch().await,
            Err(FetchError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_source_error_is_passed_through() {
        let source = Arc::new(StaticPriceSource::new());
        source.push_err(FetchError::Transport("connection reset".to_string()));

        let fetcher = SnapshotFetcher::new(source, &config());
        assert_eq!(
            fetcher.fetch().await,
            Err(FetchError::Transport("connection reset".to_string()))
        );
    }
}
