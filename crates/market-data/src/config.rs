//! Refresh pipeline configuration.
//!
//! [`RefreshConfig`] is what the fetcher, metrics engine and scheduler
//! consume. [`RefreshConfigFile`] is the serialized surface
//! (`pollIntervalMs`, `fetchTimeoutMs`, `windowHours`, `enumeratedKarats`)
//! and converts into a validated [`RefreshConfig`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::models::Karat;

/// Default polling interval: the dashboard auto-refreshes every 5 minutes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default rolling window for high/low/change.
pub const DEFAULT_WINDOW_HOURS: u64 = 24;

/// Share of the poll interval kept free between a timed-out fetch and the next tick.
const TIMEOUT_SAFETY_DIVISOR: u32 = 10;

/// Status degrades to `Stale` after this many poll intervals without an accepted snapshot.
const STALE_AFTER_INTERVALS: u32 = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Time between ticks.
    pub poll_interval: Duration,
    /// Bound on a single fetch attempt.
    pub fetch_timeout: Duration,
    /// Lookback for high/low/change.
    pub window: Duration,
    /// Karats every snapshot must carry, sorted and deduplicated.
    pub karats: Vec<Karat>,
}

impl RefreshConfig {
    /// Config with the given poll interval and defaults for everything else.
    ///
    /// The fetch timeout is the interval minus a 10% safety margin so a
    /// timed-out fetch always resolves before the next tick.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            fetch_timeout: default_fetch_timeout(poll_interval),
            window: Duration::from_secs(DEFAULT_WINDOW_HOURS * 60 * 60),
            karats: Karat::ALL.to_vec(),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_karats(mut self, karats: impl IntoIterator<Item = Karat>) -> Self {
        let mut karats: Vec<Karat> = karats.into_iter().collect();
        karats.sort();
        karats.dedup();
        self.karats = karats;
        self
    }

    /// Age after which the last accepted snapshot is considered stale.
    pub fn stale_after(&self) -> Duration {
        stale_after(self.poll_interval)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::ZeroFetchTimeout);
        }
        if self.fetch_timeout >= self.poll_interval {
            return Err(ConfigError::TimeoutNotBelowInterval {
                timeout: self.fetch_timeout,
                interval: self.poll_interval,
            });
        }
        if self.window.is_zero() {
            return Err(ConfigError::ZeroWindow);
        }
        if self.karats.is_empty() {
            return Err(ConfigError::NoKarats);
        }
        Ok(())
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

/// Staleness threshold for a given poll interval, saturating at `Duration::MAX`.
pub(crate) fn stale_after(poll_interval: Duration) -> Duration {
    poll_interval
        .checked_mul(STALE_AFTER_INTERVALS)
        .unwrap_or(Duration::MAX)
}

fn default_fetch_timeout(poll_interval: Duration) -> Duration {
    poll_interval.saturating_sub(poll_interval / TIMEOUT_SAFETY_DIVISOR)
}

/// Serialized configuration surface.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshConfigFile {
    pub poll_interval_ms: Option<u64>,
    pub fetch_timeout_ms: Option<u64>,
    pub window_hours: Option<u64>,
    pub enumerated_karats: Option<Vec<Karat>>,
}

impl TryFrom<RefreshConfigFile> for RefreshConfig {
    type Error = ConfigError;

    fn try_from(file: RefreshConfigFile) -> Result<Self, Self::Error> {
        let poll_interval = file
            .poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        let mut config = RefreshConfig::new(poll_interval);

        if let Some(ms) = file.fetch_timeout_ms {
            config = config.with_fetch_timeout(Duration::from_millis(ms));
        }
        if let Some(hours) = file.window_hours {
            config = config.with_window(Duration::from_secs(hours * 60 * 60));
        }
        if let Some(karats) = file.enumerated_karats {
            config = config.with_karats(karats);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RefreshConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert_eq!(config.fetch_timeout, Duration::from_secs(270));
        assert_eq!(config.window, Duration::from_secs(24 * 3600));
        assert_eq!(config.karats, Karat::ALL.to_vec());
        assert_eq!(config.stale_after(), Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = RefreshConfig::new(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroPollInterval));

        let config = RefreshConfig::new(Duration::from_secs(10))
            .with_fetch_timeout(Duration::from_secs(10));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TimeoutNotBelowInterval { .. })
        ));

        let config = RefreshConfig::default().with_window(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroWindow));

        let config = RefreshConfig::default().with_karats([]);
        assert_eq!(config.validate(), Err(ConfigError::NoKarats));
    }

    #[test]
    fn test_stale_after_saturates() {
        assert_eq!(stale_after(Duration::from_secs(40)), Duration::from_secs(80));
        assert_eq!(stale_after(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn test_karats_are_sorted_and_deduplicated() {
        let config =
            RefreshConfig::default().with_karats([Karat::K24, Karat::K18, Karat::K24]);
        assert_eq!(config.karats, vec![Karat::K18, Karat::K24]);
    }

    #[test]
    fn test_from_config_file() {
        let file: RefreshConfigFile = serde_json::from_str(
            r#"{"pollIntervalMs": 60000, "windowHours": 12, "enumeratedKarats": [24, 18]}"#,
        )
        .unwrap();
        let config = RefreshConfig::try_from(file).unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.fetch_timeout, Duration::from_secs(54));
        assert_eq!(config.window, Duration::from_secs(12 * 3600));
        assert_eq!(config.karats, vec![Karat::K18, Karat::K24]);
    }

    #[test]
    fn test_from_config_file_rejects_unknown_karat() {
        let result = serde_json::from_str::<RefreshConfigFile>(r#"{"enumeratedKarats": [20]}"#);
        assert!(result.is_err());
    }
}
