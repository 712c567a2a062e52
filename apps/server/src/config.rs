use std::{net::SocketAddr, time::Duration};

use dzgold_market_data::config::{RefreshConfig, RefreshConfigFile};
use dzgold_market_data::errors::ConfigError;
use dzgold_market_data::Karat;

pub struct Config {
    pub listen_addr: SocketAddr,
    /// Endpoint returning the current per-karat prices as JSON.
    pub source_url: String,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub refresh: RefreshConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` uses the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = parse_value(
            "DZG_LISTEN_ADDR",
            &lookup("DZG_LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        )?;
        let source_url = lookup("DZG_SOURCE_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "DZG_SOURCE_URL".to_string(),
                message: "must be set".to_string(),
            })?;
        let cors_allow = lookup("DZG_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = lookup("DZG_REQUEST_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30000);

        let file = RefreshConfigFile {
            poll_interval_ms: optional("DZG_POLL_INTERVAL_MS", &lookup)?,
            fetch_timeout_ms: optional("DZG_FETCH_TIMEOUT_MS", &lookup)?,
            window_hours: optional("DZG_WINDOW_HOURS", &lookup)?,
            enumerated_karats: lookup("DZG_KARATS")
                .map(|raw| parse_karats(&raw))
                .transpose()?,
        };

        Ok(Self {
            listen_addr,
            source_url,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            refresh: RefreshConfig::try_from(file)?,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn optional<T, F>(key: &str, lookup: &F) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|raw| parse_value(key, &raw)).transpose()
}

/// Comma separated, e.g. `18,21,22,24` or `18k,24k`.
fn parse_karats(raw: &str) -> Result<Vec<Karat>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_value("DZG_KARATS", s))
        .collect()
}
