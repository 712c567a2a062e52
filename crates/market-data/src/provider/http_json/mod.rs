//! JSON-over-HTTP price source.
//!
//! Polls an endpoint that returns current per-karat prices, either as a
//! bare list or wrapped in a dashboard object:
//!
//! ```json
//! [
//!   { "karat": 18, "current_price": 13900.0, "last_updated": "2025-02-07T09:00:00Z" },
//!   { "karat": 24, "current_price": 18500.0, "last_updated": "2025-02-07T09:00:00Z" }
//! ]
//! ```
//!
//! ```json
//! { "prices": [ ... ], "last_update": "2025-02-07T09:00:00Z" }
//! ```
//!
//! The snapshot timestamp is the newest `last_updated` among the entries.
//! Prices are read digit for digit into `Decimal`, never through `f64`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::FetchError;
use crate::models::{Karat, PriceSnapshot};
use crate::provider::PriceSource;

/// Provider ID constant
const PROVIDER_ID: &str = "HTTP_JSON";

/// One price entry from the endpoint.
#[derive(Debug, Deserialize)]
struct PriceEntry {
    karat: u8,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    current_price: Decimal,
    last_updated: DateTime<Utc>,
}

/// Pull the price list out of either payload shape.
///
/// Goes through `Value` rather than an untagged enum: buffered numbers lose
/// their integer form under `arbitrary_precision`.
fn price_entries(payload: Value) -> Result<Vec<PriceEntry>, FetchError> {
    let list = match payload {
        Value::Array(_) => payload,
        Value::Object(mut fields) => fields.remove("prices").ok_or_else(|| {
            FetchError::InvalidPayload("object payload has no `prices` list".to_string())
        })?,
        other => {
            return Err(FetchError::InvalidPayload(format!(
                "expected a price list, got {}",
                other
            )))
        }
    };
    serde_json::from_value(list).map_err(|e| FetchError::InvalidPayload(e.to_string()))
}

/// Price source backed by a JSON HTTP endpoint.
///
/// # Example
///
/// ```ignore
/// use dzgold_market_data::provider::http_json::HttpPriceSource;
///
/// let source = HttpPriceSource::new("http://localhost:8000/api/v1/prices/current", timeout);
/// ```
pub struct HttpPriceSource {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpPriceSource {
    /// Create a source for `url`. `timeout` bounds the whole request.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_transport_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                after: self.timeout,
            }
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Parse a response body into a snapshot.
///
/// Fails with `InvalidPayload` on malformed JSON or timestamps, unknown or
/// duplicate karats, prices outside the `Decimal` range, or an empty price list.
pub fn parse_payload(body: &str) -> Result<PriceSnapshot, FetchError> {
    let payload: Value =
        serde_json::from_str(body).map_err(|e| FetchError::InvalidPayload(e.to_string()))?;
    let entries = price_entries(payload)?;

    let timestamp = entries
        .iter()
        .map(|e| e.last_updated)
        .max()
        .ok_or_else(|| FetchError::InvalidPayload("no prices in response".to_string()))?;

    let mut prices = BTreeMap::new();
    for entry in entries {
        let karat = Karat::try_from(entry.karat).map_err(FetchError::InvalidPayload)?;
        if prices.insert(karat, entry.current_price).is_some() {
            return Err(FetchError::InvalidPayload(format!(
                "duplicate price for {}",
                karat
            )));
        }
    }

    Ok(PriceSnapshot::new(timestamp, prices))
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch(&self) -> Result<PriceSnapshot, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport(format!(
                "{} returned HTTP {}",
                self.url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        debug!("Received {} bytes from {}", body.len(), self.url);

        parse_payload(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_list_payload() {
        let body = r#"[
            {"karat": 18, "current_price": 13900.0, "last_updated": "2025-02-07T09:00:00Z"},
            {"karat": 21, "current_price": 16200.5, "last_updated": "2025-02-07T09:05:00Z"},
            {"karat": 22, "current_price": 17000, "last_updated": "2025-02-07T08:55:00Z"},
            {"karat": 24, "current_price": 18500, "last_updated": "2025-02-07T09:00:00Z"}
        ]"#;

        let snapshot = parse_payload(body).unwrap();
        assert_eq!(
            snapshot.timestamp(),
            Utc.with_ymd_and_hms(2025, 2, 7, 9, 5, 0).unwrap()
        );
        assert_eq!(snapshot.price(Karat::K18), Some(dec!(13900)));
        assert_eq!(snapshot.price(Karat::K21), Some(dec!(16200.5)));
        assert_eq!(snapshot.prices().len(), 4);
    }

    #[test]
    fn test_parse_dashboard_payload() {
        let body = r#"{
            "prices": [
                {"karat": 24, "current_price": 39600, "change_24h": 250, "last_updated": "2025-02-07T09:00:00Z"}
            ],
            "world_price": {"price_usd": 2850.5, "price_dzd": 39600, "premium_percent": 2.3},
            "last_update": "2025-02-07T09:00:00Z"
        }"#;

        let snapshot = parse_payload(body).unwrap();
        assert_eq!(snapshot.price(Karat::K24), Some(dec!(39600)));
    }

    #[test]
    fn test_prices_keep_every_digit() {
        let body = r#"[
            {"karat": 18, "current_price": 1.0000000000000001, "last_updated": "2025-02-07T09:00:00Z"},
            {"karat": 24, "current_price": 18500.123456789012345, "last_updated": "2025-02-07T09:00:00Z"}
        ]"#;

        let snapshot = parse_payload(body).unwrap();
        assert_eq!(snapshot.price(Karat::K18), Some(dec!(1.0000000000000001)));
        assert_eq!(
            snapshot.price(Karat::K24),
            Some(dec!(18500.123456789012345))
        );
    }

    #[test]
    fn test_non_list_payload_is_invalid() {
        assert!(matches!(
            parse_payload(r#"{"last_update": "2025-02-07T09:00:00Z"}"#),
            Err(FetchError::InvalidPayload(msg)) if msg.contains("prices")
        ));
        assert!(matches!(
            parse_payload("42"),
            Err(FetchError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_unknown_karat_is_invalid() {
        let body = r#"[{"karat": 20, "current_price": 1.0, "last_updated": "2025-02-07T09:00:00Z"}]"#;
        assert!(matches!(
            parse_payload(body),
            Err(FetchError::InvalidPayload(msg)) if msg.contains("20")
        ));
    }

    #[test]
    fn test_duplicate_karat_is_invalid() {
        let body = r#"[
            {"karat": 18, "current_price": 1.0, "last_updated": "2025-02-07T09:00:00Z"},
            {"karat": 18, "current_price": 2.0, "last_updated": "2025-02-07T09:00:00Z"}
        ]"#;
        assert!(matches!(
            parse_payload(body),
            Err(FetchError::InvalidPayload(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn test_malformed_timestamp_is_invalid() {
        let body = r#"[{"karat": 18, "current_price": 1.0, "last_updated": "yesterday"}]"#;
        assert!(matches!(
            parse_payload(body),
            Err(FetchError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_empty_list_is_invalid() {
        assert!(matches!(
            parse_payload("[]"),
            Err(FetchError::InvalidPayload(msg)) if msg.contains("no prices")
        ));
        assert!(matches!(
            parse_payload("not json"),
            Err(FetchError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_provider_id() {
        let source = HttpPriceSource::new("http://localhost:1/prices", Duration::from_secs(1));
        assert_eq!(source.id(), "HTTP_JSON");
        assert_eq!(source.url(), "http://localhost:1/prices");
    }
}
