//! Incoming snapshot validation.
//!
//! Hard checks reject the snapshot:
//! - every configured karat present
//! - strictly positive prices
//! - timestamp not earlier than the latest accepted snapshot
//!
//! Soft checks only log a warning:
//! - karats outside the configured set
//! - a price move larger than the configured jump threshold

use log::warn;
use rust_decimal::Decimal;

use crate::errors::ValidationError;
use crate::models::{Karat, PriceSnapshot};

/// Soft-check configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Warn when a karat moves by more than this percentage between
    /// consecutive accepted snapshots.
    pub warn_on_jump_percent: Option<Decimal>,
    /// Warn when the snapshot carries karats that are not configured.
    pub warn_on_extra_karats: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            warn_on_jump_percent: Some(Decimal::from(10)),
            warn_on_extra_karats: true,
        }
    }
}

/// Checks an incoming snapshot against the configured karats and the
/// latest accepted snapshot.
#[derive(Clone, Debug)]
pub struct SnapshotValidator {
    karats: Vec<Karat>,
    config: ValidatorConfig,
}

impl SnapshotValidator {
    pub fn new(karats: Vec<Karat>) -> Self {
        Self {
            karats,
            config: ValidatorConfig::default(),
        }
    }

    pub fn with_config(karats: Vec<Karat>, config: ValidatorConfig) -> Self {
        Self { karats, config }
    }

    /// Validate `incoming` against the most recent accepted snapshot.
    ///
    /// Returns the first hard failure; soft issues are logged.
    pub fn validate(
        &self,
        incoming: &PriceSnapshot,
        latest: Option<&PriceSnapshot>,
    ) -> Result<(), ValidationError> {
        for &karat in &self.karats {
            match incoming.price(karat) {
                None => return Err(ValidationError::MissingKarat(karat)),
                Some(price) if price <= Decimal::ZERO => {
                    return Err(ValidationError::NonPositivePrice { karat, price })
                }
                Some(_) => {}
            }
        }

        if let Some(latest) = latest {
            if incoming.timestamp() < latest.timestamp() {
                return Err(ValidationError::NonMonotonicTimestamp {
                    incoming: incoming.timestamp(),
                    latest: latest.timestamp(),
                });
            }
        }

        for message in self.soft_issues(incoming, latest) {
            warn!(
                "Snapshot validation warning for {}: {}",
                incoming.timestamp(),
                message
            );
        }

        Ok(())
    }

    fn soft_issues(&self, incoming: &PriceSnapshot, latest: Option<&PriceSnapshot>) -> Vec<String> {
        let mut issues = Vec::new();

        if self.config.warn_on_extra_karats {
            for karat in incoming.prices().keys() {
                if !self.karats.contains(karat) {
                    issues.push(format!("Unconfigured karat {} ignored", karat));
                }
            }
        }

        if let (Some(threshold), Some(latest)) = (self.config.warn_on_jump_percent, latest) {
            for &karat in &self.karats {
                let (Some(previous), Some(current)) = (latest.price(karat), incoming.price(karat))
                else {
                    continue;
                };
                if previous.is_zero() {
                    continue;
                }
                let jump = ((current - previous) / previous * Decimal::ONE_HUNDRED).abs();
                if jump > threshold {
                    issues.push(format!(
                        "{} moved {}% ({} -> {})",
                        karat,
                        jump.round_dp(2),
                        previous,
                        current
                    ));
                }
            }
        }

        issues
    }
}
