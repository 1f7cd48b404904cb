//! Fault injection policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

/// What happens to a request selected for a fault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Answer immediately with the configured status code.
    #[default]
    HttpError,
    /// Sleep for the configured delay, then carry on normally.
    Delay,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::HttpError => "http_error",
            FaultKind::Delay => "delay",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = validation::validate_fault_rates))]
pub struct FaultConfig {
    /// Fraction of requests that fault (0.0 to 1.0).
    #[validate(range(min = 0.0, max = 1.0))]
    pub rate: f64,

    pub kind: FaultKind,

    /// Status returned by `http_error` faults.
    #[validate(range(min = 100, max = 599))]
    pub code: u16,

    /// Delay added by `delay` faults, in milliseconds.
    pub delay_ms: u64,

    /// Checked only when the primary fault does not fire.
    pub secondary: Option<SecondaryFaultConfig>,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            rate: 0.0,
            kind: FaultKind::HttpError,
            code: 500,
            delay_ms: 0,
            secondary: None,
        }
    }
}

impl FaultConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// A chained `http_error` fault with its own rate and status.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SecondaryFaultConfig {
    #[validate(range(min = 0.0, max = 1.0))]
    pub rate: f64,

    #[validate(range(min = 100, max = 599))]
    pub code: u16,
}

impl Default for SecondaryFaultConfig {
    fn default() -> Self {
        Self {
            rate: 0.0,
            code: 503,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_out_of_range_is_rejected() {
        let config = FaultConfig {
            rate: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = FaultConfig {
            rate: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn secondary_fault_is_validated() {
        let config = FaultConfig {
            secondary: Some(SecondaryFaultConfig {
                rate: 2.0,
                code: 503,
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nan_rates_are_rejected() {
        let config = FaultConfig {
            rate: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = FaultConfig {
            secondary: Some(SecondaryFaultConfig {
                rate: f64::NAN,
                code: 503,
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn kind_uses_snake_case_names() {
        let kind: FaultKind = serde_yaml::from_str("http_error").unwrap();
        assert_eq!(kind, FaultKind::HttpError);
        let kind: FaultKind = serde_yaml::from_str("delay").unwrap();
        assert_eq!(kind.as_str(), "delay");
    }
}
