//! Latency percentiles for the node's own simulated work.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

/// Percentile targets in milliseconds.
///
/// A zero (or unset) p90 falls back to p50 and a zero p99 falls back to p90.
/// After that resolution the percentiles must be non-decreasing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = validation::validate_percentiles))]
pub struct TimingConfig {
    pub p50_ms: u64,
    pub p90_ms: u64,
    pub p99_ms: u64,
    /// Percentage by which every sampled duration may randomly deviate.
    pub variance: u32,
}

impl TimingConfig {
    /// Returns `(p50, p90, p99)` with defaults applied.
    pub fn resolved(&self) -> (Duration, Duration, Duration) {
        let p50 = self.p50_ms;
        let p90 = if self.p90_ms == 0 { p50 } else { self.p90_ms };
        let p99 = if self.p99_ms == 0 { p90 } else { self.p99_ms };

        (
            Duration::from_millis(p50),
            Duration::from_millis(p90),
            Duration::from_millis(p99),
        )
    }
}
