//! ## understudy-core::timing
//! **Percentile based latency model**
//!
//! Turns p50/p90/p99 targets into a random duration per request. A uniform
//! fraction `f` is mapped piecewise onto the percentile curve:
//!
//! | `f`            | base duration                           |
//! |----------------|-----------------------------------------|
//! | `[0, .50)`     | `p50 * f / .50`                         |
//! | `[.50, .90)`   | linear from p50 to p90                  |
//! | `[.90, .99)`   | linear from p90 to p99                  |
//! | `[.99, 1)`     | `p99 * (1 + (f - .99) / .01)` long tail |
//!
//! The base is then scaled by `1 + u` with `u` uniform in
//! `[-variance, +variance]` and clamped at zero.

use std::time::Duration;

use rand::Rng;
use understudy_config::TimingConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyModel {
    p50: Duration,
    p90: Duration,
    p99: Duration,
    /// Variance as a fraction, e.g. 0.1 for 10%.
    variance: f64,
}

impl LatencyModel {
    /// Creates a model, resolving a zero p90 to p50 and a zero p99 to p90.
    pub fn new(p50: Duration, p90: Duration, p99: Duration, variance_pct: u32) -> Self {
        let p90 = if p90.is_zero() { p50 } else { p90 };
        let p99 = if p99.is_zero() { p90 } else { p99 };

        Self {
            p50,
            p90,
            p99,
            variance: f64::from(variance_pct) / 100.0,
        }
    }

    /// A model that never delays.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, Duration::ZERO, 0)
    }

    pub fn is_zero(&self) -> bool {
        self.p50.is_zero() && self.p90.is_zero() && self.p99.is_zero()
    }

    pub fn percentiles(&self) -> (Duration, Duration, Duration) {
        (self.p50, self.p90, self.p99)
    }

    /// Draws one duration.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.is_zero() {
            return Duration::ZERO;
        }

        let fraction: f64 = rng.random();
        let base = self.base_secs(fraction);

        let deviation = if self.variance > 0.0 {
            rng.random_range(-self.variance..=self.variance)
        } else {
            0.0
        };

        Duration::from_secs_f64((base * (1.0 + deviation)).max(0.0))
    }

    fn base_secs(&self, fraction: f64) -> f64 {
        let p50 = self.p50.as_secs_f64();
        let p90 = self.p90.as_secs_f64();
        let p99 = self.p99.as_secs_f64();

        if fraction < 0.50 {
            p50 * (fraction / 0.50)
        } else if fraction < 0.90 {
            lerp(p50, p90, (fraction - 0.50) / 0.40)
        } else if fraction < 0.99 {
            lerp(p90, p99, (fraction - 0.90) / 0.09)
        } else {
            p99 * (1.0 + (fraction - 0.99) / 0.01)
        }
    }
}

impl From<&TimingConfig> for LatencyModel {
    fn from(config: &TimingConfig) -> Self {
        let (p50, p90, p99) = config.resolved();
        Self::new(p50, p90, p99, config.variance)
    }
}

#[inline]
fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}
