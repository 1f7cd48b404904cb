//! ## understudy-core::fault
//! **Probabilistic fault injection**
//!
//! One uniform draw per request decides whether the primary fault fires.
//! `http_error` faults end the request with the configured status; `delay`
//! faults only add latency. An optional secondary `http_error` fault gets its
//! own draw, and only when the primary did not fire.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::info;
use understudy_config::{FaultConfig, FaultKind};

/// Decision for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// No fault; carry on.
    Proceed,
    /// A delay fault fired; the delay has been served and the request carries on.
    Delayed(Duration),
    /// Terminal fault: answer with `code`, skip all further work.
    Failed { code: u16 },
}

impl FaultOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FaultOutcome::Failed { .. })
    }
}

/// Chained fault evaluated when the primary one does not fire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecondaryFault {
    pub rate: f64,
    pub code: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaultInjector {
    rate: f64,
    kind: FaultKind,
    code: u16,
    delay: Duration,
    secondary: Option<SecondaryFault>,
}

impl FaultInjector {
    /// # Panics
    ///
    /// Panics if `rate` is not within [0.0, 1.0]. Configuration validation
    /// rejects such rates before an injector is built.
    pub fn new(rate: f64, kind: FaultKind, code: u16, delay: Duration) -> Self {
        assert!(
            (0.0..=1.0).contains(&rate),
            "Fault rate must be between 0.0 and 1.0"
        );
        Self {
            rate,
            kind,
            code,
            delay,
            secondary: None,
        }
    }

    /// An injector that never fires.
    pub fn disabled() -> Self {
        Self::new(0.0, FaultKind::HttpError, 500, Duration::ZERO)
    }

    pub fn with_secondary(mut self, secondary: SecondaryFault) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Draws the decision without sleeping.
    pub fn decide<R: Rng + ?Sized>(&self, rng: &mut R) -> FaultOutcome {
        let draw: f64 = rng.random();
        if draw < self.rate {
            return match self.kind {
                FaultKind::HttpError => FaultOutcome::Failed { code: self.code },
                FaultKind::Delay => FaultOutcome::Delayed(self.delay),
            };
        }

        if let Some(secondary) = self.secondary {
            let draw: f64 = rng.random();
            if draw < secondary.rate {
                return FaultOutcome::Failed {
                    code: secondary.code,
                };
            }
        }

        FaultOutcome::Proceed
    }

    /// Draws the decision now and returns a future that serves any delay.
    ///
    /// The draw happens before the future is created so the random stream is
    /// not borrowed across the sleep.
    pub fn check<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> impl Future<Output = FaultOutcome> + Send + 'static {
        let outcome = self.decide(rng);
        async move {
            match outcome {
                FaultOutcome::Failed { code } => {
                    info!(code, "Injecting error fault");
                }
                FaultOutcome::Delayed(delay) => {
                    info!(?delay, "Injecting delay fault");
                    tokio::time::sleep(delay).await;
                }
                FaultOutcome::Proceed => {}
            }
            outcome
        }
    }
}

impl From<&FaultConfig> for FaultInjector {
    fn from(config: &FaultConfig) -> Self {
        let injector = Self::new(config.rate, config.kind, config.code, config.delay());
        match &config.secondary {
            Some(secondary) => injector.with_secondary(SecondaryFault {
                rate: secondary.rate,
                code: secondary.code,
            }),
            None => injector,
        }
    }
}
