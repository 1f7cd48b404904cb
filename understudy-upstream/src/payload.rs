//! Bodies attached to upstream calls.

use bytes::Bytes;
use rand::distr::Alphanumeric;
use rand::Rng;
use understudy_config::UpstreamConfig;

/// What each upstream call carries.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body. HTTP calls go out as `GET`.
    Empty,
    /// The same bytes on every call.
    Fixed(Bytes),
    /// Fresh alphanumeric bytes per call, `size * (1 + v)` long with `v`
    /// uniform in `[-variance, +variance]`.
    Random { size: usize, variance: f64 },
}

impl RequestBody {
    pub fn random(size: usize, variance_pct: u32) -> Self {
        Self::Random {
            size,
            variance: f64::from(variance_pct) / 100.0,
        }
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Bytes> {
        match self {
            RequestBody::Empty => None,
            RequestBody::Fixed(body) => Some(body.clone()),
            RequestBody::Random { size, variance } => {
                let deviation = if *variance > 0.0 {
                    rng.random_range(-variance..=*variance)
                } else {
                    0.0
                };
                let len = (*size as f64 * (1.0 + deviation)).round().max(0.0) as usize;

                let body: Vec<u8> = (&mut *rng).sample_iter(Alphanumeric).take(len).collect();
                Some(Bytes::from(body))
            }
        }
    }
}

impl From<&UpstreamConfig> for RequestBody {
    fn from(config: &UpstreamConfig) -> Self {
        match &config.request_body {
            Some(body) => RequestBody::Fixed(Bytes::from(body.clone())),
            None if config.request_size > 0 => {
                RequestBody::random(config.request_size, config.request_variance)
            }
            None => RequestBody::Empty,
        }
    }
}
