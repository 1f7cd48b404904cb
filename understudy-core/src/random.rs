//! ## understudy-core::random
//! **Seeded randomness threaded through each request**
//!
//! The node owns one [`SeedSource`]. Every request takes the next sequence
//! number from it and derives independent streams for each concern, so a
//! fault draw never shifts a latency draw and the same seed with the same
//! request order replays the same decisions.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Node-wide source of request seeds.
#[derive(Debug)]
pub struct SeedSource {
    seed: u64,
    sequence: AtomicU64,
}

impl SeedSource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Streams for the next request in arrival order.
    pub fn next_request(&self) -> RequestRandom {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        RequestRandom::derive(self.seed, sequence)
    }
}

/// Independent random streams owned by a single request.
#[derive(Debug, Clone)]
pub struct RequestRandom {
    pub sequence: u64,
    pub fault: SmallRng,
    pub timing: SmallRng,
    pub load: SmallRng,
    pub payload: SmallRng,
}

impl RequestRandom {
    pub fn derive(seed: u64, sequence: u64) -> Self {
        Self {
            sequence,
            fault: stream(seed, sequence, "fault"),
            timing: stream(seed, sequence, "timing"),
            load: stream(seed, sequence, "load"),
            payload: stream(seed, sequence, "payload"),
        }
    }
}

fn stream(seed: u64, sequence: u64, name: &str) -> SmallRng {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(&sequence.to_le_bytes());
    hasher.update(name.as_bytes());

    let mut word = [0u8; 8];
    word.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
    SmallRng::seed_from_u64(u64::from_le_bytes(word))
}
