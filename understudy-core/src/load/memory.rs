use rand::Rng;

/// Byte used to fill allocations so every page is actually committed.
const FILL: u8 = 0xA5;

/// Allocates `bytes * (1 + v)` per request, `v` uniform in `[-variance, +variance]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryLoad {
    bytes: u64,
    variance: f64,
}

impl MemoryLoad {
    pub fn new(bytes: u64, variance_pct: u32) -> Self {
        Self {
            bytes,
            variance: f64::from(variance_pct) / 100.0,
        }
    }

    pub fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn is_noop(&self) -> bool {
        self.bytes == 0
    }

    /// Draws the size of one request's allocation.
    pub fn size<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        if self.is_noop() {
            return 0;
        }

        let deviation = if self.variance > 0.0 {
            rng.random_range(-self.variance..=self.variance)
        } else {
            0.0
        };

        (self.bytes as f64 * (1.0 + deviation)).round().max(0.0) as usize
    }

    pub fn allocate<R: Rng + ?Sized>(&self, rng: &mut R) -> MemoryAllocation {
        MemoryAllocation::new(self.size(rng))
    }
}

/// Memory held on behalf of one request. Released on drop.
#[derive(Debug, Default)]
pub struct MemoryAllocation {
    buffer: Vec<u8>,
}

impl MemoryAllocation {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![FILL; size],
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
