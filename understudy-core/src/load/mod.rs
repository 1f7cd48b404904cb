//! ## understudy-core::load
//! **Time-boxed synthetic load**
//!
//! Two independent generators run for the latency model's sampled window:
//! - `cpu`: duty-cycled busy workers on blocking threads
//! - `memory`: a touched allocation held until the request ends
//!
//! Neither extends the request beyond the window by more than teardown.

mod cpu;
mod memory;

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use understudy_config::LoadConfig;

pub use cpu::{CpuLoad, DUTY_CYCLE};
pub use memory::{MemoryAllocation, MemoryLoad};

#[derive(Debug, Clone, PartialEq)]
pub struct LoadGenerator {
    cpu: CpuLoad,
    memory: MemoryLoad,
}

impl LoadGenerator {
    pub fn new(cpu: CpuLoad, memory: MemoryLoad) -> Self {
        Self { cpu, memory }
    }

    /// A generator that consumes nothing.
    pub fn idle() -> Self {
        Self::new(CpuLoad::none(), MemoryLoad::none())
    }

    pub fn cpu(&self) -> &CpuLoad {
        &self.cpu
    }

    pub fn memory(&self) -> &MemoryLoad {
        &self.memory
    }

    /// Allocates this request's memory immediately and returns a future that
    /// burns CPU for `window`, then hands the allocation back to the caller.
    ///
    /// The caller owns the allocation and frees it by dropping it, which
    /// happens even when the request future is abandoned.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        window: Duration,
        rng: &mut R,
    ) -> impl Future<Output = MemoryAllocation> + Send + 'static {
        let allocation = self.memory.allocate(rng);
        let cpu = self.cpu.clone();
        async move {
            cpu.run(window).await;
            allocation
        }
    }
}

impl From<&LoadConfig> for LoadGenerator {
    fn from(config: &LoadConfig) -> Self {
        let cpu = if config.cpu.percentage > 0.0 {
            CpuLoad::new(
                config.cpu.resolved_cores(),
                config.cpu.effective_percentage(),
            )
        } else {
            CpuLoad::none()
        };

        Self::new(
            cpu,
            MemoryLoad::new(config.memory.bytes, config.memory.variance),
        )
    }
}
