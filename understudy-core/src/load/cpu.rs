use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::spawn_blocking;
use tracing::{debug, warn};

/// Length of one busy/idle cycle.
pub const DUTY_CYCLE: Duration = Duration::from_millis(10);

/// Spins `cores` workers, each busy for `percentage` of every duty cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuLoad {
    cores: usize,
    percentage: f64,
}

impl CpuLoad {
    pub fn new(cores: usize, percentage: f64) -> Self {
        Self {
            cores,
            percentage: percentage.clamp(0.0, 100.0),
        }
    }

    pub fn none() -> Self {
        Self::new(0, 0.0)
    }

    pub fn is_noop(&self) -> bool {
        self.cores == 0 || self.percentage <= 0.0
    }

    /// Busy share of one duty cycle.
    pub fn busy_slice(&self) -> Duration {
        let nanos = DUTY_CYCLE.as_nanos() as f64 * self.percentage / 100.0;
        Duration::from_nanos(nanos.round() as u64)
    }

    /// Burns CPU until `window` has elapsed.
    ///
    /// Workers stop at the window end, or within one duty cycle if this future
    /// is dropped first.
    pub async fn run(&self, window: Duration) {
        if self.is_noop() || window.is_zero() {
            return;
        }

        let deadline = Instant::now() + window;
        let busy = self.busy_slice();
        let stop = StopOnDrop::default();

        let workers: Vec<_> = (0..self.cores)
            .map(|_| {
                let stop = stop.flag();
                spawn_blocking(move || duty_cycle(deadline, busy, &stop))
            })
            .collect();

        for worker in workers {
            match worker.await {
                Ok(spin) => debug!(cycles = spin.cycles, busy = ?spin.busy, "CPU worker finished"),
                Err(e) => warn!("CPU worker failed: {e}"),
            }
        }
    }
}

/// Raises the stop flag when the owning future goes away.
#[derive(Default)]
struct StopOnDrop(Arc<AtomicBool>);

impl StopOnDrop {
    fn flag(&self) -> Arc<AtomicBool> {
        self.0.clone()
    }
}

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// What one worker did before it stopped.
#[derive(Debug, Default)]
struct Spin {
    cycles: u64,
    busy: Duration,
}

fn duty_cycle(deadline: Instant, busy: Duration, stop: &AtomicBool) -> Spin {
    let mut spin = Spin::default();
    let mut accumulator = 0u64;

    loop {
        let cycle_start = Instant::now();
        if cycle_start >= deadline || stop.load(Ordering::Acquire) {
            break;
        }

        let busy_until = (cycle_start + busy).min(deadline);
        while Instant::now() < busy_until {
            accumulator = black_box(accumulator.wrapping_mul(31).wrapping_add(spin.cycles));
        }
        spin.busy += cycle_start.elapsed();

        let idle_until = (cycle_start + DUTY_CYCLE).min(deadline);
        let now = Instant::now();
        if idle_until > now {
            std::thread::sleep(idle_until - now);
        }

        spin.cycles += 1;
    }

    black_box(accumulator);
    spin
}
