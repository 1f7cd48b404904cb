//! Synthetic CPU and memory load.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoadConfig {
    #[validate(nested)]
    pub cpu: CpuLoadConfig,

    #[validate(nested)]
    pub memory: MemoryLoadConfig,
}

/// CPU load per request.
///
/// `percentage` is the busy share of each of `cores` workers. When
/// `allocated_mhz` is set the percentage is read as a share of the granted
/// capacity rather than of the host:
/// `allocated_mhz / (clock_mhz * cores) * percentage`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = validation::validate_cpu_load))]
pub struct CpuLoadConfig {
    /// MHz granted to the node. 0 means unset.
    pub allocated_mhz: u64,

    /// MHz of one logical core.
    #[validate(range(min = 1))]
    pub clock_mhz: u64,

    /// Workers to spread the load across. Defaults to every logical core.
    pub cores: Option<usize>,

    #[validate(range(min = 0.0, max = 100.0))]
    pub percentage: f64,
}

impl Default for CpuLoadConfig {
    fn default() -> Self {
        Self {
            allocated_mhz: 0,
            clock_mhz: 1000,
            cores: None,
            percentage: 0.0,
        }
    }
}

impl CpuLoadConfig {
    pub fn resolved_cores(&self) -> usize {
        self.cores.unwrap_or_else(num_cpus::get)
    }

    /// Busy percentage per worker after the allocated capacity adjustment.
    pub fn effective_percentage(&self) -> f64 {
        let percentage = if self.allocated_mhz == 0 {
            self.percentage
        } else {
            let capacity = self.clock_mhz as f64 * self.resolved_cores() as f64;
            self.allocated_mhz as f64 / capacity * self.percentage
        };

        percentage.clamp(0.0, 100.0)
    }
}

/// Memory held per request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MemoryLoadConfig {
    pub bytes: u64,
    /// Percentage variance applied to `bytes` on every request.
    pub variance: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_capacity_scales_percentage() {
        // 100MHz granted on 10 cores of 1000MHz: 10% of that is 0.1% of the host.
        let cpu = CpuLoadConfig {
            allocated_mhz: 100,
            clock_mhz: 1000,
            cores: Some(10),
            percentage: 10.0,
        };
        assert!((cpu.effective_percentage() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn percentage_is_unchanged_without_allocation() {
        let cpu = CpuLoadConfig {
            cores: Some(2),
            percentage: 50.0,
            ..Default::default()
        };
        assert_eq!(cpu.effective_percentage(), 50.0);
        assert_eq!(cpu.resolved_cores(), 2);
    }

    #[test]
    fn effective_percentage_is_clamped() {
        let cpu = CpuLoadConfig {
            allocated_mhz: 8000,
            clock_mhz: 1000,
            cores: Some(1),
            percentage: 50.0,
        };
        assert_eq!(cpu.effective_percentage(), 100.0);
    }

    #[test]
    fn zero_cores_is_rejected() {
        let cpu = CpuLoadConfig {
            cores: Some(0),
            ..Default::default()
        };
        assert!(cpu.validate().is_err());
    }

    #[test]
    fn nan_percentage_is_rejected() {
        let cpu = CpuLoadConfig {
            percentage: f64::NAN,
            ..Default::default()
        };
        assert!(cpu.validate().is_err());
    }
}
