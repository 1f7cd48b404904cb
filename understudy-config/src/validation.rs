//! Custom validation functions for configuration.
//!
//! Cross-field checks that the derive attributes cannot express.

use validator::{Validate, ValidationError};

use crate::{CpuLoadConfig, FaultConfig, TimingConfig};

/// Percentiles must be non-decreasing once defaults are applied.
pub fn validate_percentiles(timing: &TimingConfig) -> Result<(), ValidationError> {
    let (p50, p90, p99) = timing.resolved();
    if p50 <= p90 && p90 <= p99 {
        Ok(())
    } else {
        Err(ValidationError::new("percentiles_out_of_order")
            .with_message("expected p50 <= p90 <= p99".into()))
    }
}

/// Rates must be finite numbers. `range` lets NaN through.
pub fn validate_fault_rates(fault: &FaultConfig) -> Result<(), ValidationError> {
    if !fault.rate.is_finite() {
        return Err(ValidationError::new("invalid_fault_rate")
            .with_message("rate must be a number in [0, 1]".into()));
    }

    match &fault.secondary {
        Some(secondary) if !secondary.rate.is_finite() || secondary.validate().is_err() => {
            Err(ValidationError::new("invalid_secondary_fault")
                .with_message("secondary rate must be in [0, 1] and code in [100, 599]".into()))
        }
        _ => Ok(()),
    }
}

pub fn validate_cpu_load(cpu: &CpuLoadConfig) -> Result<(), ValidationError> {
    if cpu.cores == Some(0) {
        return Err(ValidationError::new("zero_cores")
            .with_message("cores must be at least 1 when set".into()));
    }
    if !cpu.percentage.is_finite() {
        return Err(ValidationError::new("invalid_percentage")
            .with_message("percentage must be a number in [0, 100]".into()));
    }
    Ok(())
}

/// Validate a tracing level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}
