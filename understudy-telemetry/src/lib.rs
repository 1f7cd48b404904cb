//! # Understudy Telemetry
//!
//! Crate for logging and metrics. Logs go through `tracing`, metrics into a
//! Prometheus registry that the serving surface exposes.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
