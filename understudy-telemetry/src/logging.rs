//! ## understudy-telemetry::logging
//! **Subscriber setup for the node process**
//!
//! `RUST_LOG` wins over the configured level when it is set.

use std::error::Error;

use tracing_subscriber::{fmt, EnvFilter};
use understudy_config::{LogFormat, TelemetryConfig};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Fails if one is already installed.
    pub fn init(config: &TelemetryConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.log_level))?;

        let builder = fmt().with_env_filter(filter).with_thread_names(true);
        match config.log_format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Text => builder.try_init(),
        }
    }
}
