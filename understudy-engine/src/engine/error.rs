use thiserror::Error;
use understudy_config::ConfigError;
use understudy_upstream::UpstreamError;

/// Failures while assembling a node. Requests themselves never fail.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Upstream setup failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}
