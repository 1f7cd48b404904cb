//! # Understudy Configuration
//!
//! Layered configuration for a single understudy node. Every node in a
//! synthetic topology is the same binary with a different configuration:
//! its name, the upstreams it calls, how long it pretends to work, how often
//! it fails and how much CPU and memory it burns while doing so.
//!
//! ## Hierarchy
//! 1. Default values
//! 2. A YAML file (`config/understudy.yaml` unless a path is given)
//! 3. `UNDERSTUDY_*` environment variables, `__` separating nested keys
//!
//! Loading validates the result. Any error here is fatal: a node with a bad
//! configuration must not start serving.

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod fault;
mod load;
mod server;
mod telemetry;
mod timing;
mod upstream;
mod validation;

pub use error::ConfigError;
pub use fault::{FaultConfig, FaultKind, SecondaryFaultConfig};
pub use load::{CpuLoadConfig, LoadConfig, MemoryLoadConfig};
pub use server::ServerConfig;
pub use telemetry::{LogFormat, TelemetryConfig};
pub use timing::TimingConfig;
pub use upstream::{TransportKind, UpstreamConfig, UpstreamTarget};

/// Default location of the node configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/understudy.yaml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "UNDERSTUDY_";

/// Complete configuration of one node. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NodeConfig {
    /// Name reported in this node's response tree.
    pub name: String,

    /// Body reported by this node on success.
    pub message: String,

    /// Seed for every random draw. Taken from the clock when absent.
    pub seed: Option<u64>,

    /// Upstream targets and how to call them.
    #[validate(nested)]
    pub upstream: UpstreamConfig,

    /// Latency percentiles for the node's own work.
    #[validate(nested)]
    pub timing: TimingConfig,

    /// Fault injection policy.
    #[validate(nested)]
    pub fault: FaultConfig,

    /// Synthetic CPU and memory load.
    #[validate(nested)]
    pub load: LoadConfig,

    /// Listener settings.
    #[validate(nested)]
    pub server: ServerConfig,

    /// Logging settings.
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "Service".into(),
            message: "Hello World".into(),
            seed: None,
            upstream: UpstreamConfig::default(),
            timing: TimingConfig::default(),
            fault: FaultConfig::default(),
            load: LoadConfig::default(),
            server: ServerConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from the default file (if present) and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(NodeConfig::default()));

        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            figment = figment.merge(Yaml::file(DEFAULT_CONFIG_PATH));
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from a specific file, then apply environment overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        Self::extract(
            Figment::from(Serialized::defaults(NodeConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Extract and validate a configuration from an arbitrary figment.
    pub fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.check()?;
        Ok(config)
    }

    /// Runs field validation and parses the upstream target list.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;
        self.upstream.targets()?;
        Ok(())
    }

    /// The configured seed, or the current UNIX time in seconds.
    pub fn seed_or_now(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or_default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = NodeConfig::default();
        config.check().expect("default config should validate");
        assert_eq!(config.name, "Service");
        assert_eq!(config.upstream.workers, 1);
    }

    #[test]
    fn nan_fault_rate_fails_check() {
        let mut config = NodeConfig::default();
        config.fault.rate = f64::NAN;
        assert!(matches!(config.check(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn yaml_and_environment_layering() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "node.yaml",
                r#"
name: checkout
upstream:
  uris: "http://payments:9090, grpc://inventory:9091,"
  workers: 2
timing:
  p50_ms: 20
  p99_ms: 80
"#,
            )?;
            jail.set_env("UNDERSTUDY_FAULT__RATE", "0.25");
            jail.set_env("UNDERSTUDY_SEED", "7");

            let config = NodeConfig::load_from_path("node.yaml").expect("config should load");
            assert_eq!(config.name, "checkout");
            assert_eq!(config.seed, Some(7));
            assert_eq!(config.fault.rate, 0.25);
            assert_eq!(
                config.upstream.uris,
                vec!["http://payments:9090", "grpc://inventory:9091"]
            );

            let targets = config.upstream.targets().expect("targets should parse");
            assert_eq!(targets[1].kind, TransportKind::Rpc);
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_reported() {
        let err = NodeConfig::load_from_path("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn invalid_percentiles_are_fatal() {
        let mut config = NodeConfig::default();
        config.timing.p50_ms = 300;
        config.timing.p90_ms = 100;
        assert!(matches!(config.check(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn malformed_target_is_fatal() {
        let mut config = NodeConfig::default();
        config.upstream.uris = vec!["ftp://files:21".into()];
        assert!(matches!(
            config.check(),
            Err(ConfigError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn explicit_seed_wins_over_clock() {
        let config = NodeConfig {
            seed: Some(42),
            ..NodeConfig::default()
        };
        assert_eq!(config.seed_or_now(), 42);
    }
}
