//! Configuration for golived

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use golive_control::ControlPlaneConfig;
use golive_executor::ExecutorConfig;
use golive_readiness::ReadinessConfig;
use serde::{Deserialize, Serialize};

/// Main daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Master switch for the control plane (`GOLIVE_ENABLED`)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Capability manifests
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,

    /// Readiness evaluation
    #[serde(default)]
    pub readiness: ReadinessSettings,

    /// Plan execution
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server: ServerConfig::default(),
            capabilities: CapabilitiesConfig::default(),
            readiness: ReadinessSettings::default(),
            executor: ExecutorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Where capability definitions come from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitiesConfig {
    /// TOML manifests with `[[capability]]` tables, read in order
    #[serde(default)]
    pub manifests: Vec<PathBuf>,
}

/// Readiness settings in config-file units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessSettings {
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    #[serde(default = "default_proceed_threshold")]
    pub proceed_threshold: u8,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_concurrent_probes: default_max_concurrent_probes(),
            proceed_threshold: default_proceed_threshold(),
        }
    }
}

impl From<&ReadinessSettings> for ReadinessConfig {
    fn from(settings: &ReadinessSettings) -> Self {
        ReadinessConfig {
            probe_timeout: Duration::from_millis(settings.probe_timeout_ms),
            cache_ttl: Duration::from_secs(settings.cache_ttl_secs),
            max_concurrent_probes: settings.max_concurrent_probes,
            proceed_threshold: settings.proceed_threshold,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_cache_ttl_secs() -> u64 {
    30
}

fn default_max_concurrent_probes() -> usize {
    16
}

fn default_proceed_threshold() -> u8 {
    90
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then `GOLIVE_*`
    /// environment variables. Nested keys use `__`, e.g.
    /// `GOLIVE_SERVER__LISTEN_ADDR`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with GOLIVE_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("GOLIVE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Control plane configuration derived from the daemon settings.
    pub fn control_plane(&self) -> ControlPlaneConfig {
        ControlPlaneConfig {
            enabled: self.enabled,
            readiness: ReadinessConfig::from(&self.readiness),
            executor: self.executor.clone(),
            builtin_probes: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use golive_types::RiskLevel;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert!(config.enabled);
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert!(config.capabilities.manifests.is_empty());
    }

    #[test]
    fn test_control_plane_config() {
        let mut config = DaemonConfig::default();
        config.enabled = false;
        config.readiness.cache_ttl_secs = 5;

        let control = config.control_plane();
        assert!(!control.enabled);
        assert_eq!(control.readiness.cache_ttl, Duration::from_secs(5));
        assert_eq!(
            control.executor.require_distinct_approver_from,
            Some(RiskLevel::High)
        );
    }
}
