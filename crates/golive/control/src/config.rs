//! Control plane configuration

use golive_executor::ExecutorConfig;
use golive_readiness::ReadinessConfig;
use serde::{Deserialize, Serialize};

/// Control plane configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Master switch. When off every operation answers `Disabled`.
    pub enabled: bool,
    pub readiness: ReadinessConfig,
    pub executor: ExecutorConfig,
    /// Register the dependency-graph and registry-integrity probes on build.
    pub builtin_probes: bool,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            readiness: ReadinessConfig::default(),
            executor: ExecutorConfig::default(),
            builtin_probes: true,
        }
    }
}

impl ControlPlaneConfig {
    /// Development profile: no readiness gate, no approval rule, no caching.
    pub fn development() -> Self {
        Self {
            enabled: true,
            readiness: ReadinessConfig::development(),
            executor: ExecutorConfig::permissive(),
            builtin_probes: true,
        }
    }
}
