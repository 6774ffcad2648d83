//! Readiness evaluator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the readiness evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Timeout applied to probes that do not declare their own.
    pub probe_timeout: Duration,

    /// How long a readiness snapshot may be served from cache.
    pub cache_ttl: Duration,

    /// Upper bound on probes running at the same time.
    pub max_concurrent_probes: usize,

    /// Minimum score (0-100) at which a `DEGRADED` environment is still
    /// recommended as `PROCEED` rather than `PROCEED_WITH_CAUTION`.
    pub proceed_threshold: u8,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(30),
            max_concurrent_probes: 16,
            proceed_threshold: 90,
        }
    }
}

impl ReadinessConfig {
    /// Short timeouts and no caching, for tests and local runs.
    pub fn development() -> Self {
        Self {
            probe_timeout: Duration::from_millis(500),
            cache_ttl: Duration::ZERO,
            max_concurrent_probes: 4,
            proceed_threshold: 90,
        }
    }
}
