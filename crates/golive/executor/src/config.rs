//! Executor configuration

use golive_types::RiskLevel;
use serde::{Deserialize, Serialize};

/// Plan executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Consult go-live readiness before a real execution starts.
    pub readiness_gate: bool,

    /// Run the quick health check before every step after the first.
    pub health_check_between_steps: bool,

    /// Plans at or above this risk need an approver other than their creator.
    pub require_distinct_approver_from: Option<RiskLevel>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            readiness_gate: true,
            health_check_between_steps: false,
            require_distinct_approver_from: Some(RiskLevel::High),
        }
    }
}

impl ExecutorConfig {
    /// No gates and no approval rule, for local work and tests.
    pub fn permissive() -> Self {
        Self {
            readiness_gate: false,
            health_check_between_steps: false,
            require_distinct_approver_from: None,
        }
    }

    pub(crate) fn needs_distinct_approver(&self, risk: RiskLevel) -> bool {
        self.require_distinct_approver_from
            .is_some_and(|threshold| risk >= threshold)
    }
}
