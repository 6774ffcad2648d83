//! Readiness error types

use thiserror::Error;

/// Errors from probe registration and probe execution.
#[derive(Debug, Error)]
pub enum ReadinessError {
    /// Returned by a probe's `run`; the evaluator turns it into a `fail` result.
    #[error("Probe {probe_id} failed: {reason}")]
    ProbeFailed { probe_id: String, reason: String },

    #[error("Probe already registered: {0}")]
    DuplicateProbe(String),

    #[error("Probe not found: {0}")]
    ProbeNotFound(String),
}

impl ReadinessError {
    pub fn probe_failed(probe_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            probe_id: probe_id.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for readiness operations
pub type Result<T> = std::result::Result<T, ReadinessError>;
