//! Error types for the control plane
//!
//! Every refusal carries a machine-readable [`Blocker`] list. Subsystem
//! errors are folded into this taxonomy at the facade boundary.

use golive_audit::AuditError;
use golive_executor::ExecutionError;
use golive_readiness::ReadinessError;
use golive_registry::RegistryError;
use golive_resolver::ResolverError;
use golive_simulator::SimulationError;
use golive_types::Blocker;
use thiserror::Error;

/// Blocker codes that describe a clash rather than an invalid request.
const CONFLICT_CODES: &[&str] = &[
    "mutually_exclusive",
    "dependency_disabled",
    "contradictory_actions",
];

/// Control plane error type
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// The control plane is switched off
    #[error("Go-live control plane is disabled")]
    Disabled,

    /// Missing dependency, cycle, unapproved plan and similar refusals
    #[error("Validation failed: {}", join(.reasons))]
    Validation { reasons: Vec<Blocker> },

    /// Blocking conflict or concurrent execution of one plan
    #[error("Conflict: {}", join(.reasons))]
    Conflict { reasons: Vec<Blocker> },

    /// The actor may not perform the operation
    #[error("Forbidden: {}", join(.reasons))]
    Forbidden { reasons: Vec<Blocker> },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage or other infrastructure failure, passed through unmasked
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

fn join(reasons: &[Blocker]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for control plane operations
pub type Result<T> = std::result::Result<T, ControlPlaneError>;

impl ControlPlaneError {
    pub fn validation(code: &str, detail: impl Into<String>) -> Self {
        Self::Validation {
            reasons: vec![Blocker::new(code, detail)],
        }
    }

    /// Stable error code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Disabled => "DISABLED",
            Self::Validation { .. } => "VALIDATION_FAILED",
            Self::Conflict { .. } => "CONFLICT",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Infrastructure(_) => "INFRASTRUCTURE",
        }
    }

    /// Reasons behind the error; empty for not-found and infrastructure errors.
    pub fn reasons(&self) -> &[Blocker] {
        match self {
            Self::Validation { reasons } | Self::Conflict { reasons } | Self::Forbidden { reasons } => {
                reasons
            }
            _ => &[],
        }
    }
}

impl From<ExecutionError> for ControlPlaneError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::PlanNotFound(_)
            | ExecutionError::ExecutionNotFound(_)
            | ExecutionError::NoCheckpoint(_)
            | ExecutionError::CheckpointNotFound { .. } => Self::NotFound(err.to_string()),
            ExecutionError::InfeasibleSimulation { ref blockers } => {
                let reasons = blockers.clone();
                if reasons.iter().any(|b| CONFLICT_CODES.contains(&b.code.as_str())) {
                    Self::Conflict { reasons }
                } else {
                    Self::Validation { reasons }
                }
            }
            ExecutionError::AlreadyExecuting(_) => Self::Conflict {
                reasons: err.blockers(),
            },
            ExecutionError::SelfApproval { .. } => Self::Forbidden {
                reasons: err.blockers(),
            },
            ExecutionError::EmptyPlan
            | ExecutionError::PlanNotApproved(_)
            | ExecutionError::InvalidTransition { .. }
            | ExecutionError::ReadinessBlocked { .. } => Self::Validation {
                reasons: err.blockers(),
            },
            ExecutionError::CheckpointStore(_) | ExecutionError::Audit(_) => {
                Self::Infrastructure(err.to_string())
            }
        }
    }
}

impl From<ResolverError> for ControlPlaneError {
    fn from(err: ResolverError) -> Self {
        match err {
            ResolverError::UnknownCapability(_) => Self::NotFound(err.to_string()),
            ResolverError::CircularDependency { .. } => {
                Self::validation("circular_dependency", err.to_string())
            }
            ResolverError::MissingDependency {
                ref capability_id, ..
            } => Self::Validation {
                reasons: vec![Blocker::new("missing_dependency", err.to_string())
                    .for_capability(capability_id.clone())],
            },
        }
    }
}

impl From<RegistryError> for ControlPlaneError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::CapabilityNotFound(_) => Self::NotFound(err.to_string()),
            RegistryError::InvalidCapability { ref id, .. } => Self::Validation {
                reasons: vec![
                    Blocker::new("invalid_capability", err.to_string()).for_capability(id.clone())
                ],
            },
            RegistryError::Manifest(_) => Self::validation("invalid_manifest", err.to_string()),
            RegistryError::Source { .. } | RegistryError::Io(_) => {
                Self::Infrastructure(err.to_string())
            }
        }
    }
}

impl From<ReadinessError> for ControlPlaneError {
    fn from(err: ReadinessError) -> Self {
        match err {
            ReadinessError::ProbeNotFound(_) => Self::NotFound(err.to_string()),
            ReadinessError::DuplicateProbe(_) => Self::validation("duplicate_probe", err.to_string()),
            ReadinessError::ProbeFailed { .. } => Self::Infrastructure(err.to_string()),
        }
    }
}

impl From<SimulationError> for ControlPlaneError {
    fn from(err: SimulationError) -> Self {
        Self::validation("no_actions", err.to_string())
    }
}

impl From<AuditError> for ControlPlaneError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::InvalidFilter(_) => Self::validation("invalid_filter", err.to_string()),
            AuditError::StoreUnavailable(_) => Self::Infrastructure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use golive_types::{PlanId, RiskLevel};

    #[test]
    fn test_execution_errors_map_to_taxonomy() {
        let plan_id = PlanId::generate();

        let err: ControlPlaneError = ExecutionError::AlreadyExecuting(plan_id.clone()).into();
        assert_eq!(err.code(), "CONFLICT");
        assert_eq!(err.reasons()[0].code, "already_executing");

        let err: ControlPlaneError = ExecutionError::PlanNotApproved(plan_id.clone()).into();
        assert_eq!(err.code(), "VALIDATION_FAILED");

        let err: ControlPlaneError = ExecutionError::SelfApproval {
            plan_id: plan_id.clone(),
            risk: RiskLevel::High,
            actor: "alice".into(),
        }
        .into();
        assert_eq!(err.code(), "FORBIDDEN");

        let err: ControlPlaneError = ExecutionError::PlanNotFound(plan_id).into();
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(err.reasons().is_empty());
    }

    #[test]
    fn test_infeasible_simulation_classified_by_blocker() {
        let err: ControlPlaneError = ExecutionError::InfeasibleSimulation {
            blockers: vec![Blocker::new("mutually_exclusive", "x conflicts with y")],
        }
        .into();
        assert!(matches!(err, ControlPlaneError::Conflict { .. }));

        let err: ControlPlaneError = ExecutionError::InfeasibleSimulation {
            blockers: vec![Blocker::new("missing_dependency", "x depends on z")],
        }
        .into();
        assert!(matches!(err, ControlPlaneError::Validation { .. }));
    }
}
