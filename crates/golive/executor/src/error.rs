//! Executor error types

use golive_audit::AuditError;
use golive_types::{Blocker, ExecutionId, PlanId, RiskLevel};
use thiserror::Error;

use crate::plan::PlanStatus;

/// Errors from plan creation, approval, execution and rollback.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Plan not found: {0}")]
    PlanNotFound(PlanId),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    #[error("No checkpoint recorded for execution {0}")]
    NoCheckpoint(ExecutionId),

    #[error("Checkpoint {step_index} not found for execution {execution_id}")]
    CheckpointNotFound {
        execution_id: ExecutionId,
        step_index: usize,
    },

    #[error("Simulation is not feasible ({} blockers)", blockers.len())]
    InfeasibleSimulation { blockers: Vec<Blocker> },

    #[error("Simulation contains no state changes")]
    EmptyPlan,

    #[error("Plan {0} has not been approved")]
    PlanNotApproved(PlanId),

    #[error("Plan {plan_id} cannot {operation} while {status}")]
    InvalidTransition {
        plan_id: PlanId,
        status: PlanStatus,
        operation: &'static str,
    },

    #[error("Plan {plan_id} at {risk} risk must be approved by someone other than {actor}")]
    SelfApproval {
        plan_id: PlanId,
        risk: RiskLevel,
        actor: String,
    },

    #[error("Plan {0} is already executing")]
    AlreadyExecuting(PlanId),

    #[error("Environment is not ready for go-live: {}", reasons.join("; "))]
    ReadinessBlocked { reasons: Vec<String> },

    #[error("Checkpoint store error: {0}")]
    CheckpointStore(String),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),
}

impl ExecutionError {
    /// Machine-readable reasons behind a validation or conflict error.
    pub fn blockers(&self) -> Vec<Blocker> {
        match self {
            ExecutionError::InfeasibleSimulation { blockers } => blockers.clone(),
            ExecutionError::ReadinessBlocked { reasons } => reasons
                .iter()
                .map(|reason| Blocker::new("readiness_blocked", reason.clone()))
                .collect(),
            ExecutionError::EmptyPlan => vec![Blocker::new("empty_plan", self.to_string())],
            ExecutionError::PlanNotApproved(_) => {
                vec![Blocker::new("plan_not_approved", self.to_string())]
            }
            ExecutionError::InvalidTransition { .. } => {
                vec![Blocker::new("invalid_transition", self.to_string())]
            }
            ExecutionError::SelfApproval { .. } => {
                vec![Blocker::new("self_approval", self.to_string())]
            }
            ExecutionError::AlreadyExecuting(_) => {
                vec![Blocker::new("already_executing", self.to_string())]
            }
            _ => Vec::new(),
        }
    }
}

/// Result type for executor operations
pub type Result<T> = std::result::Result<T, ExecutionError>;
