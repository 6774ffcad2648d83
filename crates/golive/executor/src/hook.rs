//! Step hooks
//!
//! The application-side actuator for a plan step. The executor calls the hook
//! right before it flips the registry flag; a hook error fails the step and
//! the flag stays as it was.

use async_trait::async_trait;
use thiserror::Error;

use crate::plan::{ExecutionPlan, PlanStep};

/// Refusal raised by a step hook.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct HookError {
    pub reason: String,
}

impl HookError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Invoked before each real (non dry-run) step.
#[async_trait]
pub trait StepHook: Send + Sync {
    async fn before_step(&self, plan: &ExecutionPlan, step: &PlanStep) -> Result<(), HookError>;
}

/// Hook that accepts every step.
pub struct NoopStepHook;

#[async_trait]
impl StepHook for NoopStepHook {
    async fn before_step(&self, _plan: &ExecutionPlan, _step: &PlanStep) -> Result<(), HookError> {
        Ok(())
    }
}
