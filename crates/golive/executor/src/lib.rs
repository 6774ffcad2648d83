//! Go-Live Executor - Approved plans, checkpoints and rollback
//!
//! This crate provides:
//!
//! - **Plans**: [`ExecutionPlan`] frozen from one feasible simulation, with the
//!   `draft -> approved -> executing -> completed | failed -> rolledback`
//!   lifecycle
//! - **PlanExecutor**: ordered, per-plan serialized execution with a readiness
//!   gate, dry runs and a checkpoint after every applied step
//! - **Checkpoints**: [`CheckpointStore`] with an in-memory implementation;
//!   rollback restores a captured enablement state exactly once
//! - **Step hooks**: [`StepHook`], the application-side actuator called before
//!   each real step

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod executor;
pub mod hook;
pub mod plan;

pub use checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
pub use config::ExecutorConfig;
pub use error::{ExecutionError, Result};
pub use executor::{
    ExecuteOptions, ExecutionResult, PlanExecutor, RollbackResult, StepOutcome, StepStatus,
};
pub use hook::{HookError, NoopStepHook, StepHook};
pub use plan::{ExecutionPlan, PlanStatus, PlanStep};
