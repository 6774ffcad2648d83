//! Audit events and filters

use std::fmt;

use chrono::{DateTime, Utc};
use golive_types::AuditEventId;
use serde::{Deserialize, Serialize};

/// What an audit event records.
///
/// Serialized as its snake_case string; unknown strings round-trip as
/// [`AuditAction::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuditAction {
    SimulationRun,
    PlanCreated,
    PlanApproved,
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    ExecutionDryRun,
    StepApplied,
    CheckpointCreated,
    RollbackCompleted,
    ReadinessOverride,
    CapabilitiesRegistered,
    Custom(String),
}

impl AuditAction {
    pub fn as_str(&self) -> &str {
        match self {
            AuditAction::SimulationRun => "simulation_run",
            AuditAction::PlanCreated => "plan_created",
            AuditAction::PlanApproved => "plan_approved",
            AuditAction::ExecutionStarted => "execution_started",
            AuditAction::ExecutionCompleted => "execution_completed",
            AuditAction::ExecutionFailed => "execution_failed",
            AuditAction::ExecutionDryRun => "execution_dry_run",
            AuditAction::StepApplied => "step_applied",
            AuditAction::CheckpointCreated => "checkpoint_created",
            AuditAction::RollbackCompleted => "rollback_completed",
            AuditAction::ReadinessOverride => "readiness_override",
            AuditAction::CapabilitiesRegistered => "capabilities_registered",
            AuditAction::Custom(action) => action,
        }
    }
}

impl From<String> for AuditAction {
    fn from(value: String) -> Self {
        match value.as_str() {
            "simulation_run" => AuditAction::SimulationRun,
            "plan_created" => AuditAction::PlanCreated,
            "plan_approved" => AuditAction::PlanApproved,
            "execution_started" => AuditAction::ExecutionStarted,
            "execution_completed" => AuditAction::ExecutionCompleted,
            "execution_failed" => AuditAction::ExecutionFailed,
            "execution_dry_run" => AuditAction::ExecutionDryRun,
            "step_applied" => AuditAction::StepApplied,
            "checkpoint_created" => AuditAction::CheckpointCreated,
            "rollback_completed" => AuditAction::RollbackCompleted,
            "readiness_override" => AuditAction::ReadinessOverride,
            "capabilities_registered" => AuditAction::CapabilitiesRegistered,
            _ => AuditAction::Custom(value),
        }
    }
}

impl From<&str> for AuditAction {
    fn from(value: &str) -> Self {
        AuditAction::from(value.to_string())
    }
}

impl From<AuditAction> for String {
    fn from(action: AuditAction) -> Self {
        match action {
            AuditAction::Custom(action) => action,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: AuditEventId,
    pub action: AuditAction,
    pub description: String,
    pub actor: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        description: impl Into<String>,
        actor: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            id: AuditEventId::generate(),
            action,
            description: description.into(),
            actor: actor.into(),
            success,
            timestamp: Utc::now(),
        }
    }
}

/// Query parameters for audit log search
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub action: Option<AuditAction>,
    pub actor: Option<String>,
    pub success: Option<bool>,
    /// Inclusive lower bound on `timestamp`.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `timestamp`.
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn action(action: impl Into<AuditAction>) -> Self {
        Self {
            action: Some(action.into()),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(ref action) = self.action {
            if event.action != *action {
                return false;
            }
        }
        if let Some(ref actor) = self.actor {
            if event.actor != *actor {
                return false;
            }
        }
        if let Some(success) = self.success {
            if event.success != success {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp > until {
                return false;
            }
        }
        true
    }
}
