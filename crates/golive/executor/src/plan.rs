//! Execution plans
//!
//! A plan freezes the ordered steps of one feasible simulation. After
//! approval only its status changes.

use std::fmt;

use chrono::{DateTime, Utc};
use golive_simulator::SimulationResult;
use golive_types::{ActionKind, CapabilityId, ExecutionId, PlanId, RiskLevel, SimulationId};
use serde::{Deserialize, Serialize};

/// Plan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Approved,
    Executing,
    Completed,
    Failed,
    RolledBack,
}

impl PlanStatus {
    /// Completed, failed and rolled-back plans never execute again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanStatus::Completed | PlanStatus::Failed | PlanStatus::RolledBack
        )
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Draft => write!(f, "draft"),
            PlanStatus::Approved => write!(f, "approved"),
            PlanStatus::Executing => write!(f, "executing"),
            PlanStatus::Completed => write!(f, "completed"),
            PlanStatus::Failed => write!(f, "failed"),
            PlanStatus::RolledBack => write!(f, "rolledback"),
        }
    }
}

/// One ordered state change. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub index: usize,
    pub capability_id: CapabilityId,
    pub action: ActionKind,
}

/// Execution plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: PlanId,
    pub name: String,
    pub simulation_id: SimulationId,
    pub steps: Vec<PlanStep>,
    pub risk_level: RiskLevel,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub status: PlanStatus,
    /// Most recent execution, real runs only.
    pub last_execution: Option<ExecutionId>,
}

impl ExecutionPlan {
    /// Draft plan from a simulation. Steps follow the simulation's order:
    /// every disable, then every enable.
    pub fn from_simulation(
        simulation: &SimulationResult,
        name: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        let steps = simulation
            .steps()
            .into_iter()
            .enumerate()
            .map(|(i, step)| PlanStep {
                index: i + 1,
                capability_id: step.capability_id,
                action: step.action,
            })
            .collect();

        Self {
            id: PlanId::generate(),
            name: name.into(),
            simulation_id: simulation.id.clone(),
            steps,
            risk_level: simulation.risk_level,
            created_by: created_by.into(),
            created_at: Utc::now(),
            approved_by: None,
            approved_at: None,
            status: PlanStatus::Draft,
            last_execution: None,
        }
    }
}
