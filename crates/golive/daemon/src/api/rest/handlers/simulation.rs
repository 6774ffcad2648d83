//! Simulation handlers

use super::default_actor;
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{extract::State, Json};
use golive_simulator::{SimulationResult, StateComparison};
use golive_types::CapabilityAction;
use serde::Deserialize;

/// One action or a batch of simultaneous actions
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SimulationTarget {
    Batch { actions: Vec<CapabilityAction> },
    Single(CapabilityAction),
}

/// Simulate request
#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    #[serde(flatten)]
    pub target: SimulationTarget,
    #[serde(default = "default_actor")]
    pub actor: String,
}

/// Compare request
#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub actions: Vec<CapabilityAction>,
}

/// Simulate without touching the registry
pub async fn simulate(
    State(state): State<AppState>,
    Json(request): Json<SimulateRequest>,
) -> ApiResult<Json<SimulationResult>> {
    let result = match request.target {
        SimulationTarget::Single(action) => state.plane.simulate(action, &request.actor).await?,
        SimulationTarget::Batch { actions } => {
            if actions.is_empty() {
                return Err(ApiError::BadRequest("actions must not be empty".to_string()));
            }
            state.plane.simulate_batch(&actions, &request.actor).await?
        }
    };

    Ok(Json(result))
}

/// Current and projected enablement side by side
pub async fn compare_states(
    State(state): State<AppState>,
    Json(request): Json<CompareRequest>,
) -> ApiResult<Json<StateComparison>> {
    Ok(Json(state.plane.compare_states(&request.actions)?))
}
