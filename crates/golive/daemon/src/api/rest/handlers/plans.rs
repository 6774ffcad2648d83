//! Plan, execution and rollback handlers

use super::default_actor;
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use golive_control::{ExecuteOptions, ExecutionPlan, ExecutionResult, RollbackResult};
use golive_executor::Checkpoint;
use golive_types::{CapabilityAction, ExecutionId, PlanId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Create plan request
#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    pub name: String,
    pub actions: Vec<CapabilityAction>,
    #[serde(default = "default_actor")]
    pub created_by: String,
}

/// Approve plan request
#[derive(Debug, Deserialize)]
pub struct ApprovePlanRequest {
    pub approver: String,
}

/// Rollback request
#[derive(Debug, Deserialize)]
pub struct RollbackRequest {
    #[serde(default = "default_actor")]
    pub actor: String,
    /// Restore this step's checkpoint instead of the latest
    #[serde(default)]
    pub step_index: Option<usize>,
}

/// Latest checkpoint of an execution
#[derive(Debug, Serialize)]
pub struct CheckpointResponse {
    #[serde(flatten)]
    pub checkpoint: Checkpoint,
    pub can_rollback: bool,
}

/// Simulate the actions and create a draft plan from the result
pub async fn create_plan(
    State(state): State<AppState>,
    Json(request): Json<CreatePlanRequest>,
) -> ApiResult<(StatusCode, Json<ExecutionPlan>)> {
    if request.actions.is_empty() {
        return Err(ApiError::BadRequest("actions must not be empty".to_string()));
    }

    let plan = state
        .plane
        .plan_actions(&request.actions, &request.name, &request.created_by)
        .await?;

    Ok((StatusCode::CREATED, Json(plan)))
}

/// List all plans
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<ExecutionPlan>>> {
    Ok(Json(state.plane.list_plans()?))
}

/// Get a specific plan
pub async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ExecutionPlan>> {
    let plan_id = parse_plan_id(&id)?;
    Ok(Json(state.plane.get_plan(&plan_id)?))
}

/// Approve a draft plan
pub async fn approve_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ApprovePlanRequest>,
) -> ApiResult<Json<ExecutionPlan>> {
    let plan_id = parse_plan_id(&id)?;
    Ok(Json(state.plane.approve_plan(&plan_id, &request.approver).await?))
}

/// Execute an approved plan. An empty body runs with default options.
pub async fn execute_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
    options: Option<Json<ExecuteOptions>>,
) -> ApiResult<Json<ExecutionResult>> {
    let plan_id = parse_plan_id(&id)?;
    let options = options.map(|Json(options)| options).unwrap_or_default();
    Ok(Json(state.plane.execute_plan(&plan_id, options).await?))
}

/// Roll an execution back to a checkpoint
pub async fn rollback_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RollbackRequest>,
) -> ApiResult<Json<RollbackResult>> {
    let execution_id = parse_execution_id(&id)?;
    let result = state
        .plane
        .rollback(&execution_id, request.step_index, &request.actor)
        .await?;
    Ok(Json(result))
}

/// Latest checkpoint of an execution
pub async fn get_checkpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CheckpointResponse>> {
    let execution_id = parse_execution_id(&id)?;
    let checkpoint = state.plane.get_checkpoint(&execution_id).await?;
    let can_rollback = state.plane.can_rollback(&execution_id).await?;

    Ok(Json(CheckpointResponse {
        checkpoint,
        can_rollback,
    }))
}

/// Parse a plan ID from a string
fn parse_plan_id(id: &str) -> ApiResult<PlanId> {
    parse_uuid(id, "plan").map(PlanId::from_uuid)
}

/// Parse an execution ID from a string
fn parse_execution_id(id: &str) -> ApiResult<ExecutionId> {
    parse_uuid(id, "execution").map(ExecutionId::from_uuid)
}

/// Accept both the bare UUID and the `plan:`/`exec:` display form
fn parse_uuid(id: &str, kind: &str) -> ApiResult<Uuid> {
    let raw = id
        .strip_prefix("plan:")
        .or_else(|| id.strip_prefix("exec:"))
        .unwrap_or(id);
    Uuid::parse_str(raw).map_err(|e| ApiError::BadRequest(format!("Invalid {} ID '{}': {}", kind, id, e)))
}
