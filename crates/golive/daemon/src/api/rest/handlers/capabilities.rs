//! Capability and dependency graph handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use golive_registry::DomainGroup;
use golive_resolver::{BlastRadius, DependencyValidation, InvalidStateReport};
use golive_types::{Capability, CapabilityId};
use serde::Serialize;

/// List all capabilities
pub async fn list_capabilities(State(state): State<AppState>) -> ApiResult<Json<Vec<Capability>>> {
    Ok(Json(state.plane.list_capabilities()?))
}

/// Capabilities grouped by domain
pub async fn list_domains(State(state): State<AppState>) -> ApiResult<Json<Vec<DomainGroup>>> {
    Ok(Json(state.plane.capabilities_by_domain()?))
}

/// Disabled capabilities whose dependencies are all enabled
pub async fn safe_to_enable(State(state): State<AppState>) -> ApiResult<Json<Vec<CapabilityId>>> {
    Ok(Json(state.plane.safe_to_enable()?))
}

/// Everything that breaks if `id` is disabled
pub async fn blast_radius(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BlastRadius>> {
    Ok(Json(state.plane.blast_radius(&CapabilityId::new(id))?))
}

/// Graph health report
#[derive(Debug, Serialize)]
pub struct GraphValidationResponse {
    pub validation: DependencyValidation,
    pub invalid_states: InvalidStateReport,
}

/// Validate declared dependencies and live enablement
pub async fn graph_validation(
    State(state): State<AppState>,
) -> ApiResult<Json<GraphValidationResponse>> {
    let validation = state.plane.validate_dependencies()?;
    let invalid_states = state.plane.detect_invalid_states()?;

    Ok(Json(GraphValidationResponse {
        validation,
        invalid_states,
    }))
}
