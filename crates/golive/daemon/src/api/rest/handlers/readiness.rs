//! Readiness handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, Json};
use golive_readiness::{GoLiveReadiness, ReadinessSnapshot};

/// Go-live verdict, served from cache when fresh
pub async fn go_live_status(State(state): State<AppState>) -> ApiResult<Json<GoLiveReadiness>> {
    Ok(Json(state.plane.go_live_readiness(true).await?))
}

/// Run every probe
pub async fn run_checks(State(state): State<AppState>) -> ApiResult<Json<ReadinessSnapshot>> {
    Ok(Json(state.plane.evaluate_readiness(false).await?))
}

/// Run the lightweight probes only
pub async fn run_quick_checks(
    State(state): State<AppState>,
) -> ApiResult<Json<ReadinessSnapshot>> {
    Ok(Json(state.plane.quick_health_check().await?))
}
