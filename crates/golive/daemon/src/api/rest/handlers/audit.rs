//! Audit log handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Query, State},
    Json,
};
use golive_audit::{ActivitySummary, AuditEvent, AuditFilter};
use serde::Deserialize;

/// Activity summary query
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
}

fn default_window_hours() -> u32 {
    24
}

/// Query the audit log, newest first
pub async fn get_audit_log(
    State(state): State<AppState>,
    Query(filter): Query<AuditFilter>,
) -> ApiResult<Json<Vec<AuditEvent>>> {
    Ok(Json(state.plane.audit_log(&filter).await?))
}

/// Counts over a rolling window
pub async fn get_activity_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<ActivitySummary>> {
    Ok(Json(state.plane.activity_summary(query.window_hours).await?))
}
