//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use golive_control::ControlPlaneError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        // Readiness
        .route("/status", get(handlers::go_live_status))
        .route("/checks", get(handlers::run_checks))
        .route("/checks/quick", get(handlers::run_quick_checks))
        // Capabilities
        .route("/capabilities", get(handlers::list_capabilities))
        .route("/capabilities/domains", get(handlers::list_domains))
        .route("/capabilities/safe-to-enable", get(handlers::safe_to_enable))
        .route("/capabilities/:id/blast-radius", get(handlers::blast_radius))
        .route("/graph/validation", get(handlers::graph_validation))
        // Simulation
        .route("/simulate", post(handlers::simulate))
        .route("/compare", post(handlers::compare_states))
        // Plans
        .route("/plans", get(handlers::list_plans))
        .route("/plans", post(handlers::create_plan))
        .route("/plans/:id", get(handlers::get_plan))
        .route("/plans/:id/approve", post(handlers::approve_plan))
        .route("/plans/:id/execute", post(handlers::execute_plan))
        // Executions
        .route("/executions/:id/rollback", post(handlers::rollback_execution))
        .route("/executions/:id/checkpoint", get(handlers::get_checkpoint))
        // Audit
        .route("/audit", get(handlers::get_audit_log))
        .route("/audit/summary", get(handlers::get_activity_summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_enabled));

    // Build router with middleware
    let router = Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}

/// Refuse every API call while the control plane is switched off.
async fn require_enabled(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.plane.is_enabled() {
        return ApiError::from(ControlPlaneError::Disabled).into_response();
    }
    next.run(request).await
}
