pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
use rest::{
    canonical_handler, constraints_handler, create_branch_handler, export_handler,
    list_branches_handler, status_handler, validate_handler, vote_handler,
};
use state::AppState;

/// Builds the API routes. CORS and the Swagger UI are layered on by the binary.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/export", get(export_handler))
        .route("/constraints", get(constraints_handler))
        .route("/validate", post(validate_handler))
        .route("/branches", get(list_branches_handler));

    // Protected routes (session cookie required)
    let protected_routes = Router::new()
        .route("/branches", post(create_branch_handler))
        .route("/branches/{id}/vote", put(vote_handler))
        .route("/branches/{id}/canonical", put(canonical_handler))
        .route("/branches/{id}/status", put(status_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
