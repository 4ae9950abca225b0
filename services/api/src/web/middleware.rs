//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use acrostic_core::ports::PortError;
use std::sync::Arc;
use tracing::{error, warn};

use crate::error::ApiError;
use crate::web::state::AppState;

/// Name of the cookie carrying the auth provider's session id.
pub const SESSION_COOKIE: &str = "session";

/// Middleware that resolves the session cookie to an `Identity`.
///
/// If valid, inserts the identity into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized before any handler runs.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(session_id) = session_id(&req) else {
        return ApiError::Port(PortError::Unauthorized).into_response();
    };

    let identity = match state.identities.validate_auth_session(&session_id).await {
        Ok(identity) => identity,
        Err(PortError::Unauthorized) => {
            warn!("Rejected request with an unknown or expired session");
            return ApiError::Port(PortError::Unauthorized).into_response();
        }
        Err(e) => {
            error!("Failed to validate auth session: {:?}", e);
            return ApiError::Port(e).into_response();
        }
    };

    req.extensions_mut().insert(identity);
    next.run(req).await
}

fn session_id(req: &Request) -> Option<String> {
    req.headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            c.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        })
}
