//! Admin authentication middleware
//!
//! Moderation endpoints share one bearer secret; this is not a per-user
//! credential. The header is accepted as `Bearer <token>` or a bare token.
//! An empty configured token disables the check entirely (tests and local
//! development).

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, warn};

use crate::AppState;

/// Admin token middleware, applied to moderation routes only
pub async fn admin_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let expected = state.config.admin_token.as_str();
    if expected.is_empty() {
        debug!("Admin authentication disabled (empty admin token)");
        return Ok(next.run(request).await);
    }

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let token = header_value
        .strip_prefix("Bearer ")
        .unwrap_or(header_value)
        .trim();

    if token != expected {
        warn!("Rejected admin request with invalid token");
        return Err(AuthError::InvalidToken);
    }

    Ok(next.run(request).await)
}

/// Admin authentication failures
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingToken => "Missing admin token",
            AuthError::InvalidToken => "Invalid admin token",
        };

        let body = Json(json!({
            "error": message,
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}
