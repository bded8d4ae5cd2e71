//! Auth facade endpoints
//!
//! Thin JSON surface over the facade: access decision, sign-in, sign-out.
//! The pages of the course site call these instead of re-deriving access
//! state from scattered sources.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::extract::Json;
use crate::auth::{AccessDecision, Session};
use crate::error::{Error, Result};
use crate::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    test_mode: bool,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    success: bool,
    email: String,
    test_mode: bool,
}

#[derive(Debug, Deserialize)]
pub struct SignOutRequest {
    email: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/access - Decide course access for a visitor
pub async fn check_access(
    State(state): State<AppState>,
    Json(request): Json<AccessRequest>,
) -> Json<AccessDecision> {
    let decision = state
        .auth
        .check_access(request.email.as_deref(), request.test_mode)
        .await;
    Json(decision)
}

/// POST /api/auth/sign-in - Authenticate, remote first with local fallback
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SignInResponse>> {
    match state.auth.sign_in(&request.email, &request.password).await? {
        Session::Authenticated { email, test_mode } => {
            info!("Signed in {}", email);
            Ok(Json(SignInResponse {
                success: true,
                email,
                test_mode,
            }))
        }
        Session::Unauthenticated => Err(Error::Unauthorized("invalid credentials".to_string())),
    }
}

/// POST /api/auth/sign-out - End the session everywhere
pub async fn sign_out(
    State(state): State<AppState>,
    Json(request): Json<SignOutRequest>,
) -> Result<Json<StatusResponse>> {
    state.auth.sign_out(&request.email).await?;
    Ok(Json(StatusResponse {
        status: "signed out".to_string(),
    }))
}
