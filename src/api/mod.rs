//! HTTP API
//!
//! JSON handlers for the submission moderation workflow, the auth facade,
//! and checkout, plus the admin bearer-token middleware.

pub mod account;
pub mod auth;
pub mod checkout;
pub mod extract;
pub mod submissions;

use axum::Json;
use serde_json::json;

/// GET /health - Health check endpoint
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "storyhub",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
