//! # Storyhub
//!
//! Backend for a course-sales site: testimonial submissions with a
//! pending/approved/rejected moderation workflow, a dual-source course
//! access facade, and a checkout flow that provisions accounts after
//! payment capture. External collaborators (auth provider, payment
//! gateway, image host, mail API) sit behind traits so the core is
//! testable without the network.

pub mod api;
pub mod auth;
pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod images;
pub mod mailer;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;

use crate::auth::AuthService;
use crate::checkout::CheckoutService;
use crate::config::Config;
use crate::images::ImageHost;

pub use error::{Error, Result};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Service configuration
    pub config: Arc<Config>,
    /// Dual-source auth facade
    pub auth: Arc<AuthService>,
    /// Checkout orchestration
    pub checkout: Arc<CheckoutService>,
    /// Image host for submission uploads
    pub images: Arc<dyn ImageHost>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: Arc<Config>,
        auth: Arc<AuthService>,
        checkout: Arc<CheckoutService>,
        images: Arc<dyn ImageHost>,
    ) -> Self {
        Self {
            db,
            config,
            auth,
            checkout,
            images,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    // Moderation routes (require the admin bearer token)
    let protected = Router::new()
        .route("/api/submissions", get(api::submissions::get_submissions))
        .route(
            "/api/submissions/:id",
            put(api::submissions::update_submission).delete(api::submissions::delete_submission),
        )
        .route(
            "/api/submissions/:id/approve",
            post(api::submissions::approve_submission),
        )
        .route(
            "/api/submissions/:id/reject",
            post(api::submissions::reject_submission),
        )
        .route(
            "/api/submissions/clear-rejected",
            post(api::submissions::clear_rejected),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::admin_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/health", get(api::health))
        .route("/api/submit-testimonial", post(api::submissions::submit_testimonial))
        .route("/api/stories", get(api::submissions::get_approved_stories))
        .route("/api/sync", get(api::submissions::get_sync_timestamp))
        .route("/api/checkout", post(api::checkout::create_payment))
        .route("/api/auth/access", post(api::account::check_access))
        .route("/api/auth/sign-in", post(api::account::sign_in))
        .route("/api/auth/sign-out", post(api::account::sign_out));

    // Permissive CORS (the site is served from a different origin);
    // this also answers OPTIONS preflight on every route.
    Router::new()
        .merge(protected)
        .merge(public)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
