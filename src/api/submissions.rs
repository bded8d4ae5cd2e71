//! Submission and sync endpoints
//!
//! Public: submit a testimonial, read approved stories, read the sync
//! marker. Admin (behind the bearer middleware): list/filter, approve,
//! reject, update, delete, bulk-clear-rejected.

use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::api::extract::Json;
use crate::db;
use crate::db::submissions::{Status, Submission};
use crate::error::{Error, Result};
use crate::images;
use crate::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    app_name: String,
    #[serde(default)]
    app_type: String,
    #[serde(default)]
    experience_level: String,
    #[serde(default)]
    testimonial: String,
    #[serde(default)]
    story: String,
    #[serde(default)]
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    success: bool,
    id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    cleared: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubmissionRequest {
    name: String,
    #[serde(default)]
    email: String,
    app_name: String,
    #[serde(default)]
    app_type: String,
    #[serde(default)]
    experience_level: String,
    testimonial: String,
    story: String,
    status: Status,
    #[serde(default)]
    images: Vec<String>,
}

// ============================================================================
// Public Endpoints
// ============================================================================

/// POST /api/submit-testimonial - Accept a new testimonial submission
pub async fn submit_testimonial(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>> {
    let required = [
        ("name", &request.name),
        ("appName", &request.app_name),
        ("testimonial", &request.testimonial),
        ("story", &request.story),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(Error::Validation(format!("missing required field: {}", field)));
        }
    }

    let resolved = images::resolve_images(state.images.as_ref(), request.images).await;

    let submission = Submission {
        id: Uuid::new_v4(),
        name: request.name,
        email: request.email,
        app_name: request.app_name,
        app_type: request.app_type,
        experience_level: request.experience_level,
        testimonial: request.testimonial,
        story: request.story,
        status: Status::Pending,
        images: resolved,
        created_at: Utc::now(),
    };

    if let Err(e) = db::submissions::insert_submission(&state.db, &submission).await {
        error!("Failed to store submission: {}", e);
        return Err(e);
    }
    db::sync::touch_last_sync(&state.db).await?;

    info!("Accepted submission {} ({})", submission.id, submission.app_name);
    Ok(Json(SubmitResponse {
        success: true,
        id: submission.id,
    }))
}

/// GET /api/stories - Approved submissions, for the public site
pub async fn get_approved_stories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Submission>>> {
    let stories = db::submissions::list_submissions(&state.db, Some(Status::Approved)).await?;
    Ok(Json(stories))
}

/// GET /api/sync - Advisory marker of the last mutating write
pub async fn get_sync_timestamp(State(state): State<AppState>) -> Result<Json<SyncResponse>> {
    let last_sync = db::sync::get_last_sync(&state.db).await?;
    Ok(Json(SyncResponse { last_sync }))
}

// ============================================================================
// Moderation Endpoints (admin token required)
// ============================================================================

/// GET /api/submissions?status= - List submissions, optionally filtered
pub async fn get_submissions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Submission>>> {
    let status = match query.status.as_deref() {
        Some(raw) if !raw.is_empty() => Some(raw.parse::<Status>()?),
        _ => None,
    };

    let submissions = db::submissions::list_submissions(&state.db, status).await?;
    Ok(Json(submissions))
}

/// POST /api/submissions/:id/approve - Mark a submission approved
pub async fn approve_submission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Submission>> {
    let updated = db::submissions::set_status(&state.db, id, Status::Approved).await?;
    db::sync::touch_last_sync(&state.db).await?;
    info!("Approved submission {}", id);
    Ok(Json(updated))
}

/// POST /api/submissions/:id/reject - Mark a submission rejected
pub async fn reject_submission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Submission>> {
    let updated = db::submissions::set_status(&state.db, id, Status::Rejected).await?;
    db::sync::touch_last_sync(&state.db).await?;
    info!("Rejected submission {}", id);
    Ok(Json(updated))
}

/// PUT /api/submissions/:id - Replace a submission's mutable fields
pub async fn update_submission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSubmissionRequest>,
) -> Result<Json<Submission>> {
    let existing = db::submissions::get_submission(&state.db, id).await?;

    let submission = Submission {
        id,
        name: request.name,
        email: request.email,
        app_name: request.app_name,
        app_type: request.app_type,
        experience_level: request.experience_level,
        testimonial: request.testimonial,
        story: request.story,
        status: request.status,
        images: request.images,
        created_at: existing.created_at,
    };

    let updated = db::submissions::update_submission(&state.db, &submission).await?;
    db::sync::touch_last_sync(&state.db).await?;
    info!("Updated submission {}", id);
    Ok(Json(updated))
}

/// DELETE /api/submissions/:id - Permanently delete a submission
pub async fn delete_submission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusResponse>> {
    db::submissions::delete_submission(&state.db, id).await?;
    db::sync::touch_last_sync(&state.db).await?;
    info!("Deleted submission {}", id);
    Ok(Json(StatusResponse {
        status: "deleted".to_string(),
    }))
}

/// POST /api/submissions/clear-rejected - Bulk delete every rejected submission
pub async fn clear_rejected(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    let cleared = db::submissions::clear_rejected(&state.db).await?;
    db::sync::touch_last_sync(&state.db).await?;
    info!("Cleared {} rejected submissions", cleared);
    Ok(Json(ClearResponse { cleared }))
}
