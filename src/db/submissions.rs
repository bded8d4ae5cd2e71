//! Submission storage
//!
//! Translates between the wire shape (camelCase, images as a list) and the
//! submissions table (snake_case, images as a JSON text column), and owns the
//! image-list normalization. Reads never fail on a malformed images column;
//! they degrade to an empty list with a logged warning.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Moderation status of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Status::Pending),
            "approved" => Ok(Status::Approved),
            "rejected" => Ok(Status::Rejected),
            other => Err(Error::Validation(format!("unknown status: {}", other))),
        }
    }
}

/// A testimonial submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub app_name: String,
    pub app_type: String,
    pub experience_level: String,
    pub testimonial: String,
    pub story: String,
    pub status: Status,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Normalize the stored images column to an ordered list of URL strings.
///
/// Tolerates the three encodings that accumulated in the original store:
/// a JSON array (canonical), a JSON-encoded single string, and a bare URL.
/// NULL, empty, and malformed input all yield an empty list.
pub fn parse_images(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.starts_with('[') || trimmed.starts_with('"') || trimmed.starts_with('{') {
        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(serde_json::Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(url) => Some(url),
                    other => {
                        warn!("Dropping non-string image entry: {}", other);
                        None
                    }
                })
                .collect(),
            Ok(serde_json::Value::String(url)) => vec![url],
            Ok(other) => {
                warn!("Unexpected images JSON shape ({}), treating as empty", other);
                Vec::new()
            }
            Err(e) => {
                warn!("Malformed images JSON ({}), treating as empty", e);
                Vec::new()
            }
        }
    } else {
        // Legacy rows store a single bare URL
        vec![raw.to_string()]
    }
}

fn encode_images(images: &[String]) -> Result<String> {
    serde_json::to_string(images)
        .map_err(|e| Error::Internal(format!("Failed to encode images list: {}", e)))
}

fn row_to_submission(row: &SqliteRow) -> Result<Submission> {
    let guid: String = row.get("guid");
    let id = Uuid::parse_str(&guid)
        .map_err(|e| Error::Internal(format!("Invalid submission guid '{}': {}", guid, e)))?;

    let status_raw: String = row.get("status");
    let status = status_raw.parse::<Status>().unwrap_or_else(|_| {
        warn!(
            "Unknown status '{}' on submission {}, treating as pending",
            status_raw, guid
        );
        Status::Pending
    });

    Ok(Submission {
        id,
        name: row.get("name"),
        email: row.get("email"),
        app_name: row.get("app_name"),
        app_type: row.get("app_type"),
        experience_level: row.get("experience_level"),
        testimonial: row.get("testimonial"),
        story: row.get("story"),
        status,
        images: parse_images(row.get::<Option<String>, _>("images").as_deref()),
        created_at: row.get("created_at"),
    })
}

/// Insert a new submission
pub async fn insert_submission(db: &Pool<Sqlite>, submission: &Submission) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO submissions
            (guid, name, email, app_name, app_type, experience_level,
             testimonial, story, status, images, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(submission.id.to_string())
    .bind(&submission.name)
    .bind(&submission.email)
    .bind(&submission.app_name)
    .bind(&submission.app_type)
    .bind(&submission.experience_level)
    .bind(&submission.testimonial)
    .bind(&submission.story)
    .bind(submission.status.to_string())
    .bind(encode_images(&submission.images)?)
    .bind(submission.created_at)
    .execute(db)
    .await?;

    Ok(())
}

/// List submissions, newest-created-first, optionally filtered by status
pub async fn list_submissions(
    db: &Pool<Sqlite>,
    status: Option<Status>,
) -> Result<Vec<Submission>> {
    let rows = match status {
        Some(status) => {
            sqlx::query(
                "SELECT * FROM submissions WHERE status = ? ORDER BY created_at DESC",
            )
            .bind(status.to_string())
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query("SELECT * FROM submissions ORDER BY created_at DESC")
                .fetch_all(db)
                .await?
        }
    };

    rows.iter().map(row_to_submission).collect()
}

/// Get a single submission by id
pub async fn get_submission(db: &Pool<Sqlite>, id: Uuid) -> Result<Submission> {
    let row = sqlx::query("SELECT * FROM submissions WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("submission {}", id)))?;

    row_to_submission(&row)
}

/// Set the moderation status of a submission.
///
/// Re-applying the current status is not an error; the design imposes no
/// transition guard. Returns the updated record.
pub async fn set_status(db: &Pool<Sqlite>, id: Uuid, status: Status) -> Result<Submission> {
    let result = sqlx::query("UPDATE submissions SET status = ? WHERE guid = ?")
        .bind(status.to_string())
        .bind(id.to_string())
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("submission {}", id)));
    }

    get_submission(db, id).await
}

/// Replace every mutable field of a submission. Returns the updated record.
pub async fn update_submission(db: &Pool<Sqlite>, submission: &Submission) -> Result<Submission> {
    let result = sqlx::query(
        r#"
        UPDATE submissions
        SET name = ?, email = ?, app_name = ?, app_type = ?,
            experience_level = ?, testimonial = ?, story = ?,
            status = ?, images = ?
        WHERE guid = ?
        "#,
    )
    .bind(&submission.name)
    .bind(&submission.email)
    .bind(&submission.app_name)
    .bind(&submission.app_type)
    .bind(&submission.experience_level)
    .bind(&submission.testimonial)
    .bind(&submission.story)
    .bind(submission.status.to_string())
    .bind(encode_images(&submission.images)?)
    .bind(submission.id.to_string())
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("submission {}", submission.id)));
    }

    get_submission(db, submission.id).await
}

/// Permanently delete a submission
pub async fn delete_submission(db: &Pool<Sqlite>, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM submissions WHERE guid = ?")
        .bind(id.to_string())
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("submission {}", id)));
    }

    Ok(())
}

/// Delete every rejected submission in one statement; returns the count deleted
pub async fn clear_rejected(db: &Pool<Sqlite>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM submissions WHERE status = 'rejected'")
        .execute(db)
        .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init::initialize_database(&pool).await.unwrap();
        pool
    }

    fn sample(name: &str) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name),
            app_name: "Budget Buddy".to_string(),
            app_type: "iOS".to_string(),
            experience_level: "beginner".to_string(),
            testimonial: "Shipped my first app".to_string(),
            story: "Long-form story".to_string(),
            status: Status::Pending,
            images: vec!["https://img.example/a.png".to_string()],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn parse_images_handles_all_encodings() {
        assert_eq!(parse_images(None), Vec::<String>::new());
        assert_eq!(parse_images(Some("")), Vec::<String>::new());
        assert_eq!(
            parse_images(Some(r#"["https://a/1.png","https://a/2.png"]"#)),
            vec!["https://a/1.png".to_string(), "https://a/2.png".to_string()]
        );
        assert_eq!(
            parse_images(Some(r#""https://a/1.png""#)),
            vec!["https://a/1.png".to_string()]
        );
        assert_eq!(
            parse_images(Some("https://a/bare.png")),
            vec!["https://a/bare.png".to_string()]
        );
    }

    #[test]
    fn parse_images_malformed_json_degrades_to_empty() {
        assert_eq!(parse_images(Some(r#"["unterminated"#)), Vec::<String>::new());
        assert_eq!(parse_images(Some(r#"{"not":"a list"}"#)), Vec::<String>::new());
    }

    #[test]
    fn parse_images_is_idempotent() {
        let canonical = vec!["https://a/1.png".to_string(), "https://a/2.png".to_string()];
        let encoded = serde_json::to_string(&canonical).unwrap();
        let once = parse_images(Some(&encoded));
        assert_eq!(once, canonical);
        let re_encoded = serde_json::to_string(&once).unwrap();
        assert_eq!(parse_images(Some(&re_encoded)), canonical);
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [Status::Pending, Status::Approved, Status::Rejected] {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
        }
        assert!("archived".parse::<Status>().is_err());
    }

    #[tokio::test]
    async fn insert_then_list_filters_by_status() {
        let pool = test_pool().await;
        let a = sample("alice");
        let b = sample("bob");
        insert_submission(&pool, &a).await.unwrap();
        insert_submission(&pool, &b).await.unwrap();

        set_status(&pool, a.id, Status::Approved).await.unwrap();

        let approved = list_submissions(&pool, Some(Status::Approved)).await.unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, a.id);
        assert_eq!(approved[0].status, Status::Approved);

        let pending = list_submissions(&pool, Some(Status::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);
    }

    #[tokio::test]
    async fn set_status_unknown_id_is_not_found() {
        let pool = test_pool().await;
        let err = set_status(&pool, Uuid::new_v4(), Status::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn clear_rejected_is_scoped_and_repeatable() {
        let pool = test_pool().await;
        let keep = sample("keep");
        let drop_a = sample("drop-a");
        let drop_b = sample("drop-b");
        for s in [&keep, &drop_a, &drop_b] {
            insert_submission(&pool, s).await.unwrap();
        }
        set_status(&pool, drop_a.id, Status::Rejected).await.unwrap();
        set_status(&pool, drop_b.id, Status::Rejected).await.unwrap();

        assert_eq!(clear_rejected(&pool).await.unwrap(), 2);
        assert_eq!(clear_rejected(&pool).await.unwrap(), 0);

        let remaining = list_submissions(&pool, None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[tokio::test]
    async fn legacy_images_rows_are_normalized_on_read() {
        let pool = test_pool().await;
        // Write a legacy row directly: bare URL, no JSON encoding.
        sqlx::query(
            r#"
            INSERT INTO submissions
                (guid, name, email, app_name, app_type, experience_level,
                 testimonial, story, status, images, created_at)
            VALUES (?, 'legacy', '', 'App', '', '', 'T', 'S', 'pending', ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind("https://a/legacy.png")
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();

        let all = list_submissions(&pool, None).await.unwrap();
        assert_eq!(all[0].images, vec!["https://a/legacy.png".to_string()]);
    }
}
