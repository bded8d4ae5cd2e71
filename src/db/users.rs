//! Local user cache
//!
//! Server-side rendition of the original local auth cache: per-email rows
//! holding a cached credential, the cached course-access flags, and the login
//! timestamp that bounds the cache's 24-hour freshness window. The remote
//! auth provider stays the system of record; the facade reads both.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};
use uuid::Uuid;

use crate::error::Result;

/// A row in the local user cache
#[derive(Debug, Clone)]
pub struct LocalUser {
    pub email: String,
    pub password: Option<String>,
    pub course_access: bool,
    pub test_mode: bool,
    pub access_expires_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

fn row_to_user(row: &SqliteRow) -> LocalUser {
    LocalUser {
        email: row.get("email"),
        password: row.get("password"),
        course_access: row.get("course_access"),
        test_mode: row.get("test_mode"),
        access_expires_at: row.get("access_expires_at"),
        last_login_at: row.get("last_login_at"),
    }
}

/// Look up a cached user by email
pub async fn get_by_email(db: &Pool<Sqlite>, email: &str) -> Result<Option<LocalUser>> {
    let row = sqlx::query("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(db)
        .await?;

    Ok(row.map(|r| row_to_user(&r)))
}

/// Make sure a cache row exists for this email
pub async fn ensure_user(db: &Pool<Sqlite>, email: &str) -> Result<()> {
    sqlx::query("INSERT INTO users (guid, email) VALUES (?, ?) ON CONFLICT(email) DO NOTHING")
        .bind(Uuid::new_v4().to_string())
        .bind(email)
        .execute(db)
        .await?;

    Ok(())
}

/// Mirror the remote user record's access flags into the cache
pub async fn upsert_remote_snapshot(
    db: &Pool<Sqlite>,
    email: &str,
    course_access: bool,
    test_mode: bool,
    access_expires_at: Option<DateTime<Utc>>,
) -> Result<()> {
    ensure_user(db, email).await?;
    sqlx::query(
        "UPDATE users SET course_access = ?, test_mode = ?, access_expires_at = ? WHERE email = ?",
    )
    .bind(course_access)
    .bind(test_mode)
    .bind(access_expires_at)
    .bind(email)
    .execute(db)
    .await?;

    Ok(())
}

/// Cache the credential used for offline sign-in fallback
pub async fn cache_password(db: &Pool<Sqlite>, email: &str, password: &str) -> Result<()> {
    ensure_user(db, email).await?;
    sqlx::query("UPDATE users SET password = ? WHERE email = ?")
        .bind(password)
        .bind(email)
        .execute(db)
        .await?;

    Ok(())
}

/// Refresh the login timestamp that anchors the freshness window
pub async fn touch_login(db: &Pool<Sqlite>, email: &str) -> Result<()> {
    ensure_user(db, email).await?;
    sqlx::query("UPDATE users SET last_login_at = ? WHERE email = ?")
        .bind(Utc::now())
        .bind(email)
        .execute(db)
        .await?;

    Ok(())
}

/// Set the cached course-access flag
pub async fn set_course_access(db: &Pool<Sqlite>, email: &str, granted: bool) -> Result<()> {
    ensure_user(db, email).await?;
    sqlx::query("UPDATE users SET course_access = ? WHERE email = ?")
        .bind(granted)
        .bind(email)
        .execute(db)
        .await?;

    Ok(())
}

/// Clear the cached session (sign-out); the row itself is kept
pub async fn clear_session(db: &Pool<Sqlite>, email: &str) -> Result<()> {
    sqlx::query("UPDATE users SET last_login_at = NULL WHERE email = ?")
        .bind(email)
        .execute(db)
        .await?;

    Ok(())
}
