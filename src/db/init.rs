//! Database initialization
//!
//! Creates required tables on startup. The schema is small enough that
//! create-if-missing statements replace migration tooling.

use crate::error::Result;
use sqlx::{Pool, Sqlite};
use tracing::info;

/// Initialize all required database structures
pub async fn initialize_database(pool: &Pool<Sqlite>) -> Result<()> {
    info!("Initializing database structures");

    // Testimonial submissions. `images` holds a JSON array of URLs; legacy
    // rows may hold a bare URL, a JSON-encoded string, or NULL.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submissions (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            app_name TEXT NOT NULL,
            app_type TEXT NOT NULL DEFAULT '',
            experience_level TEXT NOT NULL DEFAULT '',
            testimonial TEXT NOT NULL,
            story TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            images TEXT,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Advisory marker of the last mutating write; single row keyed 'last_sync'.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_log (
            key TEXT PRIMARY KEY,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Local user cache: cached credential plus access flags with a freshness
    // window, reconciled against the remote auth provider by the auth facade.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password TEXT,
            course_access INTEGER NOT NULL DEFAULT 0,
            test_mode INTEGER NOT NULL DEFAULT 0,
            access_expires_at TIMESTAMP,
            last_login_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Database initialization complete");
    Ok(())
}
