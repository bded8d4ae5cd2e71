//! Sync log access
//!
//! The sync log is a single `last_sync` row updated after every mutating
//! submission operation. It is an advisory staleness signal for polling
//! clients, not a correctness primitive, so it is deliberately written
//! outside any transaction with the operation it trails.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

use crate::error::Result;

/// Record that a mutating submission operation just happened
pub async fn touch_last_sync(db: &Pool<Sqlite>) -> Result<DateTime<Utc>> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO sync_log (key, updated_at) VALUES ('last_sync', ?)
        ON CONFLICT(key) DO UPDATE SET updated_at = excluded.updated_at
        "#,
    )
    .bind(now)
    .execute(db)
    .await?;

    Ok(now)
}

/// Read the last sync marker, if any mutation has happened yet
pub async fn get_last_sync(db: &Pool<Sqlite>) -> Result<Option<DateTime<Utc>>> {
    let value = sqlx::query_scalar::<_, DateTime<Utc>>(
        "SELECT updated_at FROM sync_log WHERE key = 'last_sync'",
    )
    .fetch_optional(db)
    .await?;

    Ok(value)
}
