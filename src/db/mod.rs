//! Database access layer
//!
//! Provides queries for submissions, the local user cache, and the sync log.

pub mod init;
pub mod submissions;
pub mod sync;
pub mod users;
