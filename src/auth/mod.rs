//! Auth facade
//!
//! The system grew from a pure local-cache auth scheme into a remote
//! provider without a hard cutover, so every access read consults both
//! sources. This facade is the single place that reconciliation happens,
//! with a fixed precedence order: test-mode override, then the remote user
//! record, then the local cache within its 24-hour freshness window.
//!
//! Policy note: lookup errors during an access check grant access rather
//! than deny it. A provider outage must not lock paying customers out; the
//! tradeoff is explicit here instead of being an accident of error handling.

pub mod provider;

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

pub use provider::{AuthProvider, RemoteUser, SupabaseAuth};

use crate::db;
use crate::error::{Error, Result};

/// Freshness window for the local cache, anchored on the last login
const LOCAL_CACHE_WINDOW_HOURS: i64 = 24;

/// Outcome of an access check
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub has_access: bool,
    pub is_test_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AccessDecision {
    fn granted(test_mode: bool) -> Self {
        Self {
            has_access: true,
            is_test_mode: test_mode,
            reason: None,
        }
    }

    fn denied(reason: &str) -> Self {
        Self {
            has_access: false,
            is_test_mode: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Result of a sign-in attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Authenticated { email: String, test_mode: bool },
    Unauthenticated,
}

/// Dual-source auth facade
pub struct AuthService {
    db: Pool<Sqlite>,
    provider: Arc<dyn AuthProvider>,
}

impl AuthService {
    pub fn new(db: Pool<Sqlite>, provider: Arc<dyn AuthProvider>) -> Self {
        Self { db, provider }
    }

    /// Decide course access for a visitor.
    ///
    /// Precedence: test-mode override, then the remote user record, then the
    /// local cache within its freshness window.
    pub async fn check_access(&self, email: Option<&str>, test_mode: bool) -> AccessDecision {
        if test_mode {
            return AccessDecision::granted(true);
        }

        let Some(email) = email else {
            return AccessDecision::denied("not signed in");
        };

        match self.provider.fetch_user(email).await {
            Ok(Some(user)) => {
                if user.test_mode {
                    return AccessDecision::granted(true);
                }
                if let Some(expires) = user.access_expires_at {
                    if expires < Utc::now() {
                        return AccessDecision::denied("course access expired");
                    }
                }
                if !user.course_access {
                    // Authenticated account with no explicit grant yet:
                    // grant it now rather than locking the buyer out.
                    info!("Auto-granting course access for {}", email);
                    if let Err(e) = self.provider.grant_access(email).await {
                        warn!("Auto-grant failed for {}: {}", email, e);
                    }
                    if let Err(e) = db::users::set_course_access(&self.db, email, true).await {
                        warn!("Local access cache update failed for {}: {}", email, e);
                    }
                }
                AccessDecision::granted(false)
            }
            Ok(None) => self.check_local_cache(email).await,
            Err(e) => {
                // Fail open, see module docs.
                warn!("Course access lookup failed for {}: {}", email, e);
                AccessDecision::granted(false)
            }
        }
    }

    async fn check_local_cache(&self, email: &str) -> AccessDecision {
        let user = match db::users::get_by_email(&self.db, email).await {
            Ok(user) => user,
            Err(e) => {
                warn!("Local access cache lookup failed for {}: {}", email, e);
                return AccessDecision::granted(false);
            }
        };

        let Some(user) = user else {
            return AccessDecision::denied("no account for this email");
        };
        if !user.course_access {
            return AccessDecision::denied("course access not granted");
        }
        match user.last_login_at {
            Some(last_login)
                if Utc::now() - last_login < Duration::hours(LOCAL_CACHE_WINDOW_HOURS) =>
            {
                AccessDecision::granted(user.test_mode)
            }
            Some(_) => AccessDecision::denied("cached session expired"),
            None => AccessDecision::denied("not signed in"),
        }
    }

    /// Sign in, remote first, falling back to the cached credential.
    ///
    /// The fallback validates credential format only (syntactic email,
    /// password length >= 6); with no cached password for the email it
    /// accepts any well-formed pair (first-use registration semantics).
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        match self.provider.sign_in(email, password).await {
            Ok(user) => {
                db::users::upsert_remote_snapshot(
                    &self.db,
                    email,
                    user.course_access,
                    user.test_mode,
                    user.access_expires_at,
                )
                .await?;
                db::users::cache_password(&self.db, email, password).await?;
                db::users::touch_login(&self.db, email).await?;
                info!("Remote sign-in succeeded for {}", email);
                Ok(Session::Authenticated {
                    email: email.to_string(),
                    test_mode: user.test_mode,
                })
            }
            Err(e) => {
                warn!("Remote sign-in failed for {}, using local fallback: {}", email, e);
                self.sign_in_local(email, password).await
            }
        }
    }

    async fn sign_in_local(&self, email: &str, password: &str) -> Result<Session> {
        if !email_looks_valid(email) {
            return Err(Error::Validation("malformed email address".to_string()));
        }
        if password.len() < 6 {
            return Err(Error::Validation(
                "password must be at least 6 characters".to_string(),
            ));
        }

        let cached = db::users::get_by_email(&self.db, email).await?;
        match cached.as_ref().and_then(|u| u.password.as_deref()) {
            Some(stored) if stored != password => return Ok(Session::Unauthenticated),
            Some(_) => {}
            None => {
                // First use: accept and remember the credential.
                db::users::cache_password(&self.db, email, password).await?;
            }
        }

        db::users::touch_login(&self.db, email).await?;
        let test_mode = cached.map(|u| u.test_mode).unwrap_or(false);
        Ok(Session::Authenticated {
            email: email.to_string(),
            test_mode,
        })
    }

    /// Sign out everywhere. A remote failure is logged, never propagated;
    /// the local session clear always proceeds.
    pub async fn sign_out(&self, email: &str) -> Result<()> {
        if let Err(e) = self.provider.sign_out(email).await {
            warn!("Remote sign-out failed for {} (continuing): {}", email, e);
        }
        db::users::clear_session(&self.db, email).await?;
        info!("Signed out {}", email);
        Ok(())
    }
}

fn email_looks_valid(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
