//! Remote auth provider client
//!
//! Supabase-style provider: password grant on the auth endpoints, user
//! records in a `course_users` table behind the REST endpoint. All calls go
//! through the `AuthProvider` trait so the facade and checkout flow are
//! testable without the network.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};

/// A user record as the remote provider sees it
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub course_access: bool,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default)]
    pub access_expires_at: Option<DateTime<Utc>>,
}

/// Seam for the remote auth provider
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Look up the user record for an email; Ok(None) when unknown
    async fn fetch_user(&self, email: &str) -> Result<Option<RemoteUser>>;

    /// Authenticate with email + password
    async fn sign_in(&self, email: &str, password: &str) -> Result<RemoteUser>;

    /// End the remote session for this email (no-op for unknown users)
    async fn sign_out(&self, email: &str) -> Result<()>;

    /// Create an account (checkout provisioning path)
    async fn create_user(&self, email: &str, password: &str) -> Result<RemoteUser>;

    /// Record an explicit course-access grant for this email
    async fn grant_access(&self, email: &str) -> Result<()>;
}

/// Supabase-style HTTP implementation
pub struct SupabaseAuth {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl SupabaseAuth {
    pub fn new(base_url: String, service_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            service_key,
        }
    }

    fn rest(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    fn auth(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Error::Upstream(format!(
                "auth provider returned {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn fetch_user(&self, email: &str) -> Result<Option<RemoteUser>> {
        let email_filter = format!("eq.{}", email);
        let response = self
            .authed(self.client.get(self.rest("course_users")))
            .query(&[("select", "*"), ("email", email_filter.as_str())])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("auth provider request failed: {}", e)))?;

        let response = Self::check_status(response).await?;
        let mut users: Vec<RemoteUser> = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("auth provider response unreadable: {}", e)))?;

        Ok(if users.is_empty() {
            None
        } else {
            Some(users.swap_remove(0))
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<RemoteUser> {
        let response = self
            .authed(self.client.post(self.auth("token")))
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("auth provider request failed: {}", e)))?;

        Self::check_status(response).await?;

        // The token response carries no course flags; read the user record.
        match self.fetch_user(email).await? {
            Some(user) => Ok(user),
            None => Ok(RemoteUser {
                id: String::new(),
                email: email.to_string(),
                course_access: false,
                test_mode: false,
                access_expires_at: None,
            }),
        }
    }

    async fn sign_out(&self, email: &str) -> Result<()> {
        let Some(user) = self.fetch_user(email).await? else {
            return Ok(());
        };

        let response = self
            .authed(
                self.client
                    .post(self.auth(&format!("admin/users/{}/logout", user.id))),
            )
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("auth provider request failed: {}", e)))?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<RemoteUser> {
        let response = self
            .authed(self.client.post(self.auth("admin/users")))
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "email_confirm": true,
            }))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("auth provider request failed: {}", e)))?;

        let response = Self::check_status(response).await?;
        let user: RemoteUser = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("auth provider response unreadable: {}", e)))?;

        Ok(user)
    }

    async fn grant_access(&self, email: &str) -> Result<()> {
        let response = self
            .authed(self.client.post(self.rest("course_users")))
            .header("Prefer", "resolution=merge-duplicates")
            .json(&serde_json::json!({ "email": email, "course_access": true }))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("auth provider request failed: {}", e)))?;

        Self::check_status(response).await?;
        Ok(())
    }
}
