//! Image hosting
//!
//! Data-URI-encoded images arriving with a submission are uploaded to the
//! image host; already-hosted URLs pass through unchanged. Uploads for one
//! submission run concurrently and an entry that fails to upload is dropped,
//! never retried.

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use crate::error::{Error, Result};

/// Upload seam for the image host
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload one data-URI image; returns the hosted URL
    async fn upload_data_uri(&self, data_uri: &str) -> Result<String>;
}

/// Resolve a submission's image list to hosted URLs.
///
/// Entries that are not data URIs pass through unchanged; a failed upload
/// drops that entry only. Order of surviving entries is preserved.
pub async fn resolve_images(host: &dyn ImageHost, entries: Vec<String>) -> Vec<String> {
    let uploads = entries.into_iter().map(|entry| async move {
        if entry.starts_with("data:") {
            match host.upload_data_uri(&entry).await {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Image upload failed, dropping entry: {}", e);
                    None
                }
            }
        } else {
            Some(entry)
        }
    });

    join_all(uploads).await.into_iter().flatten().collect()
}

/// Cloudinary-style unsigned upload client
pub struct CloudinaryImages {
    client: reqwest::Client,
    upload_url: String,
    upload_preset: String,
}

impl CloudinaryImages {
    pub fn new(upload_url: String, upload_preset: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url,
            upload_preset,
        }
    }
}

#[async_trait]
impl ImageHost for CloudinaryImages {
    async fn upload_data_uri(&self, data_uri: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.upload_url)
            .json(&serde_json::json!({
                "file": data_uri,
                "upload_preset": self.upload_preset,
            }))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("image host request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "image host returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("image host response unreadable: {}", e)))?;

        body.get("secure_url")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::Upstream("image host response missing secure_url".to_string()))
    }
}
