//! storyhub runtime configuration

use std::path::PathBuf;

/// Service configuration, collected from flags and environment in `main`
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server listens on
    pub port: u16,
    /// SQLite database file path
    pub db_path: PathBuf,
    /// Shared bearer secret for moderation endpoints.
    /// Empty string disables the admin check (tests / local development).
    pub admin_token: String,
    /// Auth provider base URL (Supabase-style REST + auth endpoints)
    pub auth_url: String,
    /// Auth provider service key
    pub auth_service_key: String,
    /// Image host unsigned-upload endpoint
    pub image_upload_url: String,
    /// Image host upload preset name
    pub image_upload_preset: String,
    /// Payment gateway secret key
    pub payment_secret_key: String,
    /// Mail API endpoint
    pub mail_api_url: String,
    /// Mail API key
    pub mail_api_key: String,
    /// From address for credential/receipt emails
    pub mail_from: String,
}
