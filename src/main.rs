//! storyhub - Main entry point
//!
//! Course-sales backend: testimonial moderation workflow, course access
//! facade, checkout. One HTTP service over one SQLite file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storyhub::auth::{AuthService, SupabaseAuth};
use storyhub::checkout::{CheckoutService, StripeGateway};
use storyhub::config::Config;
use storyhub::images::CloudinaryImages;
use storyhub::mailer::HttpMailer;
use storyhub::{build_router, AppState};

/// Command-line arguments for storyhub
#[derive(Parser, Debug)]
#[command(name = "storyhub")]
#[command(about = "Course-sales backend: testimonial moderation, access, checkout")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8787", env = "STORYHUB_PORT")]
    port: u16,

    /// SQLite database file
    #[arg(long, default_value = "storyhub.db", env = "STORYHUB_DB")]
    db_path: PathBuf,

    /// Shared bearer secret for moderation endpoints (empty disables the check)
    #[arg(long, default_value = "", env = "STORYHUB_ADMIN_TOKEN")]
    admin_token: String,

    /// Auth provider base URL
    #[arg(long, default_value = "", env = "AUTH_PROVIDER_URL")]
    auth_url: String,

    /// Auth provider service key
    #[arg(long, default_value = "", env = "AUTH_SERVICE_KEY")]
    auth_service_key: String,

    /// Image host unsigned-upload endpoint
    #[arg(long, default_value = "", env = "IMAGE_UPLOAD_URL")]
    image_upload_url: String,

    /// Image host upload preset
    #[arg(long, default_value = "", env = "IMAGE_UPLOAD_PRESET")]
    image_upload_preset: String,

    /// Payment gateway secret key
    #[arg(long, default_value = "", env = "PAYMENT_SECRET_KEY")]
    payment_secret_key: String,

    /// Mail API endpoint
    #[arg(long, default_value = "", env = "MAIL_API_URL")]
    mail_api_url: String,

    /// Mail API key
    #[arg(long, default_value = "", env = "MAIL_API_KEY")]
    mail_api_key: String,

    /// From address for credential/receipt emails
    #[arg(long, default_value = "no-reply@example.com", env = "MAIL_FROM")]
    mail_from: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storyhub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting storyhub v{} on port {}", env!("CARGO_PKG_VERSION"), args.port);
    info!("Database path: {}", args.db_path.display());
    if args.admin_token.is_empty() {
        warn!("Admin authentication disabled (no admin token configured)");
    }

    let config = Config {
        port: args.port,
        db_path: args.db_path.clone(),
        admin_token: args.admin_token,
        auth_url: args.auth_url,
        auth_service_key: args.auth_service_key,
        image_upload_url: args.image_upload_url,
        image_upload_preset: args.image_upload_preset,
        payment_secret_key: args.payment_secret_key,
        mail_api_url: args.mail_api_url,
        mail_api_key: args.mail_api_key,
        mail_from: args.mail_from,
    };

    // Connect to the database, creating the file on first run
    let options = SqliteConnectOptions::new()
        .filename(&config.db_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("Failed to open database")?;

    storyhub::db::init::initialize_database(&pool)
        .await
        .context("Failed to initialize database")?;

    // Wire up external collaborators
    let provider = Arc::new(SupabaseAuth::new(
        config.auth_url.clone(),
        config.auth_service_key.clone(),
    ));
    let gateway = Arc::new(StripeGateway::new(config.payment_secret_key.clone()));
    let image_host = Arc::new(CloudinaryImages::new(
        config.image_upload_url.clone(),
        config.image_upload_preset.clone(),
    ));
    let mailer = Arc::new(HttpMailer::new(
        config.mail_api_url.clone(),
        config.mail_api_key.clone(),
        config.mail_from.clone(),
    ));

    let auth = Arc::new(AuthService::new(pool.clone(), provider.clone()));
    let checkout = Arc::new(CheckoutService::new(
        pool.clone(),
        gateway,
        provider,
        mailer,
    ));

    let state = AppState::new(pool, Arc::new(config), auth, checkout, image_host);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
