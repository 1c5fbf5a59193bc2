//! Chatdrop API Server
//!
//! Main entry point for the attachment upload service.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatdrop_api::{AppState, create_router};
use chatdrop_core::attachment::{AttachmentUrls, UploadService};
use chatdrop_core::storage::{StorageConfig, StorageService};
use chatdrop_core::token::SealedTokenCodec;
use chatdrop_db::{AttachmentRepository, connect};
use chatdrop_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatdrop=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Connect to database
    let db = connect(&config.database).await?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );

    // Prepare the attachment root
    let storage_config = StorageConfig::new(&config.storage.root)
        .with_dir_mode(config.storage.dir_mode)
        .with_file_mode(config.storage.file_mode);
    let storage = StorageService::from_config(storage_config)
        .context("Failed to prepare attachment storage")?;
    info!(root = %config.storage.root.display(), "Attachment storage ready");

    // Create upload service
    let uploads = UploadService::new(
        Arc::new(AttachmentRepository::new(db)),
        Arc::new(storage),
        Arc::new(SealedTokenCodec::from_secret(&config.token.secret)),
        AttachmentUrls::new(config.urls.public_base_url.clone()),
    );

    // Create application state
    let state =
        AppState::new(Arc::new(uploads)).with_max_chunk_bytes(config.server.max_chunk_bytes);

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
