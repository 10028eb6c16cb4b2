//! Document AI gateway - upload files for local image/PDF inspection or
//! forward them to a Google Cloud Document AI processor.

mod config;
mod documentai;
mod error;
mod image_info;
mod pdf_info;
mod routes;
mod upload;

use config::ServerConfig;
use documentai::DocumentAiClient;
use routes::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docai_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Credentials are only read on the first Document AI request
    let state = AppState {
        processor: Arc::new(DocumentAiClient::new()),
    };

    let app = routes::router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        "Server listening on http://{} (max upload {} MB)",
        config.bind_addr,
        config.max_upload_bytes / (1024 * 1024)
    );
    axum::serve(listener, app).await?;

    Ok(())
}
