//! Upload handling: collection, validation and storage of files submitted in a
//! multipart form, plus the HTTP layer that feeds them in.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod upload;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use handlers::create_routes;
pub use upload::{
    RawFile, RawUpload, ServerLimits, UploadError, UploadErrorCode, UploadManager, UploadOptions,
    UploadedFile,
};

use axum::{extract::DefaultBodyLimit, Router};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub config: Arc<AppConfig>,
    /// Policy template; every batch works on its own clone.
    pub options: UploadOptions,
    pub limits: ServerLimits,
}

impl AppState {
    pub fn new(config: AppConfig, limits: ServerLimits) -> upload::UploadResult<Self> {
        let options = UploadOptions::from_config(&config.uploads, limits.clone())?;

        Ok(Self {
            app_name: "Upload Server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            config: Arc::new(config),
            options,
            limits,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let body_limit = match state.limits.post_max_size() {
        Some(bytes) => DefaultBodyLimit::max(usize::try_from(bytes).unwrap_or(usize::MAX)),
        None => DefaultBodyLimit::disable(),
    };

    let router = create_routes().layer(body_limit).with_state(state);

    middleware::logging::with_request_logging(router)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
