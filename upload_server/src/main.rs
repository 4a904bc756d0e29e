//! Main entry point for the upload server binary

use anyhow::Result;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use upload_core::{create_app, run_server, AppConfig, AppState, ServerLimits};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());

    config.create_directories()
        .map_err(|e| anyhow::anyhow!("Failed to create directories: {}", e))?;

    let addr: SocketAddr = config.bind_address().parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    // The limits are process-wide; set them once before any request is served.
    let limits = ServerLimits::global();
    limits.configure(config.uploads.limits()?);
    let snapshot = limits.snapshot();
    info!(
        "Upload limits: upload_max_filesize={:?} post_max_size={:?}",
        snapshot.upload_max_filesize, snapshot.post_max_size
    );

    if config.uploads.upload_dir.as_os_str().is_empty() {
        tracing::warn!("No upload dir configured, files are discarded after each request");
    } else {
        info!("Upload dir: {}", config.uploads.upload_dir.display());
    }
    info!("Temp dir: {}", config.uploads.temp_dir.display());

    let state = AppState::new(config, limits)
        .map_err(|e| anyhow::anyhow!("Failed to build upload options: {}", e))?;

    info!("App: {} v{}", state.app_name, state.version);

    let app = create_app(state);

    run_server(app, addr).await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let default_level = if cfg!(debug_assertions) {
                "debug"
            } else {
                "info"
            };

            format!(
                "{}={},upload_core={},tower_http=debug",
                env!("CARGO_CRATE_NAME").replace('-', "_"),
                default_level,
                default_level
            ).into()
        });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
