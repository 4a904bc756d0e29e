//! Top level routes

use crate::{models::ApiResponse, AppState};
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use tracing::info;

use super::uploads::create_upload_routes;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .merge(create_upload_routes())
}

async fn handle_root(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(serde_json::json!({
        "app": state.app_name,
        "version": state.version,
        "endpoints": {
            "health": "/health",
            "upload": "/api/uploads",
            "limits": "/api/uploads/limits"
        }
    })))
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /health - Liveness probe");

    let temp_dir_ok = state.config.uploads.temp_dir.is_dir();
    let upload_dir_ok = state.options.upload_dir().map_or(true, |dir| dir.is_dir());

    Json(ApiResponse::success(serde_json::json!({
        "status": if temp_dir_ok && upload_dir_ok { "healthy" } else { "degraded" },
        "timestamp": chrono::Utc::now().timestamp(),
        "temp_dir_available": temp_dir_ok,
        "upload_dir_available": upload_dir_ok,
        "version": state.version
    })))
}
