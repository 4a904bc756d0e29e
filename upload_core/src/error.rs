//! Application error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::upload::UploadError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    fn upload_status(err: &UploadError) -> StatusCode {
        let root = err.root().downcast_ref::<UploadError>().unwrap_or(err);
        match root {
            UploadError::TotalSizeExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::TooManyFiles { .. } | UploadError::Validation { .. } => StatusCode::BAD_REQUEST,
            UploadError::FileExists(_) => StatusCode::CONFLICT,
            UploadError::UploadDirMissing(_)
            | UploadError::MissingTempDir
            | UploadError::MoveFailed { .. }
            | UploadError::Io(_)
            | UploadError::InvalidSize(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::Aborted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Upload(err) => {
                let status = AppError::upload_status(&err);
                if status.is_server_error() {
                    tracing::error!("Upload failed: {:?}", err);
                } else {
                    tracing::warn!("Upload rejected: {}", err);
                }
                (status, err.to_string())
            }
            AppError::IoError(err) => {
                tracing::error!("IO error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Other(err) => {
                tracing::error!("Unexpected error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
