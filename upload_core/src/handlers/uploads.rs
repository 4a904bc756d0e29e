//! Multipart upload endpoint.
//!
//! File parts are streamed into temporary files, described the way a web server
//! describes submitted files, and handed to an [`UploadManager`]. Temporary files
//! that were not moved are removed once the request completes.

use axum::{
    extract::{multipart::Field, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use std::io::ErrorKind;
use std::path::PathBuf;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{ApiResponse, LimitsResponse, StoredFileResponse},
    upload::{RawFile, RawUpload, UploadErrorCode, UploadManager},
    AppState,
};

pub fn create_upload_routes() -> Router<AppState> {
    Router::new()
        .route("/api/uploads", post(handle_upload))
        .route("/api/uploads/limits", get(handle_limits))
}

pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<Vec<StoredFileResponse>>>> {
    let batch_id = Uuid::new_v4();
    info!(%batch_id, "POST /api/uploads - Receiving upload batch");

    let mut staged = StagedUploads::new(
        state.config.uploads.temp_dir.clone(),
        state.limits.upload_max_filesize(),
    );

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        staged.stage(field).await;
    }

    let uploads = staged.descriptors();
    let options = state.options.clone();

    let stored = tokio::task::spawn_blocking(move || {
        UploadManager::new(uploads, Some(options)).upload()
    })
    .await
    .map_err(|e| anyhow::anyhow!("Upload task failed: {}", e))??;

    let message = format!("Stored {} file(s)", stored.len());
    info!(%batch_id, "{}", message);

    Ok(Json(ApiResponse::with_message(
        stored.iter().map(StoredFileResponse::from).collect(),
        message,
    )))
}

pub async fn handle_limits(State(state): State<AppState>) -> Json<ApiResponse<LimitsResponse>> {
    let mut allowed_mime_types: Vec<String> = state.options.mime_types().iter().cloned().collect();
    allowed_mime_types.sort();

    Json(ApiResponse::success(LimitsResponse {
        limits: state.limits.snapshot(),
        effective_max_file_size: state.options.max_size(),
        max_total_size: state.options.max_total_size(),
        max_files: state.options.max_files(),
        allowed_mime_types,
    }))
}

/// File parts of one request, grouped by form field in submission order.
struct StagedUploads {
    temp_dir: PathBuf,
    max_file_size: Option<u64>,
    fields: Vec<(String, Vec<RawFile>)>,
    temp_paths: Vec<TempPath>,
}

impl StagedUploads {
    fn new(temp_dir: PathBuf, max_file_size: Option<u64>) -> Self {
        Self {
            temp_dir,
            max_file_size,
            fields: Vec::new(),
            temp_paths: Vec::new(),
        }
    }

    async fn stage(&mut self, field: Field<'_>) {
        let field_name = field.name().unwrap_or("").to_string();
        let Some(filename) = field.file_name().map(str::to_string) else {
            debug!("Skipping non-file field {}", field_name);
            return;
        };

        let raw = self.write_temp(field, filename).await;

        if field_name.ends_with("[]") {
            match self.fields.iter_mut().find(|(name, _)| *name == field_name) {
                Some((_, files)) => files.push(raw),
                None => self.fields.push((field_name, vec![raw])),
            }
        } else {
            match self.fields.iter_mut().find(|(name, _)| *name == field_name) {
                Some((_, files)) => *files = vec![raw],
                None => self.fields.push((field_name, vec![raw])),
            }
        }
    }

    async fn write_temp(&mut self, mut field: Field<'_>, filename: String) -> RawFile {
        let mime_type = declared_mime_type(field.content_type(), &filename);

        if filename.is_empty() {
            return RawFile {
                error: UploadErrorCode::NoFile,
                ..RawFile::default()
            };
        }

        let failed = |error: UploadErrorCode, temp_dir: &PathBuf| RawFile {
            name: filename.clone(),
            mime_type: mime_type.clone(),
            tmp_name: temp_dir.to_string_lossy().into_owned(),
            error,
            size: 0,
        };

        let temp = match tempfile::Builder::new().prefix("upload-").tempfile_in(&self.temp_dir) {
            Ok(temp) => temp,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Temp dir {} does not exist", self.temp_dir.display());
                return failed(UploadErrorCode::NoTmpDir, &self.temp_dir);
            }
            Err(e) => {
                warn!("Failed to create temp file for {}: {}", filename, e);
                return failed(UploadErrorCode::CantWrite, &self.temp_dir);
            }
        };

        let (file, temp_path) = temp.into_parts();
        let mut out = tokio::fs::File::from_std(file);
        let mut size: u64 = 0;
        let mut error = UploadErrorCode::Ok;

        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    size += chunk.len() as u64;
                    if matches!(self.max_file_size, Some(max) if size > max) {
                        error = UploadErrorCode::IniSize;
                        break;
                    }
                    if let Err(e) = out.write_all(&chunk).await {
                        warn!("Failed to write {} to temp file: {}", filename, e);
                        error = UploadErrorCode::CantWrite;
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Upload of {} interrupted: {}", filename, e);
                    error = UploadErrorCode::Partial;
                    break;
                }
            }
        }

        if error.is_ok() {
            if let Err(e) = out.flush().await {
                warn!("Failed to flush temp file for {}: {}", filename, e);
                error = UploadErrorCode::CantWrite;
            }
        }

        debug!("Staged {} ({} bytes) at {}", filename, size, temp_path.display());

        let tmp_name = temp_path.to_string_lossy().into_owned();
        self.temp_paths.push(temp_path);

        RawFile {
            name: filename,
            mime_type,
            tmp_name,
            error,
            size,
        }
    }

    fn descriptors(&self) -> Vec<RawUpload> {
        self.fields
            .iter()
            .map(|(name, files)| {
                if name.ends_with("[]") {
                    RawUpload::many(files.clone())
                } else {
                    RawUpload::single(files[0].clone())
                }
            })
            .collect()
    }
}

/// The part's declared content type without parameters, else a guess from the
/// filename.
fn declared_mime_type(content_type: Option<&str>, filename: &str) -> String {
    content_type
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| {
            mime_guess::from_path(filename)
                .first_or(mime::APPLICATION_OCTET_STREAM)
                .essence_str()
                .to_string()
        })
}
