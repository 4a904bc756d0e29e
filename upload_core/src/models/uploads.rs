use serde::Serialize;

use crate::upload::{Limits, UploadedFile};

#[derive(Debug, Serialize)]
pub struct StoredFileResponse {
    pub original_filename: String,
    pub mime_type: String,
    pub size: u64,
    pub extension: String,
    pub path: String,
}

impl From<&UploadedFile> for StoredFileResponse {
    fn from(file: &UploadedFile) -> Self {
        Self {
            original_filename: file.original_filename().to_string(),
            mime_type: file.mime_type().to_string(),
            size: file.size(),
            extension: file.extension().to_string(),
            path: file.path().to_string_lossy().into_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LimitsResponse {
    #[serde(flatten)]
    pub limits: Limits,
    pub effective_max_file_size: Option<u64>,
    pub max_total_size: Option<u64>,
    pub max_files: Option<usize>,
    pub allowed_mime_types: Vec<String>,
}
