//! Upload policy for one batch.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::UploadResult;
use super::limits::ServerLimits;
use crate::config::UploadConfig;

#[derive(Debug, Clone)]
pub struct UploadOptions {
    upload_dir: Option<PathBuf>,
    max_size: Option<u64>,
    max_total_size: Option<u64>,
    max_files: Option<usize>,
    allowed_mime_types: HashSet<String>,
    allow_overwrite: bool,
    limits: ServerLimits,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::with_limits(ServerLimits::global())
    }
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options checked against `limits` instead of the process-wide limits.
    pub fn with_limits(limits: ServerLimits) -> Self {
        Self {
            upload_dir: None,
            max_size: None,
            max_total_size: None,
            max_files: Some(1),
            allowed_mime_types: HashSet::new(),
            allow_overwrite: false,
            limits,
        }
    }

    pub fn from_config(config: &UploadConfig, limits: ServerLimits) -> UploadResult<Self> {
        let mut options = Self::with_limits(limits)
            .with_max_files((config.max_files > 0).then_some(config.max_files))
            .with_allow_overwrite(config.allow_overwrite)
            .with_mime_types(config.allowed_mime_types.iter().cloned());

        if config.max_file_size > 0 {
            options = options.with_max_size(config.max_file_size);
        }
        if config.max_total_size > 0 {
            options = options.with_max_total_size(config.max_total_size);
        }
        if !config.upload_dir.as_os_str().is_empty() {
            options = options.with_upload_dir(&config.upload_dir, config.create_upload_dir)?;
        }

        Ok(options)
    }

    pub fn upload_dir(&self) -> Option<&Path> {
        self.upload_dir.as_deref()
    }

    pub fn max_total_size(&self) -> Option<u64> {
        self.max_total_size
    }

    pub fn max_files(&self) -> Option<usize> {
        self.max_files
    }

    pub fn mime_types(&self) -> &HashSet<String> {
        &self.allowed_mime_types
    }

    pub fn allow_overwrite(&self) -> bool {
        self.allow_overwrite
    }

    pub fn limits(&self) -> &ServerLimits {
        &self.limits
    }

    /// Effective per-file limit: the smaller of the configured size and the server
    /// upload limit, whichever of the two is set.
    pub fn max_size(&self) -> Option<u64> {
        match (self.limits.upload_max_filesize(), self.max_size) {
            (Some(system), Some(configured)) => Some(system.min(configured)),
            (system, configured) => configured.or(system),
        }
    }

    /// Sets the per-file limit. A value above the server upload limit raises that
    /// limit, which affects every batch in the process.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);

        if matches!(self.limits.upload_max_filesize(), Some(system) if system < bytes) {
            tracing::warn!("Raising server upload limit to {} bytes", bytes);
            self.limits.set_upload_max_filesize(Some(bytes));
            self.max_size = self.limits.upload_max_filesize();
        }
        self
    }

    /// Limit for all files of the batch together.
    pub fn with_max_total_size(mut self, bytes: u64) -> Self {
        self.max_total_size = Some(bytes);
        self
    }

    pub fn with_max_files(mut self, max_files: Option<usize>) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_allow_overwrite(mut self, allow_overwrite: bool) -> Self {
        self.allow_overwrite = allow_overwrite;
        self
    }

    pub fn add_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.allowed_mime_types.insert(mime_type.into());
        self
    }

    /// Adds to the allowed mime types; previously added types stay allowed.
    pub fn with_mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_mime_types.extend(mime_types.into_iter().map(Into::into));
        self
    }

    /// Sets the directory accepted files are moved to, creating it first when
    /// `create_if_missing` is set.
    pub fn with_upload_dir(mut self, dir: impl AsRef<Path>, create_if_missing: bool) -> UploadResult<Self> {
        let dir = dir.as_ref();
        if create_if_missing && !dir.is_dir() {
            tracing::info!("Creating upload dir {}", dir.display());
            fs::create_dir_all(dir)?;
        }

        self.upload_dir = Some(dir.to_path_buf());
        Ok(self)
    }
}
