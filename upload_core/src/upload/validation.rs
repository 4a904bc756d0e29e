use thiserror::Error;

use super::descriptor::UploadErrorCode;
use super::error::{UploadError, UploadResult};
use super::file::UploadedFile;
use super::options::UploadOptions;
use super::size::ByteSize;

/// A reason a single file is refused. Violations of a batch are collected and
/// reported together.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("Failed to write {filename} to disk.")]
    CantWrite { filename: String },

    #[error("An extension stopped the upload of {filename}.")]
    ExtensionStopped { filename: String },

    #[error("{filename} exceeds max size. Allowed is {allowed}")]
    ExceedsServerLimit { filename: String, allowed: ByteSize },

    #[error("No file was uploaded.")]
    NoFile,

    #[error("{filename} was only partially uploaded.")]
    Partial { filename: String },

    #[error("{filename} exceeds max size. Allowed is {allowed} but was {size}")]
    TooLarge {
        filename: String,
        allowed: ByteSize,
        size: ByteSize,
    },

    #[error("{filename} is not allowed to be uploaded ({mime_type})")]
    MimeTypeNotAllowed { filename: String, mime_type: String },

    #[error("File {filename} already exists.")]
    AlreadyExists { filename: String },

    #[error("Invalid filename: {filename}")]
    InvalidFilename { filename: String },
}

/// Checks single files against an [`UploadOptions`] policy.
pub struct UploadValidator<'a> {
    options: &'a UploadOptions,
}

impl<'a> UploadValidator<'a> {
    pub fn new(options: &'a UploadOptions) -> Self {
        Self { options }
    }

    /// Returns every violation of `file`.
    ///
    /// A missing upload dir and a missing temporary folder are not violations of the
    /// file; they fail straight away.
    pub fn validate_upload(&self, file: &UploadedFile) -> UploadResult<Vec<Violation>> {
        if let Some(dir) = self.options.upload_dir() {
            if !dir.is_dir() {
                return Err(UploadError::UploadDirMissing(dir.to_path_buf()));
            }
        }

        let filename = file.original_filename().to_string();
        let violation = match file.error() {
            UploadErrorCode::Ok => return Ok(self.check_policy(file)),
            UploadErrorCode::CantWrite => Violation::CantWrite { filename },
            UploadErrorCode::Extension => Violation::ExtensionStopped { filename },
            UploadErrorCode::FormSize | UploadErrorCode::IniSize => Violation::ExceedsServerLimit {
                filename,
                allowed: ByteSize::from(self.options.max_size()),
            },
            UploadErrorCode::NoFile => Violation::NoFile,
            UploadErrorCode::NoTmpDir => return Err(UploadError::MissingTempDir),
            UploadErrorCode::Partial => Violation::Partial { filename },
        };

        Ok(vec![violation])
    }

    fn check_policy(&self, file: &UploadedFile) -> Vec<Violation> {
        let mut violations = Vec::new();

        let upload_dir = self.options.upload_dir();

        let safe_name = upload_dir.is_none() || is_plain_filename(file.original_filename());
        if !safe_name {
            violations.push(Violation::InvalidFilename {
                filename: file.original_filename().to_string(),
            });
        }

        if let Some(max_size) = self.options.max_size() {
            if file.size() > max_size {
                violations.push(Violation::TooLarge {
                    filename: file.original_filename().to_string(),
                    allowed: ByteSize(max_size),
                    size: ByteSize(file.size()),
                });
            }
        }

        let mime_types = self.options.mime_types();
        if !mime_types.is_empty() && !mime_types.contains(file.mime_type()) {
            violations.push(Violation::MimeTypeNotAllowed {
                filename: file.original_filename().to_string(),
                mime_type: file.mime_type().to_string(),
            });
        }

        if safe_name && !self.options.allow_overwrite() {
            if let Some(dir) = upload_dir {
                if file.exists_in_dir(dir) {
                    violations.push(Violation::AlreadyExists {
                        filename: file.original_filename().to_string(),
                    });
                }
            }
        }

        violations
    }
}

/// A name that stays inside the directory it is joined to.
fn is_plain_filename(filename: &str) -> bool {
    !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\', '\0'])
}
