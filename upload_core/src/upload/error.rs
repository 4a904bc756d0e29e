//! Failure type shared by every upload operation

use std::path::PathBuf;

use thiserror::Error;

use super::size::ByteSize;
use super::validation::Violation;

pub type UploadResult<T> = std::result::Result<T, UploadError>;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload dir does not exist: {}", .0.display())]
    UploadDirMissing(PathBuf),

    #[error("Total file size exceeds total allowed size {allowed}. {actual} with {count} files.")]
    TotalSizeExceeded {
        allowed: ByteSize,
        actual: ByteSize,
        count: usize,
    },

    #[error("Max file exceeded, only {max} file(s) allowed.")]
    TooManyFiles { max: usize },

    #[error("Missing a temporary folder.")]
    MissingTempDir,

    #[error("{}", join_lines(.violations))]
    Validation { violations: Vec<Violation> },

    #[error("File exists {}", .0.display())]
    FileExists(PathBuf),

    #[error("Could not move file {}", .path.display())]
    MoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid size setting: {0:?}")]
    InvalidSize(String),

    /// A failure while files were being relocated; the batch stopped at `index`.
    #[error("{source}")]
    Aborted {
        index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl UploadError {
    pub fn violations(&self) -> &[Violation] {
        match self {
            UploadError::Validation { violations } => violations,
            _ => &[],
        }
    }

    /// Walks through `Aborted` wrappers to the failure that stopped the batch.
    pub fn root(&self) -> &(dyn std::error::Error + 'static) {
        match self {
            UploadError::Aborted { source, .. } => match source.downcast_ref::<UploadError>() {
                Some(inner) => inner.root(),
                None => source.as_ref(),
            },
            other => other,
        }
    }
}

fn join_lines(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
