//! Validation and storage of files submitted through a multipart form.

pub mod descriptor;
pub mod error;
pub mod file;
pub mod limits;
pub mod manager;
pub mod options;
pub mod size;
pub mod validation;

pub use descriptor::{OneOrMany, RawFile, RawUpload, UploadErrorCode};
pub use error::{UploadError, UploadResult};
pub use file::UploadedFile;
pub use limits::{Limits, ServerLimits};
pub use manager::UploadManager;
pub use options::UploadOptions;
pub use size::{format_size, parse_size, ByteSize};
pub use validation::{UploadValidator, Violation};
