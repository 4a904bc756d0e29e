//! Server-wide upload limits.
//!
//! These limits are shared by every batch in the process. Nothing isolates one
//! request from another: a write through any handle is seen by all of them and the
//! last writer wins. Configure the global instance once at startup.

use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::Serialize;

use super::error::UploadResult;
use super::size::parse_size;

pub const DEFAULT_UPLOAD_MAX_FILESIZE: u64 = 2_000_000;
pub const DEFAULT_POST_MAX_SIZE: u64 = 8_000_000;

lazy_static! {
    static ref GLOBAL_LIMITS: ServerLimits =
        ServerLimits::new(Some(DEFAULT_UPLOAD_MAX_FILESIZE), Some(DEFAULT_POST_MAX_SIZE));
}

/// Snapshot of the limits at one point in time. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limits {
    pub upload_max_filesize: Option<u64>,
    pub post_max_size: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ServerLimits {
    inner: Arc<RwLock<Limits>>,
}

impl ServerLimits {
    pub fn new(upload_max_filesize: Option<u64>, post_max_size: Option<u64>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Limits {
                upload_max_filesize,
                post_max_size,
            })),
        }
    }

    /// Builds limits from shorthand settings such as `"2M"` and `"8M"`.
    pub fn from_shorthand(upload_max_filesize: &str, post_max_size: &str) -> UploadResult<Self> {
        Ok(Self::new(parse_size(upload_max_filesize)?, parse_size(post_max_size)?))
    }

    /// The process-wide limits.
    pub fn global() -> Self {
        GLOBAL_LIMITS.clone()
    }

    pub fn snapshot(&self) -> Limits {
        *self.inner.read()
    }

    pub fn upload_max_filesize(&self) -> Option<u64> {
        self.inner.read().upload_max_filesize
    }

    pub fn post_max_size(&self) -> Option<u64> {
        self.inner.read().post_max_size
    }

    pub fn set_upload_max_filesize(&self, bytes: Option<u64>) {
        self.inner.write().upload_max_filesize = bytes;
    }

    pub fn set_post_max_size(&self, bytes: Option<u64>) {
        self.inner.write().post_max_size = bytes;
    }

    /// Replaces both limits in one write.
    pub fn configure(&self, limits: Limits) {
        *self.inner.write() = limits;
    }

    /// Sets the upload limit and raises the post limit when it is lower.
    pub fn raise_upload_max_filesize(&self, bytes: u64) {
        let mut limits = self.inner.write();
        limits.upload_max_filesize = Some(bytes);
        if matches!(limits.post_max_size, Some(post) if post < bytes) {
            limits.post_max_size = Some(bytes);
        }
    }
}
