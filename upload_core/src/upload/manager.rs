use std::error::Error as StdError;

use tracing::{debug, error, info, warn};

use super::descriptor::{RawUpload, UploadErrorCode};
use super::error::{UploadError, UploadResult};
use super::file::UploadedFile;
use super::options::UploadOptions;
use super::size::ByteSize;
use super::validation::UploadValidator;

/// Validates and stores the files of one upload batch.
#[derive(Debug)]
pub struct UploadManager {
    options: UploadOptions,
    files: Vec<UploadedFile>,
}

impl UploadManager {
    /// Collects the submitted files, in submission order.
    ///
    /// Entries without a temporary path or flagged `NoFile` were empty inputs and
    /// are left out.
    pub fn new<I>(uploads: I, options: Option<UploadOptions>) -> Self
    where
        I: IntoIterator<Item = RawUpload>,
    {
        let files: Vec<UploadedFile> = uploads
            .into_iter()
            .flat_map(|upload| upload.entries())
            .filter(|raw| !raw.tmp_name.is_empty() && raw.error != UploadErrorCode::NoFile)
            .map(UploadedFile::from)
            .collect();

        debug!("Collected {} uploaded file(s)", files.len());

        Self {
            options: options.unwrap_or_default(),
            files,
        }
    }

    pub fn with_default_options<I>(uploads: I) -> Self
    where
        I: IntoIterator<Item = RawUpload>,
    {
        Self::new(uploads, None)
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    pub fn count_files(&self) -> usize {
        self.files.len()
    }

    pub fn uploaded_files(&self) -> &[UploadedFile] {
        &self.files
    }

    /// Sum of the declared sizes of all files, saturating at `u64::MAX`.
    pub fn upload_size(&self) -> u64 {
        self.files
            .iter()
            .fold(0u64, |total, file| total.saturating_add(file.size()))
    }

    pub fn upload_max_file_size(&self) -> Option<u64> {
        self.options.limits().upload_max_filesize()
    }

    /// Sets the server upload limit, raising the post limit when it is lower.
    ///
    /// The limits are shared by the whole process, not just this batch.
    pub fn set_upload_max_file_size(&self, bytes: u64) {
        self.options.limits().raise_upload_max_filesize(bytes);
    }

    /// Validates and stores every file, returning the stored files in order.
    pub fn upload(self) -> UploadResult<Vec<UploadedFile>> {
        self.upload_with(|file, _, _| Ok::<_, UploadError>(Some(file)))
    }

    /// Like [`UploadManager::upload`], handing each stored file to `each` together
    /// with its original filename and 1-based index. Whatever `each` returns is
    /// collected; `None` leaves the file out of the result.
    pub fn upload_with<T, E, F>(self, each: F) -> UploadResult<Vec<T>>
    where
        F: FnMut(UploadedFile, &str, usize) -> Result<Option<T>, E>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        self.validate_uploads()?;
        self.do_upload(each)
    }

    /// Checks the batch limits, then every file. Violations of all files are
    /// reported together.
    pub fn validate_uploads(&self) -> UploadResult<()> {
        if self.files.is_empty() {
            return Ok(());
        }

        let total = self.upload_size();
        if let Some(max_total) = self.options.max_total_size() {
            if total > max_total {
                warn!("Upload of {} bytes exceeds total limit of {} bytes", total, max_total);
                return Err(UploadError::TotalSizeExceeded {
                    allowed: ByteSize(max_total),
                    actual: ByteSize(total),
                    count: self.files.len(),
                });
            }
        }

        if let Some(max_files) = self.options.max_files() {
            if self.count_files() > max_files {
                warn!("Upload of {} files exceeds limit of {}", self.count_files(), max_files);
                return Err(UploadError::TooManyFiles { max: max_files });
            }
        }

        let validator = UploadValidator::new(&self.options);
        let mut violations = Vec::new();
        for file in &self.files {
            violations.extend(validator.validate_upload(file)?);
        }

        if !violations.is_empty() {
            warn!("Upload validation failed with {} violation(s)", violations.len());
            return Err(UploadError::Validation { violations });
        }

        Ok(())
    }

    fn do_upload<T, E, F>(self, mut each: F) -> UploadResult<Vec<T>>
    where
        F: FnMut(UploadedFile, &str, usize) -> Result<Option<T>, E>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let mut list = Vec::with_capacity(self.files.len());

        for (i, file) in self.files.iter().enumerate() {
            let index = i + 1;
            let abort = |source: Box<dyn StdError + Send + Sync>| {
                error!("Upload aborted at file {}: {}", index, source);
                UploadError::Aborted { index, source }
            };

            let uploaded = self.upload_file(file).map_err(|e| abort(Box::new(e)))?;
            if let Some(item) = each(uploaded, file.original_filename(), index).map_err(|e| abort(e.into()))? {
                list.push(item);
            }
        }

        Ok(list)
    }

    fn upload_file(&self, file: &UploadedFile) -> UploadResult<UploadedFile> {
        match self.options.upload_dir() {
            Some(dir) => {
                let target = dir.join(file.original_filename());
                let stored = file.clone().move_to(&target, self.options.allow_overwrite())?;
                info!("Stored {} at {}", file.original_filename(), stored.path().display());
                Ok(stored)
            }
            None => Ok(file.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{RawFile, ServerLimits};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn limits() -> ServerLimits {
        ServerLimits::new(Some(2_000_000), Some(8_000_000))
    }

    fn raw(name: &str, tmp_name: &str, size: u64, error: UploadErrorCode) -> RawFile {
        RawFile {
            name: name.to_string(),
            mime_type: "text/plain".to_string(),
            tmp_name: tmp_name.to_string(),
            error,
            size,
        }
    }

    fn write_temp(dir: &TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_collects_files_in_order() {
        let uploads = vec![
            RawUpload::single(raw("a.txt", "/tmp/a", 1, UploadErrorCode::Ok)),
            RawUpload::many(vec![
                raw("b.txt", "/tmp/b", 2, UploadErrorCode::Ok),
                raw("", "", 0, UploadErrorCode::NoFile),
                raw("c.txt", "/tmp/c", 3, UploadErrorCode::Partial),
            ]),
            RawUpload::single(raw("d.txt", "/tmp/d", 0, UploadErrorCode::NoFile)),
        ];

        let manager = UploadManager::new(uploads, Some(UploadOptions::with_limits(limits())));

        let names: Vec<_> = manager.uploaded_files().iter().map(|f| f.original_filename()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
        assert_eq!(manager.count_files(), 3);
        assert_eq!(manager.upload_size(), 6);
    }

    #[test]
    fn test_empty_batch_uploads_nothing() {
        let manager = UploadManager::new(Vec::new(), Some(UploadOptions::with_limits(limits())));
        assert!(manager.upload().unwrap().is_empty());
    }

    #[test]
    fn test_single_file_without_upload_dir_passes_through() {
        let uploads = vec![RawUpload::single(raw("a.txt", "/tmp/php1", 500, UploadErrorCode::Ok))];
        let manager = UploadManager::new(uploads, Some(UploadOptions::with_limits(limits())));

        let files = manager.upload().unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path(), PathBuf::from("/tmp/php1"));
        assert_eq!(files[0].size(), 500);
        assert_eq!(files[0].original_filename(), "a.txt");
    }

    #[test]
    fn test_total_size_exceeded() {
        let tmp = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let uploads = vec![RawUpload::many(vec![
            raw("a.txt", &write_temp(&tmp, "a", "0123456789"), 10, UploadErrorCode::Ok),
            raw("b.txt", &write_temp(&tmp, "b", "01234567890123456789"), 20, UploadErrorCode::Ok),
        ])];
        let options = UploadOptions::with_limits(limits())
            .with_max_files(Some(5))
            .with_max_total_size(25)
            .with_upload_dir(dest.path(), false)
            .unwrap();

        let err = UploadManager::new(uploads, Some(options)).upload().unwrap_err();

        assert!(matches!(err, UploadError::TotalSizeExceeded { count: 2, .. }));
        assert_eq!(
            err.to_string(),
            "Total file size exceeds total allowed size 25 bytes. 30 bytes with 2 files."
        );
        assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
        assert!(tmp.path().join("a").exists());
    }

    #[test]
    fn test_huge_declared_sizes_still_exceed_total() {
        let uploads = vec![RawUpload::many(vec![
            raw("a.txt", "/tmp/a", u64::MAX, UploadErrorCode::Ok),
            raw("b.txt", "/tmp/b", 2, UploadErrorCode::Ok),
        ])];
        let options = UploadOptions::with_limits(ServerLimits::new(None, None))
            .with_max_files(None)
            .with_max_total_size(100);

        let manager = UploadManager::new(uploads, Some(options));
        assert_eq!(manager.upload_size(), u64::MAX);

        let err = manager.upload().unwrap_err();
        assert!(matches!(err, UploadError::TotalSizeExceeded { count: 2, .. }));
    }

    #[test]
    fn test_too_many_files() {
        let uploads = vec![RawUpload::many(vec![
            raw("a.txt", "/tmp/a", 1, UploadErrorCode::Ok),
            raw("b.txt", "/tmp/b", 1, UploadErrorCode::Ok),
        ])];
        let manager = UploadManager::new(uploads, Some(UploadOptions::with_limits(limits())));

        let err = manager.upload().unwrap_err();

        assert!(matches!(err, UploadError::TooManyFiles { max: 1 }));
        assert_eq!(err.to_string(), "Max file exceeded, only 1 file(s) allowed.");
    }

    #[test]
    fn test_violations_of_all_files_are_joined() {
        let uploads = vec![RawUpload::many(vec![
            raw("a.txt", "/tmp/a", 1, UploadErrorCode::Ok),
            raw("b.txt", "/tmp/b", 1, UploadErrorCode::FormSize),
        ])];
        let options = UploadOptions::with_limits(limits())
            .with_max_files(None)
            .add_mime_type("image/png");

        let err = UploadManager::new(uploads, Some(options)).upload().unwrap_err();

        assert_eq!(err.violations().len(), 2);
        assert_eq!(
            err.to_string(),
            "a.txt is not allowed to be uploaded (text/plain)\nb.txt exceeds max size. Allowed is 1.91 MB"
        );
    }

    #[test]
    fn test_server_error_is_reported_with_filename() {
        let uploads = vec![RawUpload::single(raw("big.iso", "/tmp/a", 1, UploadErrorCode::FormSize))];
        let manager = UploadManager::new(uploads, Some(UploadOptions::with_limits(limits())));

        let err = manager.upload().unwrap_err();

        let message = err.to_string();
        assert!(message.contains("exceeds max size"));
        assert!(message.contains("big.iso"));
    }

    #[test]
    fn test_upload_moves_files_into_upload_dir() {
        let tmp = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let uploads = vec![RawUpload::many(vec![
            raw("a.txt", &write_temp(&tmp, "php1", "first"), 5, UploadErrorCode::Ok),
            raw("b.txt", &write_temp(&tmp, "php2", "second"), 6, UploadErrorCode::Ok),
        ])];
        let options = UploadOptions::with_limits(limits())
            .with_max_files(Some(2))
            .with_upload_dir(dest.path(), false)
            .unwrap();

        let files = UploadManager::new(uploads, Some(options)).upload().unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path(), dest.path().join("a.txt"));
        assert_eq!(files[1].path(), dest.path().join("b.txt"));
        assert_eq!(fs::read_to_string(dest.path().join("b.txt")).unwrap(), "second");
        assert!(!tmp.path().join("php1").exists());
    }

    #[test]
    fn test_upload_with_callback() {
        let tmp = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let uploads = vec![RawUpload::many(vec![
            raw("a.txt", &write_temp(&tmp, "php1", "a"), 1, UploadErrorCode::Ok),
            raw("b.txt", &write_temp(&tmp, "php2", "b"), 1, UploadErrorCode::Ok),
            raw("c.txt", &write_temp(&tmp, "php3", "c"), 1, UploadErrorCode::Ok),
        ])];
        let options = UploadOptions::with_limits(limits())
            .with_max_files(None)
            .with_upload_dir(dest.path(), false)
            .unwrap();

        let mut seen = Vec::new();
        let result = UploadManager::new(uploads, Some(options))
            .upload_with(|file, name, index| {
                seen.push((name.to_string(), index));
                if index == 2 {
                    return Ok::<_, UploadError>(None);
                }
                Ok(Some(file.path().to_path_buf()))
            })
            .unwrap();

        assert_eq!(
            seen,
            vec![("a.txt".to_string(), 1), ("b.txt".to_string(), 2), ("c.txt".to_string(), 3)]
        );
        assert_eq!(result, vec![dest.path().join("a.txt"), dest.path().join("c.txt")]);
        assert!(dest.path().join("b.txt").exists());
    }

    #[test]
    fn test_callback_error_aborts_batch() {
        let uploads = vec![RawUpload::many(vec![
            raw("a.txt", "/tmp/a", 1, UploadErrorCode::Ok),
            raw("b.txt", "/tmp/b", 1, UploadErrorCode::Ok),
        ])];
        let options = UploadOptions::with_limits(limits()).with_max_files(None);

        let mut calls = 0;
        let err = UploadManager::new(uploads, Some(options))
            .upload_with(|_, name, _| {
                calls += 1;
                Err::<Option<()>, _>(anyhow::anyhow!("rejected {}", name))
            })
            .unwrap_err();

        assert_eq!(calls, 1);
        assert!(matches!(err, UploadError::Aborted { index: 1, .. }));
        assert_eq!(err.to_string(), "rejected a.txt");
    }

    #[test]
    fn test_failed_move_keeps_earlier_files() {
        let tmp = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let uploads = vec![RawUpload::many(vec![
            raw("a.txt", &write_temp(&tmp, "php1", "a"), 1, UploadErrorCode::Ok),
            raw("b.txt", &tmp.path().join("vanished").to_string_lossy(), 1, UploadErrorCode::Ok),
        ])];
        let options = UploadOptions::with_limits(limits())
            .with_max_files(None)
            .with_upload_dir(dest.path(), false)
            .unwrap();

        let err = UploadManager::new(uploads, Some(options)).upload().unwrap_err();

        assert!(matches!(err, UploadError::Aborted { index: 2, .. }));
        assert!(matches!(
            err.root().downcast_ref::<UploadError>(),
            Some(UploadError::MoveFailed { .. })
        ));
        assert!(dest.path().join("a.txt").exists());
    }

    #[test]
    fn test_set_upload_max_file_size_raises_post_limit() {
        let limits = ServerLimits::new(Some(1_000), Some(2_000));
        let manager = UploadManager::new(Vec::new(), Some(UploadOptions::with_limits(limits.clone())));

        manager.set_upload_max_file_size(5_000);

        assert_eq!(manager.upload_max_file_size(), Some(5_000));
        assert_eq!(limits.post_max_size(), Some(5_000));
    }
}
