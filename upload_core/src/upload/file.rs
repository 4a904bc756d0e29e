//! A single submitted file and its relocation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::descriptor::{RawFile, UploadErrorCode};
use super::error::{UploadError, UploadResult};

/// Metadata of one uploaded file plus the path that currently holds its bytes.
///
/// The instance owns `path` until [`UploadedFile::move_to`] hands the bytes over to
/// a new instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    original_filename: String,
    mime_type: String,
    size: u64,
    error: UploadErrorCode,
    path: PathBuf,
}

impl UploadedFile {
    pub fn new(
        original_filename: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        error: UploadErrorCode,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            original_filename: original_filename.into(),
            mime_type: mime_type.into(),
            size,
            error,
            path: path.into(),
        }
    }

    /// Copies every field of `original` except the path, which becomes `new_path`.
    pub fn create_from(original: &UploadedFile, new_path: impl Into<PathBuf>) -> Self {
        Self {
            path: new_path.into(),
            ..original.clone()
        }
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Size declared by the web server, not read from disk.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn error(&self) -> UploadErrorCode {
        self.error
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_ok()
    }

    /// Extension of the original filename, empty when it has none.
    pub fn extension(&self) -> &str {
        match self.original_filename.rsplit_once('.') {
            Some((_, ext)) => ext,
            None => "",
        }
    }

    /// The original filename without `.ext`.
    ///
    /// Without an extension this is the basename of the current path, not the
    /// original filename.
    pub fn filename_without_extension(&self) -> String {
        let ext = self.extension();
        if ext.is_empty() {
            return self
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
        }

        self.original_filename
            .strip_suffix(&format!(".{}", ext))
            .unwrap_or(&self.original_filename)
            .to_string()
    }

    /// Whether a file named like the original filename exists directly inside `dir`.
    ///
    /// # Panics
    ///
    /// Panics if `dir` is not an existing directory.
    pub fn exists_in_dir(&self, dir: &Path) -> bool {
        assert!(dir.is_dir(), "{} is not a directory", dir.display());
        dir.join(&self.original_filename).exists()
    }

    /// Moves the file to `destination`.
    ///
    /// A directory destination receives the file under its original filename, any
    /// other path is used as the target verbatim. An existing target fails with
    /// [`UploadError::FileExists`] and nothing is touched, unless `overwrite` is set,
    /// in which case the target is removed first.
    pub fn move_to(self, destination: &Path, overwrite: bool) -> UploadResult<UploadedFile> {
        let target = if destination.is_dir() {
            destination.join(&self.original_filename)
        } else {
            destination.to_path_buf()
        };

        if target.is_file() {
            if !overwrite {
                return Err(UploadError::FileExists(target));
            }
            tracing::debug!("Removing existing file {} before overwrite", target.display());
            fs::remove_file(&target)?;
        }

        if let Err(e) = fs::rename(&self.path, &target) {
            tracing::error!("Failed to move {} to {}: {}", self.path.display(), target.display(), e);
            return Err(UploadError::MoveFailed { path: target, source: e });
        }

        Ok(UploadedFile::create_from(&self, target))
    }
}

impl From<RawFile> for UploadedFile {
    fn from(raw: RawFile) -> Self {
        Self::new(raw.name, raw.mime_type, raw.size, raw.error, raw.tmp_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_upload(dir: &TempDir, tmp_name: &str, original: &str, contents: &str) -> UploadedFile {
        let path = dir.path().join(tmp_name);
        fs::write(&path, contents).unwrap();
        UploadedFile::new(original, "text/plain", contents.len() as u64, UploadErrorCode::Ok, path)
    }

    #[test]
    fn test_extension() {
        let file = UploadedFile::new("report.final.pdf", "application/pdf", 1, UploadErrorCode::Ok, "/tmp/x");
        assert_eq!(file.extension(), "pdf");
        assert_eq!(file.filename_without_extension(), "report.final");

        let no_ext = UploadedFile::new("README", "text/plain", 1, UploadErrorCode::Ok, "/tmp/phpA1b2");
        assert_eq!(no_ext.extension(), "");
        assert_eq!(no_ext.filename_without_extension(), "phpA1b2");
    }

    #[test]
    fn test_has_error() {
        let ok = UploadedFile::new("a.txt", "text/plain", 1, UploadErrorCode::Ok, "/tmp/a");
        assert!(!ok.has_error());

        let partial = UploadedFile::new("a.txt", "text/plain", 1, UploadErrorCode::Partial, "/tmp/a");
        assert!(partial.has_error());
    }

    #[test]
    fn test_create_from_keeps_metadata() {
        let original = UploadedFile::new("a.txt", "text/plain", 500, UploadErrorCode::FormSize, "/tmp/a");
        let copy = UploadedFile::create_from(&original, "/srv/uploads/a.txt");

        assert_eq!(copy.original_filename(), original.original_filename());
        assert_eq!(copy.mime_type(), original.mime_type());
        assert_eq!(copy.size(), original.size());
        assert_eq!(copy.error(), original.error());
        assert_eq!(copy.path(), Path::new("/srv/uploads/a.txt"));
        assert_ne!(copy.path(), original.path());
    }

    #[test]
    fn test_exists_in_dir() {
        let dir = TempDir::new().unwrap();
        let file = UploadedFile::new("a.txt", "text/plain", 1, UploadErrorCode::Ok, "/tmp/a");

        assert!(!file.exists_in_dir(dir.path()));
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        assert!(file.exists_in_dir(dir.path()));
    }

    #[test]
    #[should_panic(expected = "is not a directory")]
    fn test_exists_in_dir_requires_directory() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("missing");
        let file = UploadedFile::new("a.txt", "text/plain", 1, UploadErrorCode::Ok, "/tmp/a");
        file.exists_in_dir(&not_a_dir);
    }

    #[test]
    fn test_move_into_directory() {
        let tmp = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = temp_upload(&tmp, "php1", "a.txt", "hello");
        let source = file.path().to_path_buf();

        let moved = file.move_to(dest.path(), false).unwrap();

        assert_eq!(moved.path(), dest.path().join("a.txt"));
        assert_eq!(fs::read_to_string(moved.path()).unwrap(), "hello");
        assert!(!source.exists());
        assert_eq!(moved.size(), 5);
    }

    #[test]
    fn test_move_to_explicit_path() {
        let tmp = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = temp_upload(&tmp, "php1", "a.txt", "hello");
        let target = dest.path().join("renamed.bin");

        let moved = file.move_to(&target, false).unwrap();

        assert_eq!(moved.path(), target);
        assert_eq!(moved.original_filename(), "a.txt");
        assert!(target.is_file());
    }

    #[test]
    fn test_move_refuses_existing_target() {
        let tmp = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = temp_upload(&tmp, "php1", "a.txt", "new");
        let source = file.path().to_path_buf();
        fs::write(dest.path().join("a.txt"), "old").unwrap();

        let result = file.move_to(dest.path(), false);

        assert!(matches!(result, Err(UploadError::FileExists(_))));
        assert_eq!(fs::read_to_string(dest.path().join("a.txt")).unwrap(), "old");
        assert_eq!(fs::read_to_string(&source).unwrap(), "new");
    }

    #[test]
    fn test_move_overwrites_existing_target() {
        let tmp = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = temp_upload(&tmp, "php1", "a.txt", "new");
        let source = file.path().to_path_buf();
        fs::write(dest.path().join("a.txt"), "old").unwrap();

        let moved = file.move_to(dest.path(), true).unwrap();

        assert_eq!(moved.path(), dest.path().join("a.txt"));
        assert_eq!(fs::read_to_string(moved.path()).unwrap(), "new");
        assert!(!source.exists());
    }

    #[test]
    fn test_move_missing_source_fails() {
        let tmp = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = UploadedFile::new("a.txt", "text/plain", 1, UploadErrorCode::Ok, tmp.path().join("gone"));

        let result = file.move_to(dest.path(), false);

        match result {
            Err(UploadError::MoveFailed { path, .. }) => assert_eq!(path, dest.path().join("a.txt")),
            other => panic!("expected MoveFailed, got {:?}", other),
        }
    }
}
