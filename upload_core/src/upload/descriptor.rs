//! Raw upload descriptors as handed over by the hosting web server.

use serde::{Deserialize, Serialize};

/// Status reported by the web server for a single submitted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum UploadErrorCode {
    #[default]
    Ok,
    /// Larger than the server-wide upload limit.
    IniSize,
    /// Larger than the limit declared by the submitting form.
    FormSize,
    Partial,
    NoFile,
    NoTmpDir,
    CantWrite,
    /// An extension of the web server stopped the upload.
    Extension,
}

impl UploadErrorCode {
    pub fn code(self) -> u8 {
        match self {
            UploadErrorCode::Ok => 0,
            UploadErrorCode::IniSize => 1,
            UploadErrorCode::FormSize => 2,
            UploadErrorCode::Partial => 3,
            UploadErrorCode::NoFile => 4,
            UploadErrorCode::NoTmpDir => 6,
            UploadErrorCode::CantWrite => 7,
            UploadErrorCode::Extension => 8,
        }
    }

    pub fn is_ok(self) -> bool {
        self == UploadErrorCode::Ok
    }
}

impl TryFrom<u8> for UploadErrorCode {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(UploadErrorCode::Ok),
            1 => Ok(UploadErrorCode::IniSize),
            2 => Ok(UploadErrorCode::FormSize),
            3 => Ok(UploadErrorCode::Partial),
            4 => Ok(UploadErrorCode::NoFile),
            6 => Ok(UploadErrorCode::NoTmpDir),
            7 => Ok(UploadErrorCode::CantWrite),
            8 => Ok(UploadErrorCode::Extension),
            other => Err(format!("unknown upload error code {}", other)),
        }
    }
}

impl From<UploadErrorCode> for u8 {
    fn from(code: UploadErrorCode) -> Self {
        code.code()
    }
}

/// A descriptor field that is either a single value or one value per file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn is_many(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }

    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        match self {
            OneOrMany::One(value) if index == 0 => Some(value),
            OneOrMany::One(_) => None,
            OneOrMany::Many(values) => values.get(index),
        }
    }
}

/// One file as described by the web server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFile {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub tmp_name: String,
    pub error: UploadErrorCode,
    pub size: u64,
}

/// The descriptor submitted for one form field.
///
/// A multi-file input carries arrays in every field, indexed in parallel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUpload {
    pub name: OneOrMany<String>,
    #[serde(rename = "type")]
    pub mime_type: OneOrMany<String>,
    pub tmp_name: OneOrMany<String>,
    pub error: OneOrMany<UploadErrorCode>,
    pub size: OneOrMany<u64>,
}

impl RawUpload {
    pub fn single(file: RawFile) -> Self {
        Self {
            name: OneOrMany::One(file.name),
            mime_type: OneOrMany::One(file.mime_type),
            tmp_name: OneOrMany::One(file.tmp_name),
            error: OneOrMany::One(file.error),
            size: OneOrMany::One(file.size),
        }
    }

    pub fn many(files: Vec<RawFile>) -> Self {
        let mut name = Vec::with_capacity(files.len());
        let mut mime_type = Vec::with_capacity(files.len());
        let mut tmp_name = Vec::with_capacity(files.len());
        let mut error = Vec::with_capacity(files.len());
        let mut size = Vec::with_capacity(files.len());

        for file in files {
            name.push(file.name);
            mime_type.push(file.mime_type);
            tmp_name.push(file.tmp_name);
            error.push(file.error);
            size.push(file.size);
        }

        Self {
            name: OneOrMany::Many(name),
            mime_type: OneOrMany::Many(mime_type),
            tmp_name: OneOrMany::Many(tmp_name),
            error: OneOrMany::Many(error),
            size: OneOrMany::Many(size),
        }
    }

    /// Expands the descriptor into one entry per file, following the `name` field.
    ///
    /// Parallel fields shorter than `name` fill in empty strings, zero size and `Ok`.
    pub fn entries(&self) -> Vec<RawFile> {
        (0..self.name.len())
            .map(|i| RawFile {
                name: self.name.get(i).cloned().unwrap_or_default(),
                mime_type: self.mime_type.get(i).cloned().unwrap_or_default(),
                tmp_name: self.tmp_name.get(i).cloned().unwrap_or_default(),
                error: self.error.get(i).copied().unwrap_or_default(),
                size: self.size.get(i).copied().unwrap_or_default(),
            })
            .collect()
    }
}
