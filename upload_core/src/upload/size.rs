//! Byte size parsing and human readable formatting.

use std::fmt;

use super::error::UploadError;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// A byte count that displays itself in human readable form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_size(self.0))
    }
}

impl From<Option<u64>> for ByteSize {
    fn from(bytes: Option<u64>) -> Self {
        Self(bytes.unwrap_or(0))
    }
}

/// Formats `bytes` as "1.50 MB", "512 bytes", "1 byte" and so on.
pub fn format_size(bytes: u64) -> String {
    if bytes >= GB {
        format!("{} GB", format_decimal(bytes as f64 / GB as f64))
    } else if bytes >= MB {
        format!("{} MB", format_decimal(bytes as f64 / MB as f64))
    } else if bytes >= KB {
        format!("{} KB", format_decimal(bytes as f64 / KB as f64))
    } else if bytes > 1 {
        format!("{} bytes", bytes)
    } else if bytes == 1 {
        "1 byte".to_string()
    } else {
        "0 bytes".to_string()
    }
}

fn format_decimal(value: f64) -> String {
    let fixed = format!("{:.2}", value);
    let (int_part, frac) = match fixed.split_once('.') {
        Some(parts) => parts,
        None => (fixed.as_str(), "00"),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}.{}", grouped, frac)
}

/// Parses a size setting such as `"20M"`, `"512K"` or `"1048576"`.
///
/// Suffixes are decimal: `K` = 1,000, `M` = 1,000,000, `G` = 1,000,000,000.
/// An empty value, `"0"` and `"-1"` all mean "no limit" and yield `None`.
pub fn parse_size(value: &str) -> Result<Option<u64>, UploadError> {
    let invalid = || UploadError::InvalidSize(value.to_string());

    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "-1" {
        return Ok(None);
    }

    let (digits, multiplier) = match trimmed.char_indices().last() {
        Some((idx, suffix)) if suffix.is_ascii_alphabetic() => {
            let multiplier: u64 = match suffix.to_ascii_uppercase() {
                'K' => 1_000,
                'M' => 1_000_000,
                'G' => 1_000_000_000,
                _ => return Err(invalid()),
            };
            (&trimmed[..idx], multiplier)
        }
        _ => (trimmed, 1),
    };

    let number: u64 = digits.trim().parse().map_err(|_| invalid())?;
    if number == 0 {
        return Ok(None);
    }

    number.checked_mul(multiplier).map(Some).ok_or_else(invalid)
}
