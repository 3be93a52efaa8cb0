use std::path::{Component, Path};

use crate::TransferError;

/// File extensions accepted for sequencing-read uploads.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["fastq", "fq"];

/// Validates a client-declared upload file name.
///
/// Rejects:
/// - Empty names
/// - Anything that is not a single plain path component (separators,
///   `.`, `..`, absolute paths, Windows prefixes)
/// - Extensions other than [`ACCEPTED_EXTENSIONS`] (ASCII case-insensitive)
pub fn validate_upload_name(file_name: &str) -> Result<(), TransferError> {
    if file_name.is_empty() {
        return Err(TransferError::InvalidFileName("empty file name".into()));
    }

    let path = Path::new(file_name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => {}
        _ => {
            return Err(TransferError::InvalidFileName(format!(
                "not a plain file name: {file_name}"
            )));
        }
    }
    // Backslash is a separator on Windows but not to `Path` on Unix.
    if file_name.contains('\\') {
        return Err(TransferError::InvalidFileName(format!(
            "not a plain file name: {file_name}"
        )));
    }

    let accepted = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|a| a.eq_ignore_ascii_case(ext))
        });
    if !accepted {
        return Err(TransferError::UnsupportedFormat(file_name.to_string()));
    }

    Ok(())
}
