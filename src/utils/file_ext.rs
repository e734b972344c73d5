// src/utils/file_ext.rs

use validator::ValidationError;

use crate::{error::field_error, utils::multipart::UploadedFile};

/// The only extension accepted for certificate uploads.
pub const PDF_EXTENSION: &str = ".pdf";

/// Returns the last path segment of a stored or uploaded file name.
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Returns the extension of a file name, including the leading dot.
///
/// Leading dots of the base name are not treated as a separator, so
/// `.pdf` and `..pdf` have no extension while `a.tar.pdf` has `.pdf`.
pub fn extension(name: &str) -> Option<&str> {
    let base = base_name(name);
    let dot = base.rfind('.')?;
    if base[..dot].chars().all(|c| c == '.') {
        return None;
    }
    Some(&base[dot..])
}

/// True when the uploaded name carries a `.pdf` extension (any case).
pub fn has_pdf_extension(name: &str) -> bool {
    extension(name).is_some_and(|ext| ext.eq_ignore_ascii_case(PDF_EXTENSION))
}

/// True when a stored file name ends in `.pdf` (any case).
/// Used on the download side, where rows are never re-validated.
pub fn is_pdf_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(PDF_EXTENSION)
}

/// Checks a single certificate attachment.
pub fn validate_certificate(file: &UploadedFile) -> Result<(), ValidationError> {
    if !has_pdf_extension(&file.file_name) {
        return Err(field_error("invalid_extension", "Only PDF files are allowed."));
    }
    if file.data.is_empty() {
        return Err(field_error("empty_file", "The submitted file is empty."));
    }
    Ok(())
}

/// Checks a whole batch. The first failing file rejects the batch.
pub fn validate_certificates(files: &[UploadedFile]) -> Result<(), ValidationError> {
    files.iter().try_for_each(validate_certificate)
}
