// src/utils/storage.rs

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

use crate::{error::AppError, utils::file_ext::base_name};

/// Storage namespace for certificate files, relative to the media root.
pub const CERTIFICATES_DIR: &str = "certificates";

const MAX_NAME_ATTEMPTS: usize = 100;

/// Length of the random token added on a name collision.
const SUFFIX_CHARS: usize = 7;

/// Longest storage name the `certificates.file` column holds.
pub const MAX_STORAGE_NAME_CHARS: usize = 255;

/// Longest sanitized base name in bytes. Leaves room for the directory prefix
/// and a `_<token>` collision suffix. Counting bytes also keeps the name
/// under the usual 255-byte filesystem limit.
const MAX_BASE_NAME_LEN: usize =
    MAX_STORAGE_NAME_CHARS - CERTIFICATES_DIR.len() - 1 - SUFFIX_CHARS - 1;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^-\w.]").expect("valid filename regex"));

/// Local filesystem storage for uploaded certificates.
///
/// Files are addressed by their storage name, a path relative to the media
/// root such as `certificates/cert.pdf`. That name is what the
/// `certificates.file` column holds.
#[derive(Debug, Clone)]
pub struct CertificateStorage {
    root: PathBuf,
}

impl CertificateStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the certificates directory if it does not exist yet.
    pub async fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root.join(CERTIFICATES_DIR)).await?;
        Ok(())
    }

    /// Stores the bytes under a fresh name derived from `original_name`.
    ///
    /// The sanitized base name is used as is when free, otherwise a
    /// `_<7 chars>` suffix is appended to the stem until a free name is found.
    /// Returns the storage name.
    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<String, AppError> {
        self.ensure_dirs().await?;

        let clean = sanitize_file_name(original_name);
        let mut candidate = clean.clone();

        for _ in 0..MAX_NAME_ATTEMPTS {
            let storage_name = format!("{}/{}", CERTIFICATES_DIR, candidate);
            let path = self.root.join(&storage_name);

            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(data).await?;
                    file.flush().await?;
                    debug!("Stored certificate file: {}", storage_name);
                    return Ok(storage_name);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = with_random_suffix(&clean);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::InternalServerError(format!(
            "Could not find a free storage name for '{}'",
            clean
        )))
    }

    /// Reads a stored file. A missing file maps to `NotFound`.
    pub async fn read(&self, storage_name: &str) -> Result<Vec<u8>, AppError> {
        let path = self.resolve(storage_name)?;
        fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::NotFound("Certificate file not found".to_string()),
            _ => e.into(),
        })
    }

    /// Removes a stored file. Missing files are not an error.
    pub async fn delete(&self, storage_name: &str) -> Result<(), AppError> {
        let path = self.resolve(storage_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal used for cleanup paths. Failures are logged.
    pub async fn delete_quietly(&self, storage_names: &[String]) {
        for name in storage_names {
            if let Err(e) = self.delete(name).await {
                warn!("Failed to remove stored file {}: {}", name, e);
            }
        }
    }

    /// Maps a storage name onto the filesystem, refusing anything that
    /// would escape the media root.
    fn resolve(&self, storage_name: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(storage_name);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| !matches!(c, std::path::Component::Normal(_)));
        if escapes {
            return Err(AppError::InternalServerError(format!(
                "Refusing to access storage path '{}'",
                storage_name
            )));
        }
        Ok(self.root.join(relative))
    }
}

/// Reduces an uploaded file name to a safe base name.
///
/// Directory parts are dropped, spaces become underscores and anything
/// outside `[-\w.]` is removed. Overlong names lose the end of their stem
/// and keep the extension.
pub fn sanitize_file_name(original: &str) -> String {
    truncate_stem(clean_file_name(original), MAX_BASE_NAME_LEN)
}

fn clean_file_name(original: &str) -> String {
    let base = base_name(original.trim()).trim().replace(' ', "_");
    let cleaned = UNSAFE_CHARS.replace_all(&base, "").into_owned();

    let rest = cleaned.trim_start_matches('.');

    if rest.is_empty() {
        "certificate".to_string()
    } else if rest.len() != cleaned.len() {
        format!("certificate.{}", rest)
    } else {
        cleaned
    }
}

fn truncate_stem(name: String, max_len: usize) -> String {
    if name.len() <= max_len {
        return name;
    }

    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name.as_str(), ""),
    };

    match max_len.checked_sub(ext.len()) {
        Some(keep) if keep > 0 => format!("{}{}", prefix_within(stem, keep), ext),
        _ => prefix_within(&name, max_len).to_string(),
    }
}

/// Longest prefix of `value` that is at most `max_len` bytes and ends on a
/// char boundary.
fn prefix_within(value: &str, max_len: usize) -> &str {
    let mut end = max_len.min(value.len());
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

fn with_random_suffix(name: &str) -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    let suffix = &token[..SUFFIX_CHARS];
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{}{}", &name[..dot], suffix, &name[dot..]),
        _ => format!("{}_{}", name, suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizing_strips_paths_and_unsafe_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("my cert (final).pdf"), "my_cert_final.pdf");
        assert_eq!(sanitize_file_name("C:\\Users\\ada\\cert.pdf"), "cert.pdf");
        assert_eq!(sanitize_file_name("???"), "certificate");
        assert_eq!(sanitize_file_name(".pdf"), "certificate.pdf");
        assert_eq!(sanitize_file_name("???.pdf"), "certificate.pdf");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let cut = truncate_stem(format!("{}.pdf", "é".repeat(10)), 9);
        assert_eq!(cut, "éé.pdf");
    }

    #[test]
    fn long_names_are_cut_before_the_extension() {
        let long = format!("{}.pdf", "a".repeat(250));
        let clean = sanitize_file_name(&long);

        assert_eq!(clean.len(), MAX_BASE_NAME_LEN);
        assert!(clean.ends_with(".pdf"));
        assert!(clean.starts_with("aaaa"));

        let suffixed = with_random_suffix(&clean);
        let storage_name = format!("{}/{}", CERTIFICATES_DIR, suffixed);
        assert_eq!(storage_name.chars().count(), MAX_STORAGE_NAME_CHARS);
        assert!(storage_name.ends_with(".pdf"));
    }

    #[test]
    fn long_names_without_a_usable_extension_are_cut_whole() {
        let long = "b".repeat(400);
        assert_eq!(sanitize_file_name(&long).len(), MAX_BASE_NAME_LEN);

        let odd = format!("x.{}", "c".repeat(400));
        assert_eq!(sanitize_file_name(&odd).len(), MAX_BASE_NAME_LEN);
        assert!(sanitize_file_name(&odd).starts_with("x.c"));
    }

    #[tokio::test]
    async fn long_names_still_fit_after_a_collision() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CertificateStorage::new(dir.path());
        let long = format!("{}.pdf", "é".repeat(300));

        let first = storage.save(&long, b"one").await.unwrap();
        let second = storage.save(&long, b"two").await.unwrap();

        assert_ne!(first, second);
        for name in [&first, &second] {
            assert!(name.len() <= MAX_STORAGE_NAME_CHARS);
            assert!(name.ends_with(".pdf"));
        }
        assert_eq!(storage.read(&second).await.unwrap(), b"two");
    }

    #[test]
    fn suffix_goes_before_the_extension() {
        let name = with_random_suffix("cert.pdf");
        assert!(name.starts_with("cert_"));
        assert!(name.ends_with(".pdf"));
        assert_eq!(name.len(), "cert_.pdf".len() + 7);
    }

    #[tokio::test]
    async fn colliding_names_get_distinct_storage_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CertificateStorage::new(dir.path());

        let first = storage.save("cert.pdf", b"one").await.unwrap();
        let second = storage.save("cert.pdf", b"two").await.unwrap();

        assert_eq!(first, "certificates/cert.pdf");
        assert_ne!(first, second);
        assert!(second.starts_with("certificates/cert_"));
        assert_eq!(storage.read(&first).await.unwrap(), b"one");
        assert_eq!(storage.read(&second).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn missing_files_read_as_not_found_and_delete_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CertificateStorage::new(dir.path());

        let err = storage.read("certificates/nope.pdf").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        storage.delete("certificates/nope.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn paths_outside_the_root_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CertificateStorage::new(dir.path());

        let err = storage.read("../secret.pdf").await.unwrap_err();
        assert!(matches!(err, AppError::InternalServerError(_)));
    }
}
