// src/models/certificate.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::utils::file_ext::{base_name, is_pdf_name};

/// Represents the 'certificates' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Certificate {
    pub id: i64,
    pub response_id: i64,

    /// Storage name relative to the media root, e.g. `certificates/cert.pdf`.
    pub file: String,

    pub uploaded_at: DateTime<Utc>,
}

impl Certificate {
    pub fn is_pdf(&self) -> bool {
        is_pdf_name(&self.file)
    }

    pub fn base_name(&self) -> &str {
        base_name(&self.file)
    }
}

/// DTO for a certificate nested in a response.
#[derive(Debug, Serialize, ToSchema)]
pub struct CertificateView {
    pub id: i64,
    pub file: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Certificate> for CertificateView {
    fn from(c: Certificate) -> Self {
        CertificateView {
            id: c.id,
            file: c.file,
            uploaded_at: c.uploaded_at,
        }
    }
}

/// Result of `POST /upload-certificate/`.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadedCertificates {
    pub certificates_uploaded: Vec<String>,
}

/// Multipart body of `POST /upload-certificate/`, for the API docs only.
/// The handler reads the form with axum's `Multipart` extractor.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadCertificatesForm {
    /// Id of the response the certificates belong to.
    pub response: i64,
    /// One or more PDF files, each sent as a `certificates` file part.
    pub certificates: Vec<String>,
}
