// src/handlers/certificates.rs

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use sqlx::PgPool;
use utoipa::IntoParams;
use validator::ValidationErrors;

use crate::{
    error::{AppError, field_error},
    handlers::responses::{fetch_certificates, fetch_response, insert_certificates, store_files},
    models::certificate::{Certificate, UploadCertificatesForm, UploadedCertificates},
    utils::{
        archive::{ArchiveEntry, build_zip},
        file_ext::validate_certificates,
        multipart::FormData,
        slug::slugify,
        storage::CertificateStorage,
    },
};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Attaches one or more PDF certificates to an existing response.
///
/// The whole batch is rejected if any file is not a PDF.
#[utoipa::path(
    post,
    path = "/upload-certificate/",
    tag = "certificates",
    request_body(content = UploadCertificatesForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Certificates stored", body = UploadedCertificates),
        (status = 400, description = "Validation failed or unknown response")
    )
)]
pub async fn upload_certificates(
    State(pool): State<PgPool>,
    State(storage): State<CertificateStorage>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = FormData::from_multipart(multipart).await?;
    let files = form.take_files("certificates");

    let mut errors = ValidationErrors::new();

    if files.is_empty() {
        errors.add("certificates", field_error("required", "No file was submitted."));
    } else if let Err(e) = validate_certificates(&files) {
        errors.add("certificates", e);
    }

    let response_id = match form.take_text("response").map(|v| v.trim().to_string()) {
        None => {
            errors.add("response", field_error("required", "This field is required."));
            None
        }
        Some(raw) if raw.is_empty() => {
            errors.add("response", field_error("required", "This field may not be null."));
            None
        }
        Some(raw) => match raw.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add("response", field_error("invalid", "Incorrect type. Expected pk value."));
                None
            }
        },
    };

    let response_id = match response_id {
        Some(id) if errors.field_errors().is_empty() => id,
        _ => return Err(AppError::Validation(errors)),
    };

    if fetch_response(&pool, response_id).await?.is_none() {
        return Err(AppError::field(
            "response",
            "does_not_exist",
            "Invalid pk - object does not exist.",
        ));
    }

    let stored = store_files(&storage, &files).await?;

    let result = async {
        let mut tx = pool.begin().await?;
        insert_certificates(&mut tx, response_id, &stored).await?;
        tx.commit().await?;
        Ok::<_, AppError>(())
    }
    .await;

    if let Err(e) = result {
        tracing::error!("Failed to attach certificates to response {}: {}", response_id, e);
        storage.delete_quietly(&stored).await;
        return Err(e);
    }

    tracing::info!("Attached {} certificate(s) to response {}", stored.len(), response_id);

    Ok((
        StatusCode::CREATED,
        Json(UploadedCertificates {
            certificates_uploaded: stored,
        }),
    ))
}

/// Streams a single certificate as a PDF attachment.
#[utoipa::path(
    get,
    path = "/download-certificate/{id}/",
    tag = "certificates",
    params(("id" = i64, Path, description = "Certificate id")),
    responses(
        (status = 200, description = "The PDF file as an attachment"),
        (status = 400, description = "Stored file is not a PDF"),
        (status = 404, description = "Unknown certificate")
    )
)]
pub async fn download_certificate(
    State(pool): State<PgPool>,
    State(storage): State<CertificateStorage>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let certificate = sqlx::query_as::<_, Certificate>(
        "SELECT id, response_id, file, uploaded_at FROM certificates WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Certificate not found".to_string()))?;

    if !certificate.is_pdf() {
        return Err(AppError::BadRequest(
            "Only PDF files are supported for download.".to_string(),
        ));
    }

    pdf_response(&storage, &certificate).await
}

/// Query parameters for the batch download.
#[derive(Debug, Deserialize, IntoParams)]
pub struct BatchDownloadParams {
    /// Id of the response whose certificates are downloaded.
    pub response_id: Option<String>,
}

/// Downloads every PDF certificate of a response.
///
/// One certificate is sent as a plain PDF, several are bundled into a zip
/// named after the respondent's email.
#[utoipa::path(
    get,
    path = "/certificates/download/",
    tag = "certificates",
    params(BatchDownloadParams),
    responses(
        (status = 200, description = "A single PDF, or a zip of PDFs"),
        (status = 400, description = "Missing or malformed response_id"),
        (status = 404, description = "Unknown response or no PDF certificates")
    )
)]
pub async fn download_certificates(
    State(pool): State<PgPool>,
    State(storage): State<CertificateStorage>,
    Query(params): Query<BatchDownloadParams>,
) -> Result<Response, AppError> {
    let response_id = parse_response_id(params.response_id.as_deref())?;

    let response = fetch_response(&pool, response_id)
        .await?
        .ok_or(AppError::NotFound("Response not found".to_string()))?;

    let mut pdfs: Vec<Certificate> = fetch_certificates(&pool, response_id)
        .await?
        .into_iter()
        .filter(Certificate::is_pdf)
        .collect();

    match pdfs.len() {
        0 => Err(AppError::NotFound("No PDF certificates found".to_string())),
        1 => {
            let certificate = pdfs.remove(0);
            pdf_response(&storage, &certificate).await
        }
        _ => {
            let mut entries = Vec::with_capacity(pdfs.len());
            for certificate in &pdfs {
                entries.push(ArchiveEntry {
                    name: certificate.base_name().to_string(),
                    data: storage.read(&certificate.file).await?,
                });
            }

            let archive = tokio::task::spawn_blocking(move || build_zip(entries))
                .await
                .map_err(|e| AppError::InternalServerError(e.to_string()))??;

            tracing::info!(
                "Bundled {} certificates of response {} ({} bytes)",
                pdfs.len(),
                response_id,
                archive.len()
            );

            Ok(attachment(ZIP_CONTENT_TYPE, &zip_file_name(&response.email_address, response_id), archive))
        }
    }
}

fn parse_response_id(raw: Option<&str>) -> Result<i64, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(AppError::BadRequest("response_id query parameter is required".to_string()))?;

    raw.parse::<i64>()
        .map_err(|_| AppError::BadRequest("response_id must be an integer".to_string()))
}

/// Bundle name for a response: `certificates_<email slug>.zip`.
fn zip_file_name(email: &str, response_id: i64) -> String {
    let slug = slugify(email);
    if slug.is_empty() {
        format!("certificates_{}.zip", response_id)
    } else {
        format!("certificates_{}.zip", slug)
    }
}

async fn pdf_response(
    storage: &CertificateStorage,
    certificate: &Certificate,
) -> Result<Response, AppError> {
    let data = storage.read(&certificate.file).await?;
    Ok(attachment(PDF_CONTENT_TYPE, certificate.base_name(), data))
}

/// Builds a download response with exact length and attachment disposition.
fn attachment(content_type: &'static str, file_name: &str, data: Vec<u8>) -> Response {
    let file_name: String = file_name
        .chars()
        .filter(|c| !matches!(c, '"' | '\\') && !c.is_control())
        .collect();

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, data.len().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        data,
    )
        .into_response()
}
