// src/handlers/responses.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool};
use validator::ValidationErrors;

use crate::{
    config::Config,
    error::AppError,
    models::{
        certificate::Certificate,
        response::{ResponseFields, ResponseForm, ResponseListParams, ResponsePage, ResponseRow, ResponseView},
    },
    utils::{
        file_ext::validate_certificates,
        multipart::{FormData, UploadedFile},
        storage::CertificateStorage,
    },
};

const RESPONSE_COLUMNS: &str =
    "id, full_name, email_address, description, gender, programming_stack, date_responded";

/// Lists responses, newest first, with page-number pagination.
///
/// `email_address` filters by case-insensitive substring.
#[utoipa::path(
    get,
    path = "/responses/",
    tag = "responses",
    params(ResponseListParams),
    responses(
        (status = 200, description = "One page of responses", body = ResponsePage),
        (status = 404, description = "Invalid page")
    )
)]
pub async fn list_responses(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Query(params): Query<ResponseListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = parse_page(params.page.as_deref())?;

    let pattern = params
        .email_address
        .filter(|e| !e.is_empty())
        .map(|e| format!("%{}%", escape_like(&e)));

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM responses WHERE ($1::TEXT IS NULL OR email_address ILIKE $1)",
    )
    .bind(&pattern)
    .fetch_one(&pool)
    .await?;

    let window = PageWindow::new(count, page, config.page_size)?;

    let rows = sqlx::query_as::<_, ResponseRow>(&format!(
        r#"
        SELECT {RESPONSE_COLUMNS}
        FROM responses
        WHERE ($1::TEXT IS NULL OR email_address ILIKE $1)
        ORDER BY date_responded DESC, id DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(&pattern)
    .bind(config.page_size)
    .bind(window.offset)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list responses: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut certificates = certificates_by_response(&pool, &ids).await?;

    let question_responses = rows
        .into_iter()
        .map(|row| {
            let certs = certificates.remove(&row.id).unwrap_or_default();
            ResponseView::new(row, certs)
        })
        .collect();

    Ok(Json(ResponsePage {
        count,
        next: window.next,
        previous: window.previous,
        question_responses,
    }))
}

/// Creates a response, with optional PDF certificates, from a multipart form.
#[utoipa::path(
    post,
    path = "/responses/",
    tag = "responses",
    request_body(content = ResponseForm, content_type = "multipart/form-data", description = "Respondent fields plus `certificates` file parts"),
    responses(
        (status = 201, description = "Response created", body = ResponseView),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_response(
    State(pool): State<PgPool>,
    State(storage): State<CertificateStorage>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = FormData::from_multipart(multipart).await?;
    let fields = ResponseFields::from_form(&mut form);
    let files = form.take_files("certificates");

    let new_response = match (fields.into_complete(), validate_certificates(&files)) {
        (Ok(new_response), Ok(())) => new_response,
        (fields_result, certificate_check) => {
            let mut errors = fields_result.err().unwrap_or_default();
            if let Err(e) = certificate_check {
                errors.add("certificates", e);
            }
            return Err(AppError::Validation(errors));
        }
    };

    let stored = store_files(&storage, &files).await?;

    let result: Result<(ResponseRow, Vec<Certificate>), AppError> = async {
        let mut tx = pool.begin().await?;

        let row = sqlx::query_as::<_, ResponseRow>(&format!(
            r#"
            INSERT INTO responses (full_name, email_address, description, gender, programming_stack)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {RESPONSE_COLUMNS}
            "#
        ))
        .bind(&new_response.full_name)
        .bind(&new_response.email_address)
        .bind(&new_response.description)
        .bind(&new_response.gender)
        .bind(&new_response.programming_stack)
        .fetch_one(&mut *tx)
        .await?;

        let certificates = insert_certificates(&mut tx, row.id, &stored).await?;

        tx.commit().await?;
        Ok::<_, AppError>((row, certificates))
    }
    .await;

    let (row, certificates) = match result {
        Ok(created) => created,
        Err(e) => {
            tracing::error!("Failed to create response: {}", e);
            storage.delete_quietly(&stored).await;
            return Err(e);
        }
    };

    tracing::info!(
        "Response {} created with {} certificate(s)",
        row.id,
        certificates.len()
    );

    Ok((StatusCode::CREATED, Json(ResponseView::new(row, certificates))))
}

/// Retrieves a single response by ID.
#[utoipa::path(
    get,
    path = "/responses/{id}/",
    tag = "responses",
    params(("id" = i64, Path, description = "Response id")),
    responses(
        (status = 200, description = "The response", body = ResponseView),
        (status = 404, description = "Unknown response")
    )
)]
pub async fn get_response(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let row = fetch_response(&pool, id)
        .await?
        .ok_or(AppError::NotFound("Response not found".to_string()))?;
    let certificates = fetch_certificates(&pool, id).await?;

    Ok(Json(ResponseView::new(row, certificates)))
}

/// Full update. Every scalar field is required.
///
/// Any `certificates` part replaces all existing certificates.
#[utoipa::path(
    put,
    path = "/responses/{id}/",
    tag = "responses",
    params(("id" = i64, Path, description = "Response id")),
    request_body(content = ResponseForm, content_type = "multipart/form-data", description = "All respondent fields, optional replacement `certificates`"),
    responses(
        (status = 200, description = "Response updated", body = ResponseView),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Unknown response")
    )
)]
pub async fn update_response(
    State(pool): State<PgPool>,
    State(storage): State<CertificateStorage>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    apply_update(&pool, &storage, id, multipart, false).await
}

/// Partial update. Only the fields sent are changed.
///
/// Any `certificates` part replaces all existing certificates.
#[utoipa::path(
    patch,
    path = "/responses/{id}/",
    tag = "responses",
    params(("id" = i64, Path, description = "Response id")),
    request_body(content = ResponseForm, content_type = "multipart/form-data", description = "Any respondent fields, optional replacement `certificates`"),
    responses(
        (status = 200, description = "Response updated", body = ResponseView),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Unknown response")
    )
)]
pub async fn partial_update_response(
    State(pool): State<PgPool>,
    State(storage): State<CertificateStorage>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    apply_update(&pool, &storage, id, multipart, true).await
}

/// Deletes a response together with its certificates and their files.
#[utoipa::path(
    delete,
    path = "/responses/{id}/",
    tag = "responses",
    params(("id" = i64, Path, description = "Response id")),
    responses(
        (status = 204, description = "Response deleted"),
        (status = 404, description = "Unknown response")
    )
)]
pub async fn delete_response(
    State(pool): State<PgPool>,
    State(storage): State<CertificateStorage>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let files: Vec<String> =
        sqlx::query_scalar("SELECT file FROM certificates WHERE response_id = $1")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

    // Certificates go with the response through ON DELETE CASCADE.
    let result = sqlx::query("DELETE FROM responses WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete response: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Response not found".to_string()));
    }

    tx.commit().await?;
    storage.delete_quietly(&files).await;

    tracing::info!("Response {} deleted with {} certificate(s)", id, files.len());

    Ok(StatusCode::NO_CONTENT)
}

async fn apply_update(
    pool: &PgPool,
    storage: &CertificateStorage,
    id: i64,
    multipart: Multipart,
    partial: bool,
) -> Result<(StatusCode, Json<ResponseView>), AppError> {
    let mut form = FormData::from_multipart(multipart).await?;

    fetch_response(pool, id)
        .await?
        .ok_or(AppError::NotFound("Response not found".to_string()))?;

    let fields = ResponseFields::from_form(&mut form);
    let replace_certificates = form.has_file_part("certificates");
    let files = form.take_files("certificates");

    let field_check = if partial {
        fields.check()
    } else {
        fields.clone().into_complete().map(|_| ())
    };
    if let Err(errors) = merge_checks(field_check, &files) {
        return Err(AppError::Validation(errors));
    }

    let stored = store_files(storage, &files).await?;

    let result: Result<(ResponseRow, Vec<String>), AppError> = async {
        let mut tx = pool.begin().await?;

        let row = sqlx::query_as::<_, ResponseRow>(&format!(
            r#"
            UPDATE responses SET
                full_name = COALESCE($2, full_name),
                email_address = COALESCE($3, email_address),
                description = COALESCE($4, description),
                gender = COALESCE($5, gender),
                programming_stack = COALESCE($6, programming_stack)
            WHERE id = $1
            RETURNING {RESPONSE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&fields.full_name)
        .bind(&fields.email_address)
        .bind(&fields.description)
        .bind(&fields.gender)
        .bind(&fields.programming_stack)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Response not found".to_string()))?;

        let mut replaced: Vec<String> = Vec::new();
        if replace_certificates {
            replaced = sqlx::query_scalar(
                "DELETE FROM certificates WHERE response_id = $1 RETURNING file",
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

            insert_certificates(&mut tx, id, &stored).await?;
        }

        tx.commit().await?;
        Ok::<_, AppError>((row, replaced))
    }
    .await;

    let (row, replaced) = match result {
        Ok(updated) => updated,
        Err(e) => {
            tracing::error!("Failed to update response {}: {}", id, e);
            storage.delete_quietly(&stored).await;
            return Err(e);
        }
    };

    if replace_certificates {
        storage.delete_quietly(&replaced).await;
        tracing::info!(
            "Response {} certificates replaced: {} removed, {} added",
            id,
            replaced.len(),
            stored.len()
        );
    }

    let certificates = fetch_certificates(pool, id).await?;
    Ok((StatusCode::OK, Json(ResponseView::new(row, certificates))))
}

fn merge_checks(
    field_check: Result<(), ValidationErrors>,
    files: &[UploadedFile],
) -> Result<(), ValidationErrors> {
    let mut errors = field_check.err().unwrap_or_default();
    if let Err(e) = validate_certificates(files) {
        errors.add("certificates", e);
    }
    if errors.field_errors().is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Writes every file to storage. On failure the files written so far are removed.
pub(crate) async fn store_files(
    storage: &CertificateStorage,
    files: &[UploadedFile],
) -> Result<Vec<String>, AppError> {
    let mut stored = Vec::with_capacity(files.len());
    for file in files {
        match storage.save(&file.file_name, &file.data).await {
            Ok(name) => stored.push(name),
            Err(e) => {
                storage.delete_quietly(&stored).await;
                return Err(e);
            }
        }
    }
    Ok(stored)
}

pub(crate) async fn insert_certificates(
    conn: &mut PgConnection,
    response_id: i64,
    files: &[String],
) -> Result<Vec<Certificate>, sqlx::Error> {
    let mut certificates = Vec::with_capacity(files.len());
    for file in files {
        let certificate = sqlx::query_as::<_, Certificate>(
            r#"
            INSERT INTO certificates (response_id, file)
            VALUES ($1, $2)
            RETURNING id, response_id, file, uploaded_at
            "#,
        )
        .bind(response_id)
        .bind(file)
        .fetch_one(&mut *conn)
        .await?;
        certificates.push(certificate);
    }
    Ok(certificates)
}

pub(crate) async fn fetch_response(pool: &PgPool, id: i64) -> Result<Option<ResponseRow>, AppError> {
    let row = sqlx::query_as::<_, ResponseRow>(&format!(
        "SELECT {RESPONSE_COLUMNS} FROM responses WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub(crate) async fn fetch_certificates(
    pool: &PgPool,
    response_id: i64,
) -> Result<Vec<Certificate>, AppError> {
    let certificates = sqlx::query_as::<_, Certificate>(
        r#"
        SELECT id, response_id, file, uploaded_at
        FROM certificates
        WHERE response_id = $1
        ORDER BY id
        "#,
    )
    .bind(response_id)
    .fetch_all(pool)
    .await?;
    Ok(certificates)
}

async fn certificates_by_response(
    pool: &PgPool,
    response_ids: &[i64],
) -> Result<HashMap<i64, Vec<Certificate>>, AppError> {
    if response_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let certificates = sqlx::query_as::<_, Certificate>(
        r#"
        SELECT id, response_id, file, uploaded_at
        FROM certificates
        WHERE response_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(response_ids)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<i64, Vec<Certificate>> = HashMap::new();
    for certificate in certificates {
        grouped.entry(certificate.response_id).or_default().push(certificate);
    }
    Ok(grouped)
}

/// Parses the `page` query parameter. Absent means page 1.
fn parse_page(raw: Option<&str>) -> Result<i64, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(1),
        Some(value) => value
            .parse::<i64>()
            .ok()
            .filter(|p| *p >= 1)
            .ok_or(AppError::NotFound("Invalid page.".to_string())),
    }
}

/// Escapes LIKE wildcards so user input matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Offset and neighbour pages for one page of results.
#[derive(Debug, PartialEq)]
struct PageWindow {
    offset: i64,
    next: Option<i64>,
    previous: Option<i64>,
}

impl PageWindow {
    fn new(count: i64, page: i64, page_size: i64) -> Result<Self, AppError> {
        let last_page = ((count + page_size - 1) / page_size).max(1);
        if page > last_page {
            return Err(AppError::NotFound("Invalid page.".to_string()));
        }

        Ok(PageWindow {
            offset: (page - 1) * page_size,
            next: (page < last_page).then_some(page + 1),
            previous: (page > 1).then_some(page - 1),
        })
    }
}
