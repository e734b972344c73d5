// src/handlers/questions.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::question::{
        FilePropertyRow, Question, QuestionList, QuestionOptionRow, QuestionRow, QuestionView,
    },
};

/// Lists every question with its options and file properties attached.
#[utoipa::path(
    get,
    path = "/questions/",
    tag = "questions",
    responses((status = 200, description = "All survey questions", body = QuestionList))
)]
pub async fn list_questions(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let questions = load_questions(&pool, None).await?;

    Ok(Json(QuestionList {
        questions: questions.into_iter().map(QuestionView::from).collect(),
    }))
}

/// Retrieves a single question by ID.
#[utoipa::path(
    get,
    path = "/questions/{id}/",
    tag = "questions",
    params(("id" = i64, Path, description = "Question id")),
    responses(
        (status = 200, description = "The question", body = QuestionView),
        (status = 404, description = "Unknown question")
    )
)]
pub async fn get_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = load_questions(&pool, Some(id))
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(QuestionView::from(question)))
}

/// Loads questions (all, or one by id) and eagerly attaches their children.
async fn load_questions(pool: &PgPool, id: Option<i64>) -> Result<Vec<Question>, AppError> {
    let rows = sqlx::query_as::<_, QuestionRow>(
        r#"
        SELECT id, name, type, required, text, description, multiple
        FROM questions
        WHERE ($1::BIGINT IS NULL OR id = $1)
        ORDER BY id
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

    let options = sqlx::query_as::<_, QuestionOptionRow>(
        r#"
        SELECT question_id, value, text
        FROM question_options
        WHERE question_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let file_properties = sqlx::query_as::<_, FilePropertyRow>(
        r#"
        SELECT question_id, format, max_file_size, max_file_size_unit, multiple
        FROM question_file_properties
        WHERE question_id = ANY($1)
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut options_by_question: HashMap<i64, Vec<QuestionOptionRow>> = HashMap::new();
    for option in options {
        options_by_question.entry(option.question_id).or_default().push(option);
    }

    let mut props_by_question: HashMap<i64, FilePropertyRow> = file_properties
        .into_iter()
        .map(|p| (p.question_id, p))
        .collect();

    rows.into_iter()
        .map(|row| {
            let id = row.id;
            Question::from_rows(
                row,
                options_by_question.remove(&id).unwrap_or_default(),
                props_by_question.remove(&id),
            )
            .map_err(|e| {
                tracing::error!("Inconsistent question data: {}", e);
                AppError::InternalServerError(e)
            })
        })
        .collect()
}
