// src/seed.rs

use std::path::Path;

use sqlx::PgPool;
use validator::Validate;

use crate::{error::AppError, models::question::NewQuestion};

/// Loads questions from a JSON array and inserts the ones whose `name` is not
/// taken yet. Returns the number of inserted questions.
///
/// All inserts share one transaction, so a bad entry leaves the table untouched.
pub async fn seed_questions(pool: &PgPool, path: &Path) -> Result<usize, AppError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let questions = parse_questions(&raw)?;

    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for question in &questions {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO questions (name, type, required, text, description, multiple)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&question.name)
        .bind(question.kind.question_type().as_str())
        .bind(question.required)
        .bind(&question.text)
        .bind(&question.description)
        .bind(question.multiple)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = id else {
            tracing::debug!("Question '{}' already exists, skipping", question.name);
            continue;
        };

        for option in question.kind.options() {
            sqlx::query("INSERT INTO question_options (question_id, value, text) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(&option.value)
                .bind(&option.text)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(props) = question.kind.file_properties() {
            sqlx::query(
                r#"
                INSERT INTO question_file_properties
                    (question_id, format, max_file_size, max_file_size_unit, multiple)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(id)
            .bind(props.format.as_str())
            .bind(props.max_file_size)
            .bind(props.max_file_size_unit.as_str())
            .bind(props.multiple)
            .execute(&mut *tx)
            .await?;
        }

        inserted += 1;
    }

    tx.commit().await?;

    Ok(inserted)
}

fn parse_questions(raw: &str) -> Result<Vec<NewQuestion>, AppError> {
    let questions: Vec<NewQuestion> = serde_json::from_str(raw)
        .map_err(|e| AppError::BadRequest(format!("Invalid question seed file: {}", e)))?;

    for question in &questions {
        question.validate()?;
    }

    Ok(questions)
}
