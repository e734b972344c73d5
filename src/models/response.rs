// src/models/response.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationErrors};

use crate::{
    error::field_error,
    models::certificate::{Certificate, CertificateView},
    utils::multipart::FormData,
};

/// Represents the 'responses' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct ResponseRow {
    pub id: i64,
    pub full_name: String,
    pub email_address: String,
    pub description: String,
    pub gender: String,
    pub programming_stack: String,
    pub date_responded: DateTime<Utc>,
}

/// DTO for sending a survey response to the client.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResponseView {
    pub id: i64,
    pub full_name: String,
    pub email_address: String,
    pub description: String,
    pub gender: String,
    pub programming_stack: String,
    pub certificates: Vec<CertificateView>,
    pub date_responded: DateTime<Utc>,
}

impl ResponseView {
    pub fn new(row: ResponseRow, certificates: Vec<Certificate>) -> Self {
        ResponseView {
            id: row.id,
            full_name: row.full_name,
            email_address: row.email_address,
            description: row.description,
            gender: row.gender,
            programming_stack: row.programming_stack,
            certificates: certificates.into_iter().map(CertificateView::from).collect(),
            date_responded: row.date_responded,
        }
    }
}

/// One page of `GET /responses/`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResponsePage {
    /// Total number of matching responses.
    pub count: i64,
    /// Next page number, if any.
    pub next: Option<i64>,
    /// Previous page number, if any.
    pub previous: Option<i64>,
    pub question_responses: Vec<ResponseView>,
}

/// Multipart body of the create and update endpoints, for the API docs only.
/// The handlers read the form with axum's `Multipart` extractor.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct ResponseForm {
    pub full_name: String,
    pub email_address: String,
    pub description: String,
    pub gender: String,
    pub programming_stack: String,
    /// PDF files, each sent as a `certificates` file part.
    pub certificates: Option<Vec<String>>,
}

/// Query parameters for listing responses.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ResponseListParams {
    /// Case-insensitive substring of the respondent's email.
    pub email_address: Option<String>,
    /// 1-based page number.
    pub page: Option<String>,
}

/// Scalar response fields as received from a form.
///
/// Every field is optional so the same type serves full and partial
/// updates. `into_complete` enforces presence for create and PUT.
#[derive(Debug, Default, Clone, Validate)]
pub struct ResponseFields {
    #[validate(length(min = 1, max = 255, message = "Ensure this field is not blank and has at most 255 characters."))]
    pub full_name: Option<String>,

    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Ensure this field has at most 254 characters.")
    )]
    pub email_address: Option<String>,

    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 10, message = "Ensure this field is not blank and has at most 10 characters."))]
    pub gender: Option<String>,

    #[validate(length(min = 1, max = 255, message = "Ensure this field is not blank and has at most 255 characters."))]
    pub programming_stack: Option<String>,
}

/// A fully validated set of response fields.
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub full_name: String,
    pub email_address: String,
    pub description: String,
    pub gender: String,
    pub programming_stack: String,
}

impl ResponseFields {
    /// Pulls the scalar fields out of a parsed form. Values are trimmed.
    pub fn from_form(form: &mut FormData) -> Self {
        let mut take = |name: &str| form.take_text(name).map(|v| v.trim().to_string());
        ResponseFields {
            full_name: take("full_name"),
            email_address: take("email_address"),
            description: take("description"),
            gender: take("gender"),
            programming_stack: take("programming_stack"),
        }
    }

    fn named(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("full_name", self.full_name.as_deref()),
            ("email_address", self.email_address.as_deref()),
            ("description", self.description.as_deref()),
            ("gender", self.gender.as_deref()),
            ("programming_stack", self.programming_stack.as_deref()),
        ]
    }

    /// Validates the fields that are present. A blank value is reported as
    /// `required` rather than as a length error.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = self.validate().err().unwrap_or_default();

        for (field, value) in self.named() {
            if value.is_some_and(str::is_empty) {
                errors.errors_mut().remove(field);
                errors.add(field, field_error("required", "This field may not be blank."));
            }
        }

        if errors.field_errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validates the fields that are present and requires all of them.
    pub fn into_complete(self) -> Result<NewResponse, ValidationErrors> {
        let mut errors = self.check().err().unwrap_or_default();

        for (field, value) in self.named() {
            if value.is_none() {
                errors.add(field, field_error("required", "This field is required."));
            }
        }

        match self {
            ResponseFields {
                full_name: Some(full_name),
                email_address: Some(email_address),
                description: Some(description),
                gender: Some(gender),
                programming_stack: Some(programming_stack),
            } if errors.field_errors().is_empty() => Ok(NewResponse {
                full_name,
                email_address,
                description,
                gender,
                programming_stack,
            }),
            _ => Err(errors),
        }
    }
}
