// src/models/question.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// The kinds of input a question asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    ShortText,
    LongText,
    Email,
    Choice,
    File,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::ShortText => "short_text",
            QuestionType::LongText => "long_text",
            QuestionType::Email => "email",
            QuestionType::Choice => "choice",
            QuestionType::File => "file",
        }
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short_text" => Ok(QuestionType::ShortText),
            "long_text" => Ok(QuestionType::LongText),
            "email" => Ok(QuestionType::Email),
            "choice" => Ok(QuestionType::Choice),
            "file" => Ok(QuestionType::File),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File formats a file question can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum FileFormat {
    #[serde(rename = ".pdf")]
    Pdf,
    #[serde(rename = ".doc")]
    Doc,
    #[serde(rename = ".docx")]
    Docx,
    #[serde(rename = ".jpg")]
    Jpg,
    #[serde(rename = ".png")]
    Png,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Pdf => ".pdf",
            FileFormat::Doc => ".doc",
            FileFormat::Docx => ".docx",
            FileFormat::Jpg => ".jpg",
            FileFormat::Png => ".png",
        }
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ".pdf" => Ok(FileFormat::Pdf),
            ".doc" => Ok(FileFormat::Doc),
            ".docx" => Ok(FileFormat::Docx),
            ".jpg" => Ok(FileFormat::Jpg),
            ".png" => Ok(FileFormat::Png),
            other => Err(format!("unknown file format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    Kb,
    Mb,
    Gb,
}

impl SizeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeUnit::Kb => "kb",
            SizeUnit::Mb => "mb",
            SizeUnit::Gb => "gb",
        }
    }

    pub fn bytes(&self) -> u64 {
        match self {
            SizeUnit::Kb => 1024,
            SizeUnit::Mb => 1024 * 1024,
            SizeUnit::Gb => 1024 * 1024 * 1024,
        }
    }
}

impl FromStr for SizeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kb" => Ok(SizeUnit::Kb),
            "mb" => Ok(SizeUnit::Mb),
            "gb" => Ok(SizeUnit::Gb),
            other => Err(format!("unknown size unit '{}'", other)),
        }
    }
}

/// A selectable answer of a choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuestionOption {
    pub value: String,
    pub text: String,
}

/// Upload constraints of a file question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FileProperties {
    pub format: FileFormat,
    pub max_file_size: i32,
    pub max_file_size_unit: SizeUnit,
    #[serde(default)]
    pub multiple: bool,
}

impl FileProperties {
    pub fn max_file_size_bytes(&self) -> u64 {
        u64::try_from(self.max_file_size).unwrap_or(0) * self.max_file_size_unit.bytes()
    }
}

/// What a question asks for, together with the data only that kind carries.
///
/// Options exist only on `Choice` and file properties only on `File`, so a
/// file question without properties cannot be represented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    ShortText,
    LongText,
    Email,
    Choice {
        #[serde(default)]
        options: Vec<QuestionOption>,
    },
    File {
        file_properties: FileProperties,
    },
}

impl QuestionKind {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionKind::ShortText => QuestionType::ShortText,
            QuestionKind::LongText => QuestionType::LongText,
            QuestionKind::Email => QuestionType::Email,
            QuestionKind::Choice { .. } => QuestionType::Choice,
            QuestionKind::File { .. } => QuestionType::File,
        }
    }

    pub fn options(&self) -> &[QuestionOption] {
        match self {
            QuestionKind::Choice { options } => options,
            _ => &[],
        }
    }

    pub fn file_properties(&self) -> Option<&FileProperties> {
        match self {
            QuestionKind::File { file_properties } => Some(file_properties),
            _ => None,
        }
    }
}

/// A survey question with everything attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: i64,
    pub name: String,
    pub required: bool,
    pub text: String,
    pub description: Option<String>,
    pub multiple: bool,
    pub kind: QuestionKind,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub name: String,

    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type")]
    pub question_type: String,

    pub required: bool,
    pub text: String,
    pub description: Option<String>,
    pub multiple: bool,
}

/// Represents the 'question_options' table.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionOptionRow {
    pub question_id: i64,
    pub value: String,
    pub text: String,
}

/// Represents the 'question_file_properties' table.
#[derive(Debug, Clone, FromRow)]
pub struct FilePropertyRow {
    pub question_id: i64,
    pub format: String,
    pub max_file_size: i32,
    pub max_file_size_unit: String,
    pub multiple: bool,
}

impl Question {
    /// Assembles a question from its table rows.
    ///
    /// Fails when the rows disagree with the question's type: a file question
    /// without properties, properties on a non-file question, or options on a
    /// non-choice question.
    pub fn from_rows(
        row: QuestionRow,
        options: Vec<QuestionOptionRow>,
        file_properties: Option<FilePropertyRow>,
    ) -> Result<Self, String> {
        let question_type: QuestionType = row.question_type.parse()?;

        if question_type != QuestionType::Choice && !options.is_empty() {
            return Err(format!(
                "question '{}' of type {} has {} options",
                row.name,
                question_type,
                options.len()
            ));
        }

        let kind = match (question_type, file_properties) {
            (QuestionType::File, Some(props)) => QuestionKind::File {
                file_properties: FileProperties {
                    format: props.format.parse()?,
                    max_file_size: props.max_file_size,
                    max_file_size_unit: props.max_file_size_unit.parse()?,
                    multiple: props.multiple,
                },
            },
            (QuestionType::File, None) => {
                return Err(format!("file question '{}' has no file properties", row.name));
            }
            (other, Some(_)) => {
                return Err(format!(
                    "question '{}' of type {} has file properties",
                    row.name, other
                ));
            }
            (QuestionType::ShortText, None) => QuestionKind::ShortText,
            (QuestionType::LongText, None) => QuestionKind::LongText,
            (QuestionType::Email, None) => QuestionKind::Email,
            (QuestionType::Choice, None) => QuestionKind::Choice {
                options: options
                    .into_iter()
                    .map(|o| QuestionOption {
                        value: o.value,
                        text: o.text,
                    })
                    .collect(),
            },
        };

        Ok(Question {
            id: row.id,
            name: row.name,
            required: row.required,
            text: row.text,
            description: row.description,
            multiple: row.multiple,
            kind,
        })
    }
}

/// DTO for sending a question to the client.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionView {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub required: bool,
    pub text: String,
    pub description: Option<String>,
    pub multiple: bool,
    pub options: Vec<QuestionOption>,
    pub file_properties: Option<FileProperties>,
}

impl From<Question> for QuestionView {
    fn from(q: Question) -> Self {
        QuestionView {
            id: q.id,
            name: q.name,
            question_type: q.kind.question_type(),
            required: q.required,
            text: q.text,
            description: q.description,
            multiple: q.multiple,
            options: q.kind.options().to_vec(),
            file_properties: q.kind.file_properties().cloned(),
        }
    }
}

/// Wrapper for `GET /questions/`.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionList {
    pub questions: Vec<QuestionView>,
}

/// Question definition read from the seed file.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewQuestion {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[validate(length(min = 1))]
    pub text: String,
    pub description: Option<String>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(flatten)]
    #[validate(custom(function = validate_kind))]
    pub kind: QuestionKind,
}

fn default_required() -> bool {
    true
}

fn validate_kind(kind: &QuestionKind) -> Result<(), validator::ValidationError> {
    for opt in kind.options() {
        let value_len = opt.value.chars().count();
        let text_len = opt.text.chars().count();
        if !(1..=255).contains(&value_len) || !(1..=255).contains(&text_len) {
            return Err(validator::ValidationError::new("invalid_option"));
        }
    }
    if let Some(props) = kind.file_properties() {
        if props.max_file_size <= 0 {
            return Err(validator::ValidationError::new("invalid_max_file_size"));
        }
    }
    Ok(())
}
