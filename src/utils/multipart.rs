// src/utils/multipart.rs

use std::collections::{HashMap, HashSet};

use axum::{body::Bytes, extract::Multipart};
use tracing::debug;

use crate::error::AppError;

/// A file part received in a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Fully buffered multipart form.
///
/// Text parts keep the last value sent for a name. File parts are collected
/// per name in arrival order. A file part with an empty filename and an
/// empty body (an untouched browser file input) only marks its name as
/// present. Text parts never mark a name as a file payload.
#[derive(Debug, Default)]
pub struct FormData {
    texts: HashMap<String, String>,
    files: HashMap<String, Vec<UploadedFile>>,
    file_parts: HashSet<String>,
}

impl FormData {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            if name.is_empty() {
                debug!("Ignoring unnamed multipart field");
                continue;
            }

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await?;

                    if file_name.is_empty() && data.is_empty() {
                        debug!("Empty file input for field {}", name);
                    } else {
                        form.files.entry(name.clone()).or_default().push(UploadedFile {
                            file_name,
                            content_type,
                            data,
                        });
                    }
                    form.file_parts.insert(name);
                }
                None => {
                    let value = field.text().await?;
                    form.texts.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Removes and returns a text part.
    pub fn take_text(&mut self, name: &str) -> Option<String> {
        self.texts.remove(name)
    }

    /// Removes and returns every file sent under `name`.
    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        self.files.remove(name).unwrap_or_default()
    }

    /// True when at least one file part, possibly an empty file input, was
    /// sent under `name`.
    pub fn has_file_part(&self, name: &str) -> bool {
        self.file_parts.contains(name)
    }
}
