use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::error::AppError;

/// Path extractor whose rejection uses the error envelope
pub struct AppPath<T>(pub T);

impl<T, S> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::BadRequest(format!(
                "Invalid path parameter: {}",
                rejection.body_text()
            ))),
        }
    }
}

/// A file part received in a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    /// Browsers send an empty part with no filename for an untouched file input
    pub fn is_empty_selection(&self) -> bool {
        self.file_name.trim().is_empty()
    }
}

/// Multipart extractor that buffers the whole form, grouping parts by field name.
///
/// Repeated fields keep their order. A trailing `[]` on a field name is dropped so
/// `descriptions[]` and `descriptions` address the same list.
#[derive(Debug, Default)]
pub struct FormData {
    texts: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl FormData {
    fn normalize(name: &str) -> String {
        name.strip_suffix("[]").unwrap_or(name).to_string()
    }

    pub fn push_text(&mut self, name: &str, value: String) {
        self.texts
            .entry(Self::normalize(name))
            .or_default()
            .push(value);
    }

    pub fn push_file(&mut self, name: &str, file: UploadedFile) {
        self.files
            .entry(Self::normalize(name))
            .or_default()
            .push(file);
    }

    /// First value of a text field
    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of a repeated text field
    pub fn texts(&self, name: &str) -> Vec<String> {
        self.texts.get(name).cloned().unwrap_or_default()
    }

    /// Remove and return the first file sent under `name`, skipping empty selections
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files
            .remove(name)
            .and_then(|files| files.into_iter().next())
            .filter(|f| !f.is_empty_selection())
    }

    /// Remove and return every file part sent under `name`, in order.
    /// Empty selections stay in place as `None` so positions line up with other lists.
    pub fn take_files(&mut self, name: &str) -> Vec<Option<UploadedFile>> {
        self.files
            .remove(name)
            .unwrap_or_default()
            .into_iter()
            .map(|f| (!f.is_empty_selection()).then_some(f))
            .collect()
    }
}

impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state).await.map_err(|e| {
            debug!("Rejected multipart request: {}", e);
            AppError::BadRequest(format!("Expected multipart/form-data: {}", e))
        })?;

        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            debug!("Failed to read multipart field: {}", e);
            AppError::BadRequest(format!("Failed to read multipart data: {}", e))
        })? {
            let field_name = field.name().unwrap_or("").to_string();
            if field_name.is_empty() {
                debug!("Ignoring unnamed multipart field");
                continue;
            }

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await.map_err(|e| {
                        AppError::BadRequest(format!(
                            "Failed to read file data for '{}': {}",
                            field_name, e
                        ))
                    })?;

                    form.push_file(
                        &field_name,
                        UploadedFile {
                            file_name,
                            content_type,
                            data,
                        },
                    );
                }
                None => {
                    let text = field.text().await.map_err(|e| {
                        AppError::BadRequest(format!(
                            "Failed to read field '{}': {}",
                            field_name, e
                        ))
                    })?;
                    form.push_text(&field_name, text);
                }
            }
        }

        Ok(form)
    }
}
