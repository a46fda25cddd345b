// HTTP routes
pub mod auth;
pub mod categories;
pub mod claims;
pub mod health;
pub mod matches;
pub mod reports;
pub mod users;

pub use health::health_handler;

use axum::extract::multipart::Field;
use bytes::Bytes;

use crate::common::ApiError;
use crate::kernel::media::{MediaCategory, MediaStore};

/// A file part read out of a multipart request.
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Read a file field, enforcing that it is an image.
pub async fn read_upload(field: Field<'_>) -> Result<Upload, ApiError> {
    let filename = field
        .file_name()
        .unwrap_or("upload")
        .to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    if !content_type.starts_with("image/") {
        return Err(ApiError::Validation(format!(
            "unsupported attachment type '{}', only images are accepted",
            content_type
        )));
    }

    let bytes = field
        .bytes()
        .await
        .map_err(|e| ApiError::Validation(format!("failed to read upload: {}", e)))?;

    Ok(Upload {
        filename,
        content_type,
        bytes,
    })
}

/// Push uploads to the media store, collecting stable URL references.
pub async fn store_uploads(
    media: &dyn MediaStore,
    uploads: Vec<Upload>,
    category: MediaCategory,
) -> Result<Vec<String>, ApiError> {
    let mut urls = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let url = media
            .store(&upload.filename, &upload.content_type, upload.bytes, category)
            .await?;
        urls.push(url);
    }
    Ok(urls)
}

/// Read a text field, mapping malformed input to a validation error.
pub async fn read_text(field: Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid form field: {}", e)))
}
