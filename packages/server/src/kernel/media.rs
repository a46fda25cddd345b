//! Media ingest boundary.
//!
//! Attachments (report photos, claim proof photos, identity documents) are
//! passed through to an object store and referenced by stable URL. The store
//! is a fallible external collaborator: uploads are bounded by a timeout and
//! failures surface to the caller, never retried here.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use crate::common::ApiError;

/// Bucket prefix for an upload: which kind of attachment this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Report,
    Claim,
    Identity,
}

impl MediaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Report => "reports",
            MediaCategory::Claim => "claims",
            MediaCategory::Identity => "identity",
        }
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("upload timed out")]
    Timeout,
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        ApiError::Dependency(format!("media store: {}", e))
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store a binary attachment and return a stable URL reference.
    async fn store(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Bytes,
        category: MediaCategory,
    ) -> Result<String, MediaError>;
}

/// Object store client speaking plain HTTP PUT, e.g. an S3/GCS signing proxy.
pub struct HttpMediaStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpMediaStore {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl MediaStore for HttpMediaStore {
    async fn store(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Bytes,
        category: MediaCategory,
    ) -> Result<String, MediaError> {
        // Random object key so repeated uploads of the same filename never collide.
        let object_key = format!(
            "{}/{}-{}",
            category.as_str(),
            Uuid::new_v4().simple(),
            filename
        );
        let url = format!("{}/{}", self.base_url, object_key);

        let mut request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MediaError::Timeout
            } else {
                MediaError::UploadFailed(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(MediaError::UploadFailed(format!(
                "object store returned {}",
                response.status()
            )));
        }

        Ok(url)
    }
}

/// In-memory media store for tests: records uploads, returns `mem://` URLs.
#[derive(Default)]
pub struct InMemoryMediaStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn store(
        &self,
        filename: &str,
        _content_type: &str,
        bytes: Bytes,
        category: MediaCategory,
    ) -> Result<String, MediaError> {
        let url = format!(
            "mem://{}/{}-{}",
            category.as_str(),
            Uuid::new_v4().simple(),
            filename
        );
        self.objects
            .lock()
            .unwrap()
            .insert(url.clone(), bytes.to_vec());
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_returns_stable_urls() {
        let store = InMemoryMediaStore::new();
        let url = store
            .store(
                "photo.jpg",
                "image/jpeg",
                Bytes::from_static(b"fake-jpeg"),
                MediaCategory::Report,
            )
            .await
            .unwrap();

        assert!(url.starts_with("mem://reports/"));
        assert!(url.ends_with("photo.jpg"));
        assert_eq!(store.stored_count(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_store_unique_keys_per_upload() {
        let store = InMemoryMediaStore::new();
        let a = store
            .store("x.png", "image/png", Bytes::new(), MediaCategory::Claim)
            .await
            .unwrap();
        let b = store
            .store("x.png", "image/png", Bytes::new(), MediaCategory::Claim)
            .await
            .unwrap();
        assert_ne!(a, b);
    }
}
