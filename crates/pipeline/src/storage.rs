//! Object storage abstraction.
//!
//! The pipeline archives vendor-hosted media by fetching it over HTTP and
//! re-uploading it to durable storage, and deletes objects during cleanup.
//! [`S3Storage`] is the production implementation; [`MemoryStorage`] backs
//! tests and credential-free local development.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use songforge_core::config::StorageConfig;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Transfer exceeded {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Transfer timed out after {0:?}")]
    Timeout(Duration),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Metadata returned after a successful upload.
#[derive(Debug, Clone)]
pub struct UploadInfo {
    pub key: String,
    pub size: usize,
}

/// Result of a batch delete. Individual failures do not abort the batch.
#[derive(Debug, Clone, Default)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    /// `(key, error)` pairs for objects that could not be deleted.
    pub errors: Vec<(String, String)>,
}

/// Durable object storage as the pipeline consumes it.
///
/// Deletes are idempotent: removing a missing object is success.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Fetch `source_url` and store the body under `key`.
    ///
    /// The whole transfer is bounded by `timeout` and `max_bytes`.
    async fn upload_from_url(
        &self,
        source_url: &str,
        key: &str,
        content_type: &str,
        timeout: Duration,
        max_bytes: usize,
    ) -> Result<UploadInfo, StorageError>;

    /// Delete a single object.
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;

    /// Delete many objects, collecting per-key failures instead of
    /// aborting.
    async fn delete_objects(&self, keys: &[String]) -> DeleteOutcome;
}

// ---------------------------------------------------------------------------
// S3 implementation
// ---------------------------------------------------------------------------

/// S3-compatible storage client.
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    http: reqwest::Client,
}

impl S3Storage {
    /// Build a client for the configured endpoint and bucket.
    ///
    /// Credentials come from the standard AWS environment/provider chain.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .build();
        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Fetch a remote resource, enforcing the size limit both up front
    /// (Content-Length) and after the body has been read.
    async fn fetch(&self, source_url: &str, max_bytes: usize) -> Result<Vec<u8>, StorageError> {
        let response = self.http.get(source_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::DownloadFailed(format!(
                "HTTP {} fetching {source_url}",
                status.as_u16()
            )));
        }
        if let Some(length) = response.content_length() {
            if length as usize > max_bytes {
                return Err(StorageError::TooLarge { limit: max_bytes });
            }
        }
        let body = response.bytes().await?;
        if body.len() > max_bytes {
            return Err(StorageError::TooLarge { limit: max_bytes });
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload_from_url(
        &self,
        source_url: &str,
        key: &str,
        content_type: &str,
        timeout: Duration,
        max_bytes: usize,
    ) -> Result<UploadInfo, StorageError> {
        let body = tokio::time::timeout(timeout, self.fetch(source_url, max_bytes))
            .await
            .map_err(|_| StorageError::Timeout(timeout))??;
        let size = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        tracing::info!(key, size, "Uploaded to storage");
        Ok(UploadInfo {
            key: key.to_string(),
            size,
        })
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        // S3 DeleteObject succeeds for missing keys, which is exactly the
        // idempotency the cleanup sweep relies on.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        for key in keys {
            match self.delete_object(key).await {
                Ok(()) => outcome.deleted.push(key.clone()),
                Err(e) => outcome.errors.push((key.clone(), e.to_string())),
            }
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// In-memory storage for tests and local development.
///
/// Failure injection: transfers from a source URL registered with
/// [`MemoryStorage::fail_source`] fail, as do deletes of keys registered
/// with [`MemoryStorage::fail_delete`].
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, usize>>,
    fail_sources: HashSet<String>,
    fail_deletes: HashSet<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make transfers from `source_url` fail.
    pub fn fail_source(mut self, source_url: impl Into<String>) -> Self {
        self.fail_sources.insert(source_url.into());
        self
    }

    /// Make deletes of `key` fail.
    pub fn fail_delete(mut self, key: impl Into<String>) -> Self {
        self.fail_deletes.insert(key.into());
        self
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.lock().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload_from_url(
        &self,
        source_url: &str,
        key: &str,
        _content_type: &str,
        _timeout: Duration,
        _max_bytes: usize,
    ) -> Result<UploadInfo, StorageError> {
        if self.fail_sources.contains(source_url) {
            return Err(StorageError::DownloadFailed(format!(
                "injected failure for {source_url}"
            )));
        }
        let size = 1024;
        self.objects.lock().await.insert(key.to_string(), size);
        Ok(UploadInfo {
            key: key.to_string(),
            size,
        })
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_deletes.contains(key) {
            return Err(StorageError::DeleteFailed(format!(
                "injected failure for {key}"
            )));
        }
        // Missing keys delete successfully.
        self.objects.lock().await.remove(key);
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        for key in keys {
            match self.delete_object(key).await {
                Ok(()) => outcome.deleted.push(key.clone()),
                Err(e) => outcome.errors.push((key.clone(), e.to_string())),
            }
        }
        outcome
    }
}
