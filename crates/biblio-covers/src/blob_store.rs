//! Blob storage for resized cover images. One capability trait, multiple
//! concrete implementations each with their own config and constructor,
//! selected by the same "swap the backend behind one trait" shape used
//! throughout this workspace for pluggable external sinks.

use async_trait::async_trait;
use biblio_common::EnrichmentError;
use bytes::Bytes;
use std::path::PathBuf;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), EnrichmentError>;
    async fn exists(&self, key: &str) -> Result<bool, EnrichmentError>;
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: Option<String>,
}

pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3BlobStore {
    pub async fn connect(config: S3Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = config.region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let shared_config = loader.load().await;
        Self {
            client: aws_sdk_s3::Client::new(&shared_config),
            bucket: config.bucket,
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), EnrichmentError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(bytes.into())
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| EnrichmentError::Storage(format!("s3 put failed: {err}")))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, EnrichmentError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(aws_sdk_s3::error::SdkError::ServiceError(service_err)) if service_err.err().is_not_found() => Ok(false),
            Err(err) => Err(EnrichmentError::Storage(format!("s3 head failed: {err}"))),
        }
    }
}

/// Filesystem-backed implementation for local development and tests.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, key: &str, bytes: Bytes, _content_type: &str) -> Result<(), EnrichmentError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| EnrichmentError::Internal(format!("creating blob directory: {err}")))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|err| EnrichmentError::Internal(format!("writing blob: {err}")))
    }

    async fn exists(&self, key: &str) -> Result<bool, EnrichmentError> {
        Ok(tokio::fs::try_exists(self.path_for(key))
            .await
            .map_err(|err| EnrichmentError::Internal(format!("checking blob existence: {err}")))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn filesystem_store_round_trips() {
        let dir = std::env::temp_dir().join(format!("biblio-covers-test-{}", std::process::id()));
        let store = FilesystemBlobStore::new(&dir);

        assert!(!store.exists("isbn/123/large.webp").await.unwrap());
        store
            .put("isbn/123/large.webp", Bytes::from_static(b"fake-webp-bytes"), "image/webp")
            .await
            .unwrap();
        assert!(store.exists("isbn/123/large.webp").await.unwrap());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
