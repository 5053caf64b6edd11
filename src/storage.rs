//! Object storage collaborator: fetch an original by key.
//!
//! The engine never talks to storage. The HTTP layer fetches through an
//! [`ObjectSource`] and hands the bytes over; the declared content type is
//! carried along for logging only, since the engine sniffs the real format.
//!
//! [`ObjectStoreSource`] wraps any `object_store` backend:
//!
//! | `storage.backend` | Store |
//! |---|---|
//! | `local` | `LocalFileSystem` rooted at `storage.root` |
//! | `s3` | `AmazonS3` (AWS, R2, MinIO via `storage.endpoint`) |
//! | `memory` | `InMemory` |
//!
//! Size is checked twice: against the object's metadata before the body is
//! read, and against the body actually received.

use crate::config::{StorageBackend, StorageConfig};
use crate::error::TransformError;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{Attribute, ObjectStore, ObjectStoreExt};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },
    #[error("object too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },
    #[error("storage error: {0}")]
    Backend(#[from] object_store::Error),
    #[error("storage configuration error: {0}")]
    Config(String),
}

impl From<StorageError> for TransformError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => TransformError::NotFound,
            StorageError::TooLarge { size, max } => TransformError::PayloadTooLarge { size, max },
            other => TransformError::Internal(other.to_string()),
        }
    }
}

/// An original as fetched from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedObject {
    pub bytes: Bytes,
    /// Content type recorded by the store, if any. Not trusted.
    pub declared_type: Option<String>,
}

/// Fetch-by-key, the only storage operation the service needs.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<FetchedObject, StorageError>;
}

/// [`ObjectSource`] over an `object_store` backend.
#[derive(Clone)]
pub struct ObjectStoreSource {
    store: Arc<dyn ObjectStore>,
    max_input_bytes: u64,
}

impl ObjectStoreSource {
    pub fn new(store: Arc<dyn ObjectStore>, max_input_bytes: u64) -> Self {
        Self {
            store,
            max_input_bytes,
        }
    }

    /// Build the store named by `config.backend`.
    pub fn from_config(config: &StorageConfig, max_input_bytes: u64) -> Result<Self, StorageError> {
        let store: Arc<dyn ObjectStore> = match config.backend {
            StorageBackend::Local => {
                let local = LocalFileSystem::new_with_prefix(&config.root).map_err(|e| {
                    StorageError::Config(format!(
                        "storage.root {}: {e}",
                        config.root.display()
                    ))
                })?;
                Arc::new(local)
            }
            StorageBackend::S3 => {
                let bucket = config.bucket.as_deref().ok_or_else(|| {
                    StorageError::Config("storage.bucket is required for s3".into())
                })?;
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
                if let Some(region) = &config.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &config.endpoint {
                    builder = builder
                        .with_endpoint(endpoint)
                        .with_allow_http(endpoint.starts_with("http://"));
                }
                let s3 = builder
                    .build()
                    .map_err(|e| StorageError::Config(e.to_string()))?;
                Arc::new(s3)
            }
            StorageBackend::Memory => Arc::new(InMemory::new()),
        };
        Ok(Self::new(store, max_input_bytes))
    }

    /// The underlying store, for seeding in tests and tools.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    fn check_size(&self, size: u64) -> Result<(), StorageError> {
        if size > self.max_input_bytes {
            return Err(StorageError::TooLarge {
                size,
                max: self.max_input_bytes,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectSource for ObjectStoreSource {
    async fn fetch(&self, key: &str) -> Result<FetchedObject, StorageError> {
        let start = Instant::now();
        let location = Path::from(key);

        let result = self.store.get(&location).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound {
                key: key.to_string(),
            },
            other => StorageError::Backend(other),
        })?;

        self.check_size(u64::try_from(result.meta.size).unwrap_or(u64::MAX))?;

        let declared_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|v| v.as_ref().to_string());
        let bytes = result.bytes().await?;
        self.check_size(bytes.len() as u64)?;

        tracing::debug!(
            key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "fetched original"
        );

        Ok(FetchedObject {
            bytes,
            declared_type,
        })
    }
}
