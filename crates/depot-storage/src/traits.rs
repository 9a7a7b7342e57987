//! Storage abstraction trait
//!
//! Defines the `Storage` trait every backend must implement: chunk
//! persistence, ordered merge, presigned access, and object housekeeping.

use async_trait::async_trait;
use bytes::Bytes;
use depot_core::models::provider::ProviderKind;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Merge failed: {0}")]
    MergeFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for depot_core::AppError {
    fn from(err: StorageError) -> Self {
        use depot_core::AppError;
        match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::UploadFailed(msg)
            | StorageError::DownloadFailed(msg)
            | StorageError::DeleteFailed(msg)
            | StorageError::MergeFailed(msg)
            | StorageError::BackendError(msg) => AppError::Storage(msg),
            StorageError::IoError(err) => AppError::Storage(format!("IO error: {}", err)),
            StorageError::ConfigError(msg) => AppError::Internal(msg),
        }
    }
}

/// Byte stream returned by `download_stream`.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// All storage backends (local filesystem, S3) implement this trait so the
/// session manager can persist chunks and merge them without coupling to a
/// specific backend.
///
/// **Key format:** see the crate root documentation.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist one chunk's bytes at `storage_key` and return the stored key.
    /// Overwriting an existing chunk is allowed (duplicate delivery).
    async fn upload_chunk(&self, storage_key: &str, data: Bytes) -> StorageResult<String>;

    /// Combine the chunk objects, in the given order, into a single object at
    /// `final_key` and return the final key.
    ///
    /// Must publish atomically: on failure nothing is visible at `final_key`,
    /// and a retry after a prior partial failure overwrites cleanly. Chunk
    /// objects are left in place; the caller deletes them after success.
    async fn merge_chunks(&self, chunk_keys: &[String], final_key: &str)
        -> StorageResult<String>;

    /// Download an object fully into memory.
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Download an object as a stream of byte chunks (for large files).
    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream>;

    /// Generate a presigned/temporary URL for direct GET access. Backends
    /// without real signing return a public URL.
    async fn presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check whether an object exists.
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Size in bytes of an object, if it exists.
    async fn content_length(&self, storage_key: &str) -> StorageResult<u64>;

    /// The backend kind this implementation provides.
    fn kind(&self) -> ProviderKind;
}
