use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::models::provider::ProviderKind;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/depot/files")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:3000/files")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys containing path traversal sequences that could escape the
    /// base storage directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.contains("..") || storage_key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        Ok(self.base_path.join(storage_key))
    }

    /// Generate public URL for a stored object
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload_chunk(&self, storage_key: &str, data: Bytes) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage chunk upload successful"
        );

        Ok(storage_key.to_string())
    }

    async fn merge_chunks(
        &self,
        chunk_keys: &[String],
        final_key: &str,
    ) -> StorageResult<String> {
        let final_path = self.key_to_path(final_key)?;
        // Assemble into a sibling temp file, then publish with an atomic
        // rename. A failed merge leaves nothing at the final key, and a retry
        // truncates whatever an earlier attempt left behind.
        let part_path = self.key_to_path(&format!("{}.part", final_key))?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&final_path).await?;

        let result = async {
            let mut part = fs::File::create(&part_path).await.map_err(|e| {
                StorageError::MergeFailed(format!(
                    "Failed to create temp file {}: {}",
                    part_path.display(),
                    e
                ))
            })?;

            for chunk_key in chunk_keys {
                let chunk_path = self.key_to_path(chunk_key)?;

                if !fs::try_exists(&chunk_path).await.unwrap_or(false) {
                    return Err(StorageError::NotFound(chunk_key.clone()));
                }

                let mut chunk = fs::File::open(&chunk_path).await.map_err(|e| {
                    StorageError::MergeFailed(format!(
                        "Failed to open chunk {}: {}",
                        chunk_path.display(),
                        e
                    ))
                })?;

                tokio::io::copy(&mut chunk, &mut part).await.map_err(|e| {
                    StorageError::MergeFailed(format!(
                        "Failed to append chunk {}: {}",
                        chunk_key, e
                    ))
                })?;
            }

            part.sync_all().await.map_err(|e| {
                StorageError::MergeFailed(format!(
                    "Failed to sync temp file {}: {}",
                    part_path.display(),
                    e
                ))
            })?;

            fs::rename(&part_path, &final_path).await.map_err(|e| {
                StorageError::MergeFailed(format!(
                    "Failed to publish {}: {}",
                    final_path.display(),
                    e
                ))
            })?;

            Ok(())
        }
        .await;

        if let Err(e) = result {
            // Best-effort removal of the partial temp file.
            let _ = fs::remove_file(&part_path).await;
            return Err(e);
        }

        tracing::info!(
            key = %final_key,
            parts = chunk_keys.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage merge successful"
        );

        Ok(final_key.to_string())
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        Ok(data)
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let reader = tokio_util::io::ReaderStream::new(file);

        let key = storage_key.to_string();
        let stream = reader.map(move |result| {
            result.map_err(|e| {
                tracing::error!(key = %key, error = %e, "Local storage stream download error");
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    async fn presigned_url(
        &self,
        storage_key: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        // Local storage has no real signing; return the public URL.
        self.key_to_path(storage_key)?;
        Ok(self.generate_url(storage_key))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), key = %storage_key, "Local storage delete successful");

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn content_length(&self, storage_key: &str) -> StorageResult<u64> {
        let path = self.key_to_path(storage_key)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;
        Ok(meta.len())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::tempdir;

    async fn test_storage(dir: &tempfile::TempDir) -> LocalStorage {
        LocalStorage::new(dir.path(), "http://localhost:3000/files".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_chunk_upload_download() {
        let dir = tempdir().unwrap();
        let storage = test_storage(&dir).await;

        let data = Bytes::from_static(b"chunk data");
        let key = storage
            .upload_chunk("t/doc/2026-08/x.bin.chunk.0", data.clone())
            .await
            .unwrap();

        assert_eq!(key, "t/doc/2026-08/x.bin.chunk.0");
        let downloaded = storage.download(&key).await.unwrap();
        assert_eq!(&downloaded[..], &data[..]);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = test_storage(&dir).await;

        let result = storage.download("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_delete_nonexistent_is_ok() {
        let dir = tempdir().unwrap();
        let storage = test_storage(&dir).await;

        assert!(storage.delete("nonexistent/file.txt").await.is_ok());
    }

    #[tokio::test]
    async fn test_merge_concatenates_in_order() {
        let dir = tempdir().unwrap();
        let storage = test_storage(&dir).await;

        let chunks = vec![
            "t/doc/f.bin.chunk.0".to_string(),
            "t/doc/f.bin.chunk.1".to_string(),
            "t/doc/f.bin.chunk.2".to_string(),
        ];
        storage
            .upload_chunk(&chunks[0], Bytes::from_static(b"aaa"))
            .await
            .unwrap();
        storage
            .upload_chunk(&chunks[1], Bytes::from_static(b"bbb"))
            .await
            .unwrap();
        storage
            .upload_chunk(&chunks[2], Bytes::from_static(b"cc"))
            .await
            .unwrap();

        let key = storage.merge_chunks(&chunks, "t/doc/f.bin").await.unwrap();
        assert_eq!(key, "t/doc/f.bin");

        let merged = storage.download("t/doc/f.bin").await.unwrap();
        assert_eq!(&merged[..], b"aaabbbcc");
        assert_eq!(storage.content_length("t/doc/f.bin").await.unwrap(), 8);

        // Chunk artifacts stay in place; the caller deletes them.
        assert!(storage.exists(&chunks[0]).await.unwrap());
    }

    #[tokio::test]
    async fn test_merge_failure_leaves_no_final_object() {
        let dir = tempdir().unwrap();
        let storage = test_storage(&dir).await;

        let chunks = vec![
            "t/doc/g.bin.chunk.0".to_string(),
            "t/doc/g.bin.chunk.1".to_string(),
        ];
        storage
            .upload_chunk(&chunks[0], Bytes::from_static(b"aaa"))
            .await
            .unwrap();
        // chunk 1 deliberately missing

        let result = storage.merge_chunks(&chunks, "t/doc/g.bin").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert!(!storage.exists("t/doc/g.bin").await.unwrap());
        assert!(!storage.exists("t/doc/g.bin.part").await.unwrap());
    }

    #[tokio::test]
    async fn test_merge_is_retriable_after_failure() {
        let dir = tempdir().unwrap();
        let storage = test_storage(&dir).await;

        let chunks = vec![
            "t/doc/h.bin.chunk.0".to_string(),
            "t/doc/h.bin.chunk.1".to_string(),
        ];
        storage
            .upload_chunk(&chunks[0], Bytes::from_static(b"1111"))
            .await
            .unwrap();

        assert!(storage.merge_chunks(&chunks, "t/doc/h.bin").await.is_err());

        storage
            .upload_chunk(&chunks[1], Bytes::from_static(b"22"))
            .await
            .unwrap();

        let key = storage.merge_chunks(&chunks, "t/doc/h.bin").await.unwrap();
        let merged = storage.download(&key).await.unwrap();
        assert_eq!(&merged[..], b"111122");
    }

    #[tokio::test]
    async fn test_download_stream() {
        let dir = tempdir().unwrap();
        let storage = test_storage(&dir).await;

        let data = Bytes::from(vec![7u8; 128 * 1024]);
        storage
            .upload_chunk("t/doc/stream.bin", data.clone())
            .await
            .unwrap();

        let mut stream = storage.download_stream("t/doc/stream.bin").await.unwrap();
        let mut downloaded = Vec::new();
        while let Some(chunk) = stream.next().await {
            downloaded.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(downloaded.len(), data.len());
    }

    #[tokio::test]
    async fn test_presigned_url_is_public_url() {
        let dir = tempdir().unwrap();
        let storage = test_storage(&dir).await;

        let url = storage
            .presigned_url("t/doc/x.bin", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3000/files/t/doc/x.bin");
    }
}
