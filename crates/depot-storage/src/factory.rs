//! Backend construction from provider descriptors.

#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageError, StorageResult};
use depot_core::models::provider::{ProviderKind, StorageProviderDescriptor};
#[cfg(feature = "storage-local")]
use depot_core::models::provider::LocalProviderConfig;
#[cfg(feature = "storage-s3")]
use depot_core::models::provider::S3ProviderConfig;
use std::sync::Arc;

/// Create a storage backend from a provider descriptor.
pub async fn create_storage(
    descriptor: &StorageProviderDescriptor,
) -> StorageResult<Arc<dyn Storage>> {
    match descriptor.kind {
        #[cfg(feature = "storage-local")]
        ProviderKind::Local => {
            let config: LocalProviderConfig = serde_json::from_value(descriptor.config.clone())
                .map_err(|e| {
                    StorageError::ConfigError(format!(
                        "Invalid local provider config for {}: {}",
                        descriptor.name, e
                    ))
                })?;

            let storage = LocalStorage::new(config.base_path, config.base_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        ProviderKind::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-s3")]
        ProviderKind::S3 => {
            let config: S3ProviderConfig = serde_json::from_value(descriptor.config.clone())
                .map_err(|e| {
                    StorageError::ConfigError(format!(
                        "Invalid s3 provider config for {}: {}",
                        descriptor.name, e
                    ))
                })?;

            let storage = S3Storage::new(config.bucket, config.region, config.endpoint_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        ProviderKind::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_create_local_storage_from_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = StorageProviderDescriptor {
            id: Uuid::new_v4(),
            name: "primary".to_string(),
            kind: ProviderKind::Local,
            config: serde_json::json!({
                "base_path": dir.path().to_str().unwrap(),
                "base_url": "http://localhost:3000/files",
            }),
            enabled: true,
            priority: 0,
        };

        let storage = create_storage(&descriptor).await.unwrap();
        assert_eq!(storage.kind(), ProviderKind::Local);
    }

    #[tokio::test]
    async fn test_create_storage_rejects_bad_config() {
        let descriptor = StorageProviderDescriptor {
            id: Uuid::new_v4(),
            name: "broken".to_string(),
            kind: ProviderKind::Local,
            config: serde_json::json!({"nope": true}),
            enabled: true,
            priority: 0,
        };

        let result = create_storage(&descriptor).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
