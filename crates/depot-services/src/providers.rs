//! Storage-provider registry.
//!
//! Resolves provider descriptors (supplied by the platform's configuration
//! store) to concrete backends, caching instances by descriptor id. New
//! sessions pick the enabled descriptor with the lowest priority unless the
//! caller requests one explicitly.

use depot_core::models::provider::{ProviderKind, StorageProviderDescriptor};
use depot_core::{AppError, Config};
use depot_storage::{create_storage, Storage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Descriptor id of the implicit local fallback used when no descriptor
/// document is configured. Deterministic so sessions survive restarts.
pub const FALLBACK_LOCAL_PROVIDER_ID: Uuid = Uuid::nil();

pub struct ProviderRegistry {
    descriptors: Vec<StorageProviderDescriptor>,
    cache: RwLock<HashMap<Uuid, Arc<dyn Storage>>>,
}

impl ProviderRegistry {
    pub fn new(descriptors: Vec<StorageProviderDescriptor>) -> Self {
        Self {
            descriptors,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Build the registry from environment configuration. Falls back to a
    /// single local descriptor when no `STORAGE_PROVIDERS` document is set.
    pub fn from_config(config: &Config) -> Result<Self, anyhow::Error> {
        let mut descriptors = config.provider_descriptors()?;

        if descriptors.is_empty() {
            let (Some(base_path), Some(base_url)) = (
                config.local_storage_path.clone(),
                config.local_storage_base_url.clone(),
            ) else {
                return Err(anyhow::anyhow!(
                    "No storage providers configured. Set STORAGE_PROVIDERS or \
                     LOCAL_STORAGE_PATH + LOCAL_STORAGE_BASE_URL."
                ));
            };

            descriptors.push(StorageProviderDescriptor {
                id: FALLBACK_LOCAL_PROVIDER_ID,
                name: "local".to_string(),
                kind: ProviderKind::Local,
                config: serde_json::json!({
                    "base_path": base_path,
                    "base_url": base_url,
                }),
                enabled: true,
                priority: 0,
            });
        }

        Ok(Self::new(descriptors))
    }

    /// Registry with pre-instantiated backends; descriptors and instances are
    /// paired. Used by tests and embedded callers.
    pub fn with_instances(pairs: Vec<(StorageProviderDescriptor, Arc<dyn Storage>)>) -> Self {
        let mut descriptors = Vec::with_capacity(pairs.len());
        let mut cache = HashMap::with_capacity(pairs.len());
        for (descriptor, storage) in pairs {
            cache.insert(descriptor.id, storage);
            descriptors.push(descriptor);
        }
        Self {
            descriptors,
            cache: RwLock::new(cache),
        }
    }

    pub fn descriptors(&self) -> &[StorageProviderDescriptor] {
        &self.descriptors
    }

    /// Pick the provider for a new session: an explicit id must exist and be
    /// enabled; otherwise the enabled descriptor with the lowest priority
    /// wins.
    pub fn resolve_for_new_session(&self, requested: Option<Uuid>) -> Result<Uuid, AppError> {
        match requested {
            Some(id) => {
                let descriptor = self
                    .descriptors
                    .iter()
                    .find(|d| d.id == id)
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Storage provider not found: {}", id))
                    })?;
                if !descriptor.enabled {
                    return Err(AppError::InvalidInput(format!(
                        "Storage provider is disabled: {}",
                        descriptor.name
                    )));
                }
                Ok(id)
            }
            None => self
                .descriptors
                .iter()
                .filter(|d| d.enabled)
                .min_by_key(|d| d.priority)
                .map(|d| d.id)
                .ok_or_else(|| {
                    AppError::InvalidInput("No enabled storage provider configured".to_string())
                }),
        }
    }

    /// Resolve a descriptor id to a backend instance, constructing and
    /// caching it on first use. Disabled descriptors still resolve so
    /// sessions opened before a provider was disabled can finish.
    pub async fn get(&self, provider_id: Uuid) -> Result<Arc<dyn Storage>, AppError> {
        if let Some(storage) = self.cache.read().await.get(&provider_id) {
            return Ok(storage.clone());
        }

        let descriptor = self
            .descriptors
            .iter()
            .find(|d| d.id == provider_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Storage provider not found: {}", provider_id))
            })?;

        let storage = create_storage(descriptor).await?;

        let mut cache = self.cache.write().await;
        let storage = cache.entry(provider_id).or_insert(storage).clone();

        tracing::info!(
            provider_id = %provider_id,
            provider = %descriptor.name,
            kind = %descriptor.kind,
            "Storage provider initialized"
        );

        Ok(storage)
    }
}
