use crate::providers::ProviderRegistry;
use chrono::Utc;
use depot_core::models::UploadStatus;
use depot_db::UploadStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

const SWEEP_BATCH_LIMIT: i64 = 100;

/// Sweeps Uploading sessions past their TTL: flips them to Cancelled and
/// deletes their chunk artifacts. Best-effort; every failure is logged and
/// skipped so one bad session cannot stall the sweep.
#[derive(Clone)]
pub struct CleanupService {
    store: Arc<dyn UploadStore>,
    providers: Arc<ProviderRegistry>,
    sweep_interval: Duration,
}

impl CleanupService {
    pub fn new(
        store: Arc<dyn UploadStore>,
        providers: Arc<ProviderRegistry>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            store,
            providers,
            sweep_interval,
        }
    }

    /// Start the background cleanup task.
    /// Returns a JoinHandle for graceful shutdown.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep = interval(self.sweep_interval);

            loop {
                sweep.tick().await;

                tracing::info!("Starting scheduled cleanup of expired upload sessions");

                match self.sweep_expired_sessions().await {
                    Ok(count) => {
                        tracing::info!(cancelled = count, "Cleanup task completed");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Cleanup task failed");
                    }
                }
            }
        })
    }

    /// Cancel all expired Uploading sessions and delete their chunk objects.
    /// Returns how many sessions were cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_expired_sessions(&self) -> Result<usize, anyhow::Error> {
        let expired = self
            .store
            .expired_sessions(Utc::now(), SWEEP_BATCH_LIMIT)
            .await?;
        let mut cancelled = 0usize;

        for session in expired {
            tracing::info!(
                session_id = %session.id,
                tenant_id = %session.tenant_id,
                expires_at = %session.expires_at,
                "Cancelling expired upload session"
            );

            let transitioned = match self
                .store
                .transition_status(session.id, &[UploadStatus::Uploading], UploadStatus::Cancelled)
                .await
            {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, session_id = %session.id, "Failed to cancel expired session");
                    continue;
                }
            };
            if !transitioned {
                // Finished or cancelled since the sweep began.
                continue;
            }
            cancelled += 1;

            let chunks = match self.store.chunk_records(session.id).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::error!(error = %e, session_id = %session.id, "Failed to list chunks for cleanup");
                    continue;
                }
            };

            let storage = match self.providers.get(session.provider_id).await {
                Ok(storage) => storage,
                Err(e) => {
                    tracing::error!(error = %e, session_id = %session.id, "Failed to resolve provider for cleanup");
                    continue;
                }
            };

            for chunk in chunks.into_iter().filter_map(|c| c.storage_key) {
                if let Err(e) = storage.delete(&chunk).await {
                    tracing::warn!(error = %e, storage_key = %chunk, "Failed to delete chunk during cleanup");
                }
            }
        }

        Ok(cancelled)
    }
}
