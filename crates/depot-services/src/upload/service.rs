//! The Upload Session Manager.
//!
//! Owns session/chunk records through `UploadStore`, enforces the status
//! machine (Uploading -> Completed | Failed | Cancelled), deduplicates by
//! content hash, and drives the storage-provider merge on completion.

use crate::providers::ProviderRegistry;
use bytes::Bytes;
use chrono::{Duration as ChronoDuration, Utc};
use depot_core::constants::MAX_CHUNK_COUNT;
use depot_core::models::{
    chunk_len, total_chunks, CompleteUploadResponse, FileAttachment, InitiateUploadRequest,
    InitiateUploadResponse, UploadChunkResponse, UploadProgressResponse, UploadSession,
    UploadStatus,
};
use depot_core::validation::{validate_content_hash, validate_file_name};
use depot_core::{AppError, CallerContext, Config, DedupScope};
use depot_db::{ChunkAck, DedupProbe, UploadStore};
use depot_storage::traits::ByteStream;
use depot_storage::{keys, Storage};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;
use validator::Validate;

/// Tuning knobs for the session manager.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub chunk_size: i64,
    pub max_file_size: i64,
    pub dedup_scope: DedupScope,
    pub session_ttl: ChronoDuration,
    /// Lifetime of presigned access URLs handed out on completion/download.
    pub presign_ttl: Duration,
}

impl UploadConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            max_file_size: config.max_file_size,
            dedup_scope: config.dedup_scope,
            session_ttl: ChronoDuration::hours(config.session_ttl_hours),
            presign_ttl: Duration::from_secs(30 * 60),
        }
    }
}

/// Upload Session Manager. One instance serves all tenants; every operation
/// is scoped by the caller's tenant id.
pub struct UploadService {
    store: Arc<dyn UploadStore>,
    providers: Arc<ProviderRegistry>,
    config: UploadConfig,
    /// Per-session exclusive section so two completion calls never merge the
    /// same session concurrently. There is no cross-session locking.
    merge_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl UploadService {
    pub fn new(
        store: Arc<dyn UploadStore>,
        providers: Arc<ProviderRegistry>,
        config: UploadConfig,
    ) -> Self {
        Self {
            store,
            providers,
            config,
            merge_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    pub fn chunk_size(&self) -> i64 {
        self.config.chunk_size
    }

    /// Start a chunked upload session, or report an instant upload when
    /// content with the same hash already exists within the dedup scope.
    pub async fn initiate_upload(
        &self,
        ctx: &CallerContext,
        request: InitiateUploadRequest,
    ) -> Result<InitiateUploadResponse, AppError> {
        request.validate()?;
        validate_file_name(&request.file_name)?;
        let content_hash = request.content_hash.to_lowercase();
        validate_content_hash(&content_hash)?;

        if request.file_size > self.config.max_file_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File size {} exceeds maximum allowed size: {} bytes",
                request.file_size, self.config.max_file_size
            )));
        }

        let chunk_count = total_chunks(request.file_size, self.config.chunk_size);
        if chunk_count > MAX_CHUNK_COUNT {
            return Err(AppError::InvalidInput(format!(
                "Chunk count {} exceeds maximum {}; use a larger chunk size",
                chunk_count, MAX_CHUNK_COUNT
            )));
        }

        // Instant upload: identical content already stored within scope.
        let existing = self
            .store
            .find_attachment_by_hash(DedupProbe {
                content_hash: &content_hash,
                scope: self.config.dedup_scope,
                tenant_id: ctx.tenant_id,
                business_type: &request.business_type,
                business_id: request.business_id.as_deref(),
            })
            .await?;

        if let Some(attachment) = existing {
            tracing::info!(
                tenant_id = %ctx.tenant_id,
                attachment_id = %attachment.id,
                content_hash = %content_hash,
                "Content already stored, instant upload"
            );
            return Ok(InitiateUploadResponse {
                upload_id: attachment.id,
                chunk_size: self.config.chunk_size,
                total_chunks: 0,
                uploaded_chunk_indexes: Vec::new(),
                can_instant_upload: true,
                attachment_id: Some(attachment.id),
            });
        }

        let provider_id = self
            .providers
            .resolve_for_new_session(request.storage_provider_id)?;

        let now = Utc::now();
        let session = UploadSession {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            created_by: ctx.caller_id,
            file_name: request.file_name.clone(),
            file_size: request.file_size,
            content_hash,
            content_type: request.content_type,
            business_type: request.business_type.clone(),
            business_id: request.business_id,
            provider_id,
            storage_key: keys::final_key(ctx.tenant_id, &request.business_type, &request.file_name),
            status: UploadStatus::Uploading,
            chunk_size: self.config.chunk_size,
            total_chunks: chunk_count,
            uploaded_chunks: 0,
            attachment_id: None,
            error_message: None,
            expires_at: now + self.config.session_ttl,
            created_at: now,
            updated_at: now,
        };

        self.store.create_session(&session).await?;

        tracing::info!(
            session_id = %session.id,
            tenant_id = %ctx.tenant_id,
            file_name = %request.file_name,
            total_chunks = chunk_count,
            "Initiated upload session"
        );

        Ok(InitiateUploadResponse {
            upload_id: session.id,
            chunk_size: session.chunk_size,
            total_chunks: chunk_count,
            uploaded_chunk_indexes: Vec::new(),
            can_instant_upload: false,
            attachment_id: None,
        })
    }

    /// Persist one chunk and record it idempotently. Re-sending a completed
    /// chunk succeeds without double-counting.
    pub async fn record_chunk(
        &self,
        ctx: &CallerContext,
        upload_id: Uuid,
        chunk_index: i32,
        chunk_hash: Option<&str>,
        body: Bytes,
    ) -> Result<UploadChunkResponse, AppError> {
        let session = self.get_owned_session(ctx, upload_id).await?;

        if session.status != UploadStatus::Uploading {
            return Err(AppError::Conflict(format!(
                "Upload is not in uploading status: {}",
                session.status
            )));
        }

        if chunk_index < 0 || chunk_index >= session.total_chunks {
            return Err(AppError::NotFound(format!(
                "Chunk not found: {}",
                chunk_index
            )));
        }

        let expected = chunk_len(session.file_size, session.chunk_size, chunk_index);
        if body.len() as i64 != expected {
            return Err(AppError::InvalidInput(format!(
                "Chunk {} has {} bytes, expected {}",
                chunk_index,
                body.len(),
                expected
            )));
        }

        if let Some(declared) = chunk_hash {
            let actual = hex::encode(Sha256::digest(&body));
            if !declared.eq_ignore_ascii_case(&actual) {
                return Err(AppError::InvalidInput(format!(
                    "Chunk {} hash mismatch",
                    chunk_index
                )));
            }
        }

        let storage = self.providers.get(session.provider_id).await?;
        let chunk_key = keys::chunk_key(&session.storage_key, chunk_index);
        let stored_key = storage.upload_chunk(&chunk_key, body).await?;

        let ack = self
            .store
            .mark_chunk_completed(upload_id, chunk_index, chunk_hash, &stored_key)
            .await?;

        match ack {
            ChunkAck::FirstCompletion => {
                tracing::info!(
                    session_id = %upload_id,
                    chunk_index = chunk_index,
                    total_chunks = session.total_chunks,
                    "Chunk uploaded"
                );
                Ok(UploadChunkResponse {
                    success: true,
                    chunk_index,
                    message: Some("Chunk uploaded successfully".to_string()),
                })
            }
            ChunkAck::AlreadyCompleted => Ok(UploadChunkResponse {
                success: true,
                chunk_index,
                message: Some("Chunk already uploaded".to_string()),
            }),
            // The session went terminal while the chunk bytes were in flight.
            ChunkAck::SessionNotUploading => Err(AppError::Conflict(
                "Upload session is no longer accepting chunks".to_string(),
            )),
        }
    }

    /// Merge all chunks into the final object and finish the session.
    ///
    /// Only the first caller to observe all chunks present performs the
    /// merge. A merge failure leaves the session Failed with chunk artifacts
    /// retained; calling complete again retries the merge without
    /// re-uploading.
    pub async fn complete_upload(
        &self,
        ctx: &CallerContext,
        upload_id: Uuid,
    ) -> Result<CompleteUploadResponse, AppError> {
        let session = self.get_owned_session(ctx, upload_id).await?;

        match session.status {
            UploadStatus::Uploading | UploadStatus::Failed => {}
            UploadStatus::Completed | UploadStatus::Cancelled => {
                return Err(AppError::Conflict(format!(
                    "Upload is not in uploading status: {}",
                    session.status
                )));
            }
        }

        if session.uploaded_chunks < session.total_chunks {
            return Err(AppError::Conflict(format!(
                "Not all chunks have been uploaded: {}/{}",
                session.uploaded_chunks, session.total_chunks
            )));
        }

        let lock = self.merge_lock(upload_id).await;
        let _guard = lock.lock().await;

        // Re-read under the lock: a racing completion may have finished (or a
        // cancellation landed) while we waited.
        let session = self.get_owned_session(ctx, upload_id).await?;
        match session.status {
            UploadStatus::Uploading | UploadStatus::Failed => {}
            UploadStatus::Completed => {
                // A racing duplicate completion; the merge already happened.
                return self.completed_response(ctx, &session).await;
            }
            UploadStatus::Cancelled => {
                return Err(AppError::Conflict(
                    "Upload session was cancelled".to_string(),
                ));
            }
        }

        let storage = self.providers.get(session.provider_id).await?;

        let chunks = self.store.chunk_records(upload_id).await?;
        let chunk_keys: Vec<String> = chunks
            .iter()
            .map(|c| {
                c.storage_key
                    .clone()
                    .unwrap_or_else(|| keys::chunk_key(&session.storage_key, c.chunk_index))
            })
            .collect();

        let final_key = match storage
            .merge_chunks(&chunk_keys, &session.storage_key)
            .await
        {
            Ok(key) => key,
            Err(e) => {
                // Keep chunk artifacts so the caller can retry completion
                // without re-uploading.
                self.store
                    .set_error_message(upload_id, &e.to_string())
                    .await?;
                self.store
                    .transition_status(
                        upload_id,
                        &[UploadStatus::Uploading, UploadStatus::Failed],
                        UploadStatus::Failed,
                    )
                    .await?;

                tracing::error!(
                    session_id = %upload_id,
                    error = %e,
                    "Chunk merge failed, session marked failed"
                );

                return Err(e.into());
            }
        };

        let attachment = FileAttachment {
            id: Uuid::new_v4(),
            tenant_id: session.tenant_id,
            created_by: session.created_by,
            file_name: session.file_name.clone(),
            storage_key: final_key.clone(),
            content_hash: session.content_hash.clone(),
            content_type: session.content_type.clone(),
            file_size: session.file_size,
            business_type: session.business_type.clone(),
            business_id: session.business_id.clone(),
            provider_id: session.provider_id,
            created_at: Utc::now(),
        };
        self.store.create_attachment(&attachment).await?;

        let transitioned = self
            .store
            .transition_status(
                upload_id,
                &[UploadStatus::Uploading, UploadStatus::Failed],
                UploadStatus::Completed,
            )
            .await?;
        if !transitioned {
            return Err(AppError::Conflict(
                "Upload session changed state during completion".to_string(),
            ));
        }
        self.store.set_attachment(upload_id, attachment.id).await?;

        tracing::info!(
            session_id = %upload_id,
            attachment_id = %attachment.id,
            tenant_id = %session.tenant_id,
            file_name = %session.file_name,
            "Upload completed"
        );

        // Chunk artifacts are no longer needed; removal is best-effort and
        // never blocks the caller.
        Self::spawn_chunk_cleanup(storage.clone(), chunk_keys);

        // The session is terminal; later callers bail before locking.
        self.merge_locks.lock().await.remove(&upload_id);

        let access_url = storage
            .presigned_url(&final_key, self.config.presign_ttl)
            .await
            .ok();

        Ok(CompleteUploadResponse {
            attachment_id: attachment.id,
            file_name: attachment.file_name,
            file_size: attachment.file_size,
            access_url,
        })
    }

    /// Cancel a session. Idempotent: cancelling an already-terminal session
    /// acks without change. Chunk cleanup runs asynchronously.
    pub async fn cancel_upload(&self, ctx: &CallerContext, upload_id: Uuid) -> Result<(), AppError> {
        let session = self.get_owned_session(ctx, upload_id).await?;

        if session.status.is_terminal() {
            return Ok(());
        }

        let transitioned = self
            .store
            .transition_status(upload_id, &[UploadStatus::Uploading], UploadStatus::Cancelled)
            .await?;
        if !transitioned {
            // Lost the race against another terminal transition; nothing to do.
            return Ok(());
        }

        tracing::info!(session_id = %upload_id, tenant_id = %ctx.tenant_id, "Upload cancelled");

        let chunks = self.store.chunk_records(upload_id).await?;
        let chunk_keys: Vec<String> = chunks
            .into_iter()
            .filter_map(|c| c.storage_key)
            .collect();
        if !chunk_keys.is_empty() {
            let storage = self.providers.get(session.provider_id).await?;
            Self::spawn_chunk_cleanup(storage, chunk_keys);
        }

        Ok(())
    }

    /// Read-only progress. `uploaded_chunk_indexes` is the authoritative set
    /// a restarted client resumes from.
    pub async fn get_progress(
        &self,
        ctx: &CallerContext,
        upload_id: Uuid,
    ) -> Result<UploadProgressResponse, AppError> {
        let session = self.get_owned_session(ctx, upload_id).await?;
        let uploaded_chunk_indexes = self.store.completed_chunk_indexes(upload_id).await?;

        let percentage = if session.total_chunks > 0 {
            (session.uploaded_chunks as f64 / session.total_chunks as f64) * 100.0
        } else {
            0.0
        };

        Ok(UploadProgressResponse {
            upload_id,
            total_chunks: session.total_chunks,
            uploaded_chunks: session.uploaded_chunks,
            percentage,
            status: session.status,
            uploaded_chunk_indexes,
        })
    }

    /// Presigned (or public) URL for a stored attachment.
    pub async fn attachment_url(
        &self,
        ctx: &CallerContext,
        attachment_id: Uuid,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let attachment = self.get_owned_attachment(ctx, attachment_id).await?;
        let storage = self.providers.get(attachment.provider_id).await?;
        Ok(storage
            .presigned_url(&attachment.storage_key, ttl)
            .await?)
    }

    /// Attachment metadata plus a byte stream, for proxied downloads.
    pub async fn attachment_stream(
        &self,
        ctx: &CallerContext,
        attachment_id: Uuid,
    ) -> Result<(FileAttachment, ByteStream), AppError> {
        let attachment = self.get_owned_attachment(ctx, attachment_id).await?;
        let storage = self.providers.get(attachment.provider_id).await?;
        let stream = storage.download_stream(&attachment.storage_key).await?;
        Ok((attachment, stream))
    }

    async fn get_owned_session(
        &self,
        ctx: &CallerContext,
        upload_id: Uuid,
    ) -> Result<UploadSession, AppError> {
        self.store
            .get_session(ctx.tenant_id, upload_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload session not found: {}", upload_id)))
    }

    async fn get_owned_attachment(
        &self,
        ctx: &CallerContext,
        attachment_id: Uuid,
    ) -> Result<FileAttachment, AppError> {
        self.store
            .get_attachment(ctx.tenant_id, attachment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attachment not found: {}", attachment_id)))
    }

    async fn completed_response(
        &self,
        ctx: &CallerContext,
        session: &UploadSession,
    ) -> Result<CompleteUploadResponse, AppError> {
        let attachment_id = session.attachment_id.ok_or_else(|| {
            AppError::Internal("Completed session without attachment".to_string())
        })?;
        let attachment = self.get_owned_attachment(ctx, attachment_id).await?;
        let storage = self.providers.get(attachment.provider_id).await?;
        let access_url = storage
            .presigned_url(&attachment.storage_key, self.config.presign_ttl)
            .await
            .ok();

        Ok(CompleteUploadResponse {
            attachment_id,
            file_name: attachment.file_name,
            file_size: attachment.file_size,
            access_url,
        })
    }

    async fn merge_lock(&self, upload_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.merge_locks.lock().await;
        locks.entry(upload_id).or_default().clone()
    }

    fn spawn_chunk_cleanup(storage: Arc<dyn Storage>, chunk_keys: Vec<String>) {
        tokio::spawn(async move {
            for chunk_key in chunk_keys {
                if let Err(e) = storage.delete(&chunk_key).await {
                    tracing::warn!(
                        error = %e,
                        storage_key = %chunk_key,
                        "Failed to delete chunk during cleanup"
                    );
                }
            }
        });
    }
}
