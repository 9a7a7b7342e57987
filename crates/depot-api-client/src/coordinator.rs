//! The chunk upload coordinator.
//!
//! Owns everything one upload needs: the transport, durable resume state, the
//! injected progress reporter, a bounded worker pool with bounded retry, and
//! a cancellation token. There is no shared global state; concurrent uploads
//! each get their own coordinator instance.

use crate::hasher::{hash_bytes, hash_file};
use crate::progress::{ProgressReporter, UploadProgress};
use crate::task::{StoredUploadTask, TaskStore};
use crate::transport::{TransportError, UploadTransport};
use bytes::Bytes;
use chrono::Utc;
use depot_core::models::{
    chunk_range, CompleteUploadResponse, InitiateUploadRequest, UploadStatus,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Client-side upload failures.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File is empty: {0}")]
    EmptyFile(PathBuf),

    #[error("Chunk {index} failed after {attempts} attempts: {source}")]
    ChunkFailed {
        index: i32,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("No stored task for upload {0}")]
    UnknownTask(Uuid),

    #[error("Upload {0} already completed on the server")]
    AlreadyCompleted(Uuid),

    #[error("Completion retries exhausted for upload {0}")]
    CompletionRetriesExhausted(Uuid),

    #[error("State error: {0}")]
    State(#[source] anyhow::Error),
}

/// Business association and typing for a new upload.
#[derive(Debug, Clone)]
pub struct UploadMeta {
    pub business_type: String,
    pub business_id: Option<String>,
    pub storage_provider_id: Option<Uuid>,
    pub content_type: Option<String>,
}

/// Tuning knobs for the worker pool and retry loop.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Concurrent chunk transfers.
    pub concurrency: usize,
    /// Attempts per chunk before it is reported failed.
    pub max_attempts: u32,
    /// Fixed backoff between attempts.
    pub retry_delay: Duration,
    /// Rounds of reconcile-and-retry when completion races an in-flight ack.
    pub completion_rounds: u32,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            completion_rounds: 3,
        }
    }
}

struct ChunkFailure {
    attempts: u32,
    error: TransportError,
}

struct ChunkOutcome {
    index: i32,
    result: Result<(), ChunkFailure>,
}

/// Drives one file through the chunked-upload protocol. Create a fresh
/// instance per upload; `cancel` poisons the instance's token.
pub struct UploadCoordinator {
    transport: Arc<dyn UploadTransport>,
    tasks: Arc<dyn TaskStore>,
    reporter: Arc<dyn ProgressReporter>,
    options: CoordinatorOptions,
    cancel: CancellationToken,
}

impl UploadCoordinator {
    pub fn new(
        transport: Arc<dyn UploadTransport>,
        tasks: Arc<dyn TaskStore>,
        reporter: Arc<dyn ProgressReporter>,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            transport,
            tasks,
            reporter,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Token observers can use to watch for cancellation.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Upload a file end to end: hash, initiate (dedup may finish here),
    /// transfer chunks through the pool, complete.
    pub async fn upload(
        &self,
        file_path: &Path,
        meta: UploadMeta,
    ) -> Result<CompleteUploadResponse, UploadError> {
        let (content_hash, file_size) = hash_file(file_path).await?;
        if file_size == 0 {
            return Err(UploadError::EmptyFile(file_path.to_path_buf()));
        }

        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();

        let request = InitiateUploadRequest {
            file_name: file_name.clone(),
            file_size: file_size as i64,
            content_type: meta
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            content_hash: content_hash.clone(),
            business_type: meta.business_type.clone(),
            business_id: meta.business_id.clone(),
            storage_provider_id: meta.storage_provider_id,
        };

        let init = self.transport.initiate(&request).await?;

        if init.can_instant_upload {
            let attachment_id = init.attachment_id.unwrap_or(init.upload_id);
            tracing::info!(
                attachment_id = %attachment_id,
                file_name = %file_name,
                "Content already stored, instant upload"
            );
            self.reporter.report(&UploadProgress::from_counts(
                init.upload_id,
                &file_name,
                file_size as i64,
                0,
                0,
                UploadStatus::Completed,
            ));
            return Ok(CompleteUploadResponse {
                attachment_id,
                file_name,
                file_size: file_size as i64,
                access_url: None,
            });
        }

        let task = StoredUploadTask {
            upload_id: init.upload_id,
            file_path: file_path.to_path_buf(),
            file_name,
            file_size: file_size as i64,
            content_hash,
            content_type: request.content_type.clone(),
            business_type: request.business_type.clone(),
            business_id: request.business_id.clone(),
            chunk_size: init.chunk_size,
            total_chunks: init.total_chunks,
            completed_chunks: init.uploaded_chunk_indexes.iter().copied().collect(),
            created_at: Utc::now(),
        };
        // Persist before the first chunk so a crash can always resume.
        self.tasks.put(&task).await.map_err(UploadError::State)?;

        self.run_to_completion(task).await
    }

    /// Resume an interrupted upload. The server-confirmed completed set wins
    /// over any locally cached markers, so only the true complement is
    /// re-enqueued.
    pub async fn resume(&self, upload_id: Uuid) -> Result<CompleteUploadResponse, UploadError> {
        let mut task = self
            .tasks
            .get(upload_id)
            .await
            .map_err(UploadError::State)?
            .ok_or(UploadError::UnknownTask(upload_id))?;

        let progress = self.transport.progress(upload_id).await?;
        match progress.status {
            UploadStatus::Uploading | UploadStatus::Failed => {}
            UploadStatus::Completed => {
                self.tasks
                    .delete(upload_id)
                    .await
                    .map_err(UploadError::State)?;
                return Err(UploadError::AlreadyCompleted(upload_id));
            }
            UploadStatus::Cancelled => {
                self.tasks
                    .delete(upload_id)
                    .await
                    .map_err(UploadError::State)?;
                return Err(UploadError::Cancelled);
            }
        }

        task.completed_chunks = progress.uploaded_chunk_indexes.iter().copied().collect();
        self.tasks.put(&task).await.map_err(UploadError::State)?;

        tracing::info!(
            upload_id = %upload_id,
            confirmed = progress.uploaded_chunks,
            total = progress.total_chunks,
            "Resuming upload from server-confirmed progress"
        );

        self.run_to_completion(task).await
    }

    /// Abort in-flight transfers, cancel the server session, and clear local
    /// resume state.
    pub async fn cancel(&self, upload_id: Uuid) -> Result<(), UploadError> {
        self.cancel.cancel();
        self.transport.cancel(upload_id).await?;
        self.tasks
            .delete(upload_id)
            .await
            .map_err(UploadError::State)?;

        tracing::info!(upload_id = %upload_id, "Upload cancelled");

        Ok(())
    }

    /// Uploads with persisted state, resumable after a restart.
    pub async fn pending_tasks(&self) -> Result<Vec<StoredUploadTask>, UploadError> {
        self.tasks.list().await.map_err(UploadError::State)
    }

    async fn run_to_completion(
        &self,
        mut task: StoredUploadTask,
    ) -> Result<CompleteUploadResponse, UploadError> {
        let mut rounds = 0u32;

        loop {
            let remaining = task.remaining_chunks();
            if !remaining.is_empty() {
                self.run_pool(&mut task, remaining).await?;
            }

            match self.complete_with_retry(task.upload_id).await {
                Ok(done) => {
                    self.tasks
                        .delete(task.upload_id)
                        .await
                        .map_err(UploadError::State)?;
                    self.reporter.report(&UploadProgress::from_counts(
                        task.upload_id,
                        &task.file_name,
                        task.file_size,
                        task.total_chunks,
                        task.total_chunks,
                        UploadStatus::Completed,
                    ));
                    return Ok(done);
                }
                Err(e) if e.is_conflict() && rounds < self.options.completion_rounds => {
                    rounds += 1;

                    // Completion raced an in-flight or lost ack: reconcile
                    // with server truth and retry just the missing indexes.
                    let progress = self.transport.progress(task.upload_id).await?;
                    match progress.status {
                        UploadStatus::Cancelled => return Err(UploadError::Cancelled),
                        UploadStatus::Completed => {
                            // A racing caller finished the session for us.
                            self.tasks
                                .delete(task.upload_id)
                                .await
                                .map_err(UploadError::State)?;
                            return Err(UploadError::AlreadyCompleted(task.upload_id));
                        }
                        UploadStatus::Uploading | UploadStatus::Failed => {}
                    }
                    task.completed_chunks =
                        progress.uploaded_chunk_indexes.iter().copied().collect();
                    self.tasks.put(&task).await.map_err(UploadError::State)?;

                    tracing::warn!(
                        upload_id = %task.upload_id,
                        confirmed = progress.uploaded_chunks,
                        total = progress.total_chunks,
                        round = rounds,
                        "Completion conflicted, reconciling with server progress"
                    );

                    if task.remaining_chunks().is_empty() {
                        return Err(UploadError::CompletionRetriesExhausted(task.upload_id));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Run the bounded worker pool over the pending indexes. Workers upload;
    /// this loop is the single owner of the completed set: it folds each
    /// completion, persists the task, and reports progress.
    async fn run_pool(
        &self,
        task: &mut StoredUploadTask,
        pending: Vec<i32>,
    ) -> Result<(), UploadError> {
        let workers = self.options.concurrency.clamp(1, pending.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(pending)));
        let (tx, mut rx) = mpsc::channel::<ChunkOutcome>(workers);

        for _ in 0..workers {
            let queue = queue.clone();
            let tx = tx.clone();
            let transport = self.transport.clone();
            let cancel = self.cancel.clone();
            let file_path = task.file_path.clone();
            let file_size = task.file_size;
            let chunk_size = task.chunk_size;
            let upload_id = task.upload_id;
            let max_attempts = self.options.max_attempts;
            let retry_delay = self.options.retry_delay;

            tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let index = {
                        let mut queue = queue.lock().expect("pending queue lock");
                        queue.pop_front()
                    };
                    let Some(index) = index else { break };

                    let result = upload_chunk_with_retry(
                        transport.as_ref(),
                        &file_path,
                        file_size,
                        chunk_size,
                        upload_id,
                        index,
                        max_attempts,
                        retry_delay,
                        &cancel,
                    )
                    .await;

                    if tx.send(ChunkOutcome { index, result }).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut first_failure: Option<(i32, ChunkFailure)> = None;
        while let Some(outcome) = rx.recv().await {
            match outcome.result {
                Ok(()) => {
                    task.completed_chunks.insert(outcome.index);
                    // Persist per chunk so a crash loses at most the chunk
                    // that was in flight.
                    self.tasks.put(task).await.map_err(UploadError::State)?;
                    self.reporter.report(&UploadProgress::from_counts(
                        task.upload_id,
                        &task.file_name,
                        task.file_size,
                        task.completed_chunks.len() as i32,
                        task.total_chunks,
                        UploadStatus::Uploading,
                    ));
                }
                Err(failure) => {
                    if first_failure.is_none() {
                        first_failure = Some((outcome.index, failure));
                    }
                }
            }
        }

        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        if let Some((index, failure)) = first_failure {
            return Err(UploadError::ChunkFailed {
                index,
                attempts: failure.attempts,
                source: failure.error,
            });
        }

        Ok(())
    }

    async fn complete_with_retry(
        &self,
        upload_id: Uuid,
    ) -> Result<CompleteUploadResponse, TransportError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.transport.complete(upload_id).await {
                Ok(done) => return Ok(done),
                Err(e) if e.is_transient() && attempt < self.options.max_attempts => {
                    tracing::warn!(
                        upload_id = %upload_id,
                        attempt = attempt,
                        error = %e,
                        "Completion failed, retrying"
                    );
                    tokio::time::sleep(self.options.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// One chunk, one worker: slice the byte range and upload it, retrying
/// transient failures in an explicit bounded loop with fixed backoff.
#[allow(clippy::too_many_arguments)]
async fn upload_chunk_with_retry(
    transport: &dyn UploadTransport,
    file_path: &Path,
    file_size: i64,
    chunk_size: i64,
    upload_id: Uuid,
    index: i32,
    max_attempts: u32,
    retry_delay: Duration,
    cancel: &CancellationToken,
) -> Result<(), ChunkFailure> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let bytes = match read_chunk(file_path, file_size, chunk_size, index).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Err(ChunkFailure {
                    attempts: attempt,
                    error: TransportError::Transient(format!(
                        "Failed to read chunk {}: {}",
                        index, e
                    )),
                });
            }
        };
        let chunk_hash = hash_bytes(&bytes);

        let error = match transport
            .upload_chunk(upload_id, index, Some(&chunk_hash), bytes)
            .await
        {
            Ok(response) if response.success => return Ok(()),
            Ok(response) => TransportError::Transient(
                response
                    .message
                    .unwrap_or_else(|| "Chunk rejected".to_string()),
            ),
            Err(e) => e,
        };

        if error.is_transient() && attempt < max_attempts {
            tracing::warn!(
                upload_id = %upload_id,
                chunk_index = index,
                attempt = attempt,
                error = %error,
                "Chunk upload failed, retrying"
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ChunkFailure {
                        attempts: attempt,
                        error: TransportError::Transient("Upload cancelled".to_string()),
                    });
                }
                _ = tokio::time::sleep(retry_delay) => {}
            }
            continue;
        }

        return Err(ChunkFailure {
            attempts: attempt,
            error,
        });
    }
}

/// Read one chunk's byte range (seek + exact read).
async fn read_chunk(
    file_path: &Path,
    file_size: i64,
    chunk_size: i64,
    index: i32,
) -> std::io::Result<Bytes> {
    let (offset, len) = chunk_range(file_size, chunk_size, index);

    let mut file = tokio::fs::File::open(file_path).await?;
    file.seek(std::io::SeekFrom::Start(offset as u64)).await?;

    let mut buffer = vec![0u8; len as usize];
    file.read_exact(&mut buffer).await?;

    Ok(Bytes::from(buffer))
}
