//! The `UploadStore` persistence trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use depot_core::models::{ChunkRecord, FileAttachment, UploadSession, UploadStatus};
use depot_core::{AppError, DedupScope};
use uuid::Uuid;

/// Outcome of an idempotent chunk acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkAck {
    /// This call performed the first Pending/Uploading -> Completed
    /// transition; `uploaded_chunks` was incremented.
    FirstCompletion,
    /// The chunk was already Completed; nothing changed.
    AlreadyCompleted,
    /// The session left Uploading before the ack landed; nothing changed.
    SessionNotUploading,
}

/// Parameters for a hash-dedup lookup. Which fields participate depends on
/// the configured scope.
#[derive(Debug, Clone, Copy)]
pub struct DedupProbe<'a> {
    pub content_hash: &'a str,
    pub scope: DedupScope,
    pub tenant_id: Uuid,
    pub business_type: &'a str,
    pub business_id: Option<&'a str>,
}

/// Persistence contract for upload sessions, their chunks, and the durable
/// attachments created at completion.
///
/// Implementations must keep two operations safe under concurrent duplicate
/// delivery: `mark_chunk_completed` (idempotent upsert keyed by
/// `(session_id, chunk_index)`, counted once) and `transition_status`
/// (compare-and-swap on the current status).
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Insert a session plus one Pending chunk row per planned chunk.
    async fn create_session(&self, session: &UploadSession) -> Result<(), AppError>;

    /// Fetch a session scoped to its tenant.
    async fn get_session(
        &self,
        tenant_id: Uuid,
        upload_id: Uuid,
    ) -> Result<Option<UploadSession>, AppError>;

    /// Idempotently mark a chunk Completed. Only the first transition
    /// increments the session's `uploaded_chunks`, and nothing is recorded
    /// once the session has left Uploading.
    async fn mark_chunk_completed(
        &self,
        session_id: Uuid,
        chunk_index: i32,
        chunk_hash: Option<&str>,
        storage_key: &str,
    ) -> Result<ChunkAck, AppError>;

    /// Indexes of all Completed chunks, ascending. The authoritative source
    /// for client resume.
    async fn completed_chunk_indexes(&self, session_id: Uuid) -> Result<Vec<i32>, AppError>;

    /// All chunk records for a session, ordered by index.
    async fn chunk_records(&self, session_id: Uuid) -> Result<Vec<ChunkRecord>, AppError>;

    /// Compare-and-swap the session status: succeeds only when the current
    /// status is one of `from`. Returns whether the transition happened.
    async fn transition_status(
        &self,
        session_id: Uuid,
        from: &[UploadStatus],
        to: UploadStatus,
    ) -> Result<bool, AppError>;

    /// Record the failure reason on a session.
    async fn set_error_message(&self, session_id: Uuid, message: &str) -> Result<(), AppError>;

    /// Link the attachment created at completion.
    async fn set_attachment(&self, session_id: Uuid, attachment_id: Uuid)
        -> Result<(), AppError>;

    async fn create_attachment(&self, attachment: &FileAttachment) -> Result<(), AppError>;

    async fn get_attachment(
        &self,
        tenant_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<Option<FileAttachment>, AppError>;

    /// Find an existing attachment with the same content hash within the
    /// probe's scope (instant upload).
    async fn find_attachment_by_hash(
        &self,
        probe: DedupProbe<'_>,
    ) -> Result<Option<FileAttachment>, AppError>;

    /// Uploading sessions whose `expires_at` passed, for the sweeper.
    async fn expired_sessions(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<UploadSession>, AppError>;
}
