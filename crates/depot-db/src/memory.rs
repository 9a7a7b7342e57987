//! In-memory implementation of `UploadStore`.
//!
//! Same semantics as the Postgres store, backed by tokio-lock maps. Used by
//! the test suites and by embedded deployments that do not carry a database.

use crate::store::{ChunkAck, DedupProbe, UploadStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use depot_core::models::{
    chunk_plan, ChunkRecord, ChunkStatus, FileAttachment, UploadSession, UploadStatus,
};
use depot_core::{AppError, DedupScope};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

struct SessionEntry {
    session: UploadSession,
    chunks: BTreeMap<i32, ChunkRecord>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, SessionEntry>,
    attachments: HashMap<Uuid, FileAttachment>,
}

/// In-memory upload store. All mutations happen under one write lock, which
/// gives the same atomicity the Postgres store gets from transactions.
#[derive(Default)]
pub struct MemoryUploadStore {
    inner: RwLock<Inner>,
}

impl MemoryUploadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UploadStore for MemoryUploadStore {
    async fn create_session(&self, session: &UploadSession) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;

        let chunks = chunk_plan(session.file_size, session.chunk_size)
            .into_iter()
            .enumerate()
            .map(|(index, size)| {
                let index = index as i32;
                (
                    index,
                    ChunkRecord {
                        session_id: session.id,
                        chunk_index: index,
                        chunk_size: size,
                        chunk_hash: None,
                        status: ChunkStatus::Pending,
                        storage_key: None,
                        updated_at: session.created_at,
                    },
                )
            })
            .collect();

        inner.sessions.insert(
            session.id,
            SessionEntry {
                session: session.clone(),
                chunks,
            },
        );

        Ok(())
    }

    async fn get_session(
        &self,
        tenant_id: Uuid,
        upload_id: Uuid,
    ) -> Result<Option<UploadSession>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .get(&upload_id)
            .filter(|entry| entry.session.tenant_id == tenant_id)
            .map(|entry| entry.session.clone()))
    }

    async fn mark_chunk_completed(
        &self,
        session_id: Uuid,
        chunk_index: i32,
        chunk_hash: Option<&str>,
        storage_key: &str,
    ) -> Result<ChunkAck, AppError> {
        let mut inner = self.inner.write().await;

        let entry = inner.sessions.get_mut(&session_id).ok_or_else(|| {
            AppError::NotFound(format!("Upload session not found: {}", session_id))
        })?;

        if entry.session.status != UploadStatus::Uploading {
            return Ok(ChunkAck::SessionNotUploading);
        }

        let chunk = entry
            .chunks
            .get_mut(&chunk_index)
            .ok_or_else(|| AppError::NotFound(format!("Chunk not found: {}", chunk_index)))?;

        if chunk.status == ChunkStatus::Completed {
            return Ok(ChunkAck::AlreadyCompleted);
        }

        chunk.status = ChunkStatus::Completed;
        chunk.chunk_hash = chunk_hash.map(String::from);
        chunk.storage_key = Some(storage_key.to_string());
        chunk.updated_at = Utc::now();

        entry.session.uploaded_chunks += 1;
        entry.session.updated_at = Utc::now();

        Ok(ChunkAck::FirstCompletion)
    }

    async fn completed_chunk_indexes(&self, session_id: Uuid) -> Result<Vec<i32>, AppError> {
        let inner = self.inner.read().await;
        let entry = inner.sessions.get(&session_id).ok_or_else(|| {
            AppError::NotFound(format!("Upload session not found: {}", session_id))
        })?;

        Ok(entry
            .chunks
            .values()
            .filter(|c| c.status == ChunkStatus::Completed)
            .map(|c| c.chunk_index)
            .collect())
    }

    async fn chunk_records(&self, session_id: Uuid) -> Result<Vec<ChunkRecord>, AppError> {
        let inner = self.inner.read().await;
        let entry = inner.sessions.get(&session_id).ok_or_else(|| {
            AppError::NotFound(format!("Upload session not found: {}", session_id))
        })?;

        Ok(entry.chunks.values().cloned().collect())
    }

    async fn transition_status(
        &self,
        session_id: Uuid,
        from: &[UploadStatus],
        to: UploadStatus,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;

        let Some(entry) = inner.sessions.get_mut(&session_id) else {
            return Ok(false);
        };

        if !from.contains(&entry.session.status) {
            return Ok(false);
        }

        entry.session.status = to;
        entry.session.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_error_message(&self, session_id: Uuid, message: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.sessions.get_mut(&session_id) {
            entry.session.error_message = Some(message.to_string());
            entry.session.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_attachment(
        &self,
        session_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.sessions.get_mut(&session_id) {
            entry.session.attachment_id = Some(attachment_id);
            entry.session.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn create_attachment(&self, attachment: &FileAttachment) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner.attachments.insert(attachment.id, attachment.clone());
        Ok(())
    }

    async fn get_attachment(
        &self,
        tenant_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<Option<FileAttachment>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .attachments
            .get(&attachment_id)
            .filter(|a| a.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_attachment_by_hash(
        &self,
        probe: DedupProbe<'_>,
    ) -> Result<Option<FileAttachment>, AppError> {
        let inner = self.inner.read().await;

        let mut matches: Vec<&FileAttachment> = inner
            .attachments
            .values()
            .filter(|a| a.content_hash == probe.content_hash)
            .filter(|a| match probe.scope {
                DedupScope::Global => true,
                DedupScope::Tenant => a.tenant_id == probe.tenant_id,
                DedupScope::Business => {
                    a.tenant_id == probe.tenant_id
                        && a.business_type == probe.business_type
                        && a.business_id.as_deref() == probe.business_id
                }
            })
            .collect();

        matches.sort_by_key(|a| a.created_at);
        Ok(matches.first().map(|a| (*a).clone()))
    }

    async fn expired_sessions(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<UploadSession>, AppError> {
        let inner = self.inner.read().await;

        let mut expired: Vec<UploadSession> = inner
            .sessions
            .values()
            .filter(|e| e.session.status == UploadStatus::Uploading && e.session.expires_at < now)
            .map(|e| e.session.clone())
            .collect();

        expired.sort_by_key(|s| s.expires_at);
        expired.truncate(limit as usize);
        Ok(expired)
    }
}
