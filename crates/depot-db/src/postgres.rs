//! PostgreSQL implementation of `UploadStore`.
//!
//! Uses dynamic sqlx queries so the crate builds without a live database.
//! Idempotency and the status CAS are expressed as conditional UPDATEs
//! checked via `rows_affected`.

use crate::store::{ChunkAck, DedupProbe, UploadStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use depot_core::models::{
    chunk_plan, ChunkRecord, FileAttachment, UploadSession, UploadStatus,
};
use depot_core::{AppError, DedupScope};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgUploadStore {
    pool: PgPool,
}

impl PgUploadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UploadStore for PgUploadStore {
    async fn create_session(&self, session: &UploadSession) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO upload_sessions (
                id, tenant_id, created_by, file_name, file_size, content_hash,
                content_type, business_type, business_id, provider_id, storage_key,
                status, chunk_size, total_chunks, uploaded_chunks,
                expires_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 0, $15, $16, $17)
            "#,
        )
        .bind(session.id)
        .bind(session.tenant_id)
        .bind(session.created_by)
        .bind(&session.file_name)
        .bind(session.file_size)
        .bind(&session.content_hash)
        .bind(&session.content_type)
        .bind(&session.business_type)
        .bind(&session.business_id)
        .bind(session.provider_id)
        .bind(&session.storage_key)
        .bind(session.status.to_string())
        .bind(session.chunk_size)
        .bind(session.total_chunks)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&mut *tx)
        .await?;

        for (index, size) in chunk_plan(session.file_size, session.chunk_size)
            .into_iter()
            .enumerate()
        {
            sqlx::query(
                r#"
                INSERT INTO upload_chunks (session_id, chunk_index, chunk_size, status, updated_at)
                VALUES ($1, $2, $3, 'pending', NOW())
                "#,
            )
            .bind(session.id)
            .bind(index as i32)
            .bind(size)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn get_session(
        &self,
        tenant_id: Uuid,
        upload_id: Uuid,
    ) -> Result<Option<UploadSession>, AppError> {
        let row = sqlx::query_as::<_, UploadSession>(
            r#"
            SELECT
                id, tenant_id, created_by, file_name, file_size, content_hash,
                content_type, business_type, business_id, provider_id, storage_key,
                status, chunk_size, total_chunks, uploaded_chunks, attachment_id,
                error_message, expires_at, created_at, updated_at
            FROM upload_sessions
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(upload_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn mark_chunk_completed(
        &self,
        session_id: Uuid,
        chunk_index: i32,
        chunk_hash: Option<&str>,
        storage_key: &str,
    ) -> Result<ChunkAck, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row-lock the session so the ack and the counter increment agree on
        // the status they observed.
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM upload_sessions WHERE id = $1 FOR UPDATE")
                .bind(session_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(status) = status else {
            return Err(AppError::NotFound(format!(
                "Upload session not found: {}",
                session_id
            )));
        };

        if status != UploadStatus::Uploading.to_string() {
            tx.commit().await?;
            return Ok(ChunkAck::SessionNotUploading);
        }

        let updated = sqlx::query(
            r#"
            UPDATE upload_chunks
            SET status = 'completed', chunk_hash = $3, storage_key = $4, updated_at = NOW()
            WHERE session_id = $1 AND chunk_index = $2 AND status <> 'completed'
            "#,
        )
        .bind(session_id)
        .bind(chunk_index)
        .bind(chunk_hash)
        .bind(storage_key)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 1 {
            sqlx::query(
                r#"
                UPDATE upload_sessions
                SET uploaded_chunks = uploaded_chunks + 1, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            return Ok(ChunkAck::FirstCompletion);
        }

        // Nothing updated: either the chunk row is missing or it was already
        // completed by a duplicate delivery.
        let exists: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM upload_chunks WHERE session_id = $1 AND chunk_index = $2",
        )
        .bind(session_id)
        .bind(chunk_index)
        .fetch_optional(&mut *tx)
        .await?;

        if exists.is_none() {
            return Err(AppError::NotFound(format!(
                "Chunk not found: {}",
                chunk_index
            )));
        }

        tx.commit().await?;
        Ok(ChunkAck::AlreadyCompleted)
    }

    async fn completed_chunk_indexes(&self, session_id: Uuid) -> Result<Vec<i32>, AppError> {
        let indexes: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT chunk_index FROM upload_chunks
            WHERE session_id = $1 AND status = 'completed'
            ORDER BY chunk_index
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(indexes)
    }

    async fn chunk_records(&self, session_id: Uuid) -> Result<Vec<ChunkRecord>, AppError> {
        let chunks = sqlx::query_as::<_, ChunkRecord>(
            r#"
            SELECT session_id, chunk_index, chunk_size, chunk_hash, status, storage_key, updated_at
            FROM upload_chunks
            WHERE session_id = $1
            ORDER BY chunk_index
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(chunks)
    }

    async fn transition_status(
        &self,
        session_id: Uuid,
        from: &[UploadStatus],
        to: UploadStatus,
    ) -> Result<bool, AppError> {
        let from: Vec<String> = from.iter().map(|s| s.to_string()).collect();

        let updated = sqlx::query(
            r#"
            UPDATE upload_sessions
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            "#,
        )
        .bind(session_id)
        .bind(to.to_string())
        .bind(&from)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn set_error_message(&self, session_id: Uuid, message: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE upload_sessions
            SET error_message = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .bind(message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_attachment(
        &self,
        session_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE upload_sessions
            SET attachment_id = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .bind(attachment_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_attachment(&self, attachment: &FileAttachment) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO file_attachments (
                id, tenant_id, created_by, file_name, storage_key, content_hash,
                content_type, file_size, business_type, business_id, provider_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(attachment.id)
        .bind(attachment.tenant_id)
        .bind(attachment.created_by)
        .bind(&attachment.file_name)
        .bind(&attachment.storage_key)
        .bind(&attachment.content_hash)
        .bind(&attachment.content_type)
        .bind(attachment.file_size)
        .bind(&attachment.business_type)
        .bind(&attachment.business_id)
        .bind(attachment.provider_id)
        .bind(attachment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_attachment(
        &self,
        tenant_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<Option<FileAttachment>, AppError> {
        let row = sqlx::query_as::<_, FileAttachment>(
            r#"
            SELECT id, tenant_id, created_by, file_name, storage_key, content_hash,
                   content_type, file_size, business_type, business_id, provider_id, created_at
            FROM file_attachments
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(attachment_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_attachment_by_hash(
        &self,
        probe: DedupProbe<'_>,
    ) -> Result<Option<FileAttachment>, AppError> {
        const COLUMNS: &str = "id, tenant_id, created_by, file_name, storage_key, content_hash, \
             content_type, file_size, business_type, business_id, provider_id, created_at";

        let row = match probe.scope {
            DedupScope::Global => {
                sqlx::query_as::<_, FileAttachment>(&format!(
                    "SELECT {COLUMNS} FROM file_attachments WHERE content_hash = $1 \
                     ORDER BY created_at LIMIT 1"
                ))
                .bind(probe.content_hash)
                .fetch_optional(&self.pool)
                .await?
            }
            DedupScope::Tenant => {
                sqlx::query_as::<_, FileAttachment>(&format!(
                    "SELECT {COLUMNS} FROM file_attachments \
                     WHERE content_hash = $1 AND tenant_id = $2 \
                     ORDER BY created_at LIMIT 1"
                ))
                .bind(probe.content_hash)
                .bind(probe.tenant_id)
                .fetch_optional(&self.pool)
                .await?
            }
            DedupScope::Business => {
                sqlx::query_as::<_, FileAttachment>(&format!(
                    "SELECT {COLUMNS} FROM file_attachments \
                     WHERE content_hash = $1 AND tenant_id = $2 \
                       AND business_type = $3 AND business_id IS NOT DISTINCT FROM $4 \
                     ORDER BY created_at LIMIT 1"
                ))
                .bind(probe.content_hash)
                .bind(probe.tenant_id)
                .bind(probe.business_type)
                .bind(probe.business_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(row)
    }

    async fn expired_sessions(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<UploadSession>, AppError> {
        let rows = sqlx::query_as::<_, UploadSession>(
            r#"
            SELECT
                id, tenant_id, created_by, file_name, file_size, content_hash,
                content_type, business_type, business_id, provider_id, storage_key,
                status, chunk_size, total_chunks, uploaded_chunks, attachment_id,
                error_message, expires_at, created_at, updated_at
            FROM upload_sessions
            WHERE status = 'uploading' AND expires_at < $1
            ORDER BY expires_at
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
