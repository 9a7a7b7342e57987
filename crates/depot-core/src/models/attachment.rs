//! Durable attachment record created when an upload completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fully stored file. Deduplication looks these up by content hash within
/// the configured scope, so two uploads of identical bytes share one record's
/// underlying object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttachment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub created_by: Option<Uuid>,
    /// Original filename as supplied by the uploader.
    pub file_name: String,
    pub storage_key: String,
    pub content_hash: String,
    pub content_type: String,
    pub file_size: i64,
    pub business_type: String,
    pub business_id: Option<String>,
    pub provider_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for FileAttachment {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        Ok(FileAttachment {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            created_by: row.get("created_by"),
            file_name: row.get("file_name"),
            storage_key: row.get("storage_key"),
            content_hash: row.get("content_hash"),
            content_type: row.get("content_type"),
            file_size: row.get("file_size"),
            business_type: row.get("business_type"),
            business_id: row.get("business_id"),
            provider_id: row.get("provider_id"),
            created_at: row.get("created_at"),
        })
    }
}
