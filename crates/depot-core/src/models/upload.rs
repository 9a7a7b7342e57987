//! Upload session and chunk records, their status machines, and the pure
//! chunk arithmetic every component agrees on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Session lifecycle. `Uploading` is the only non-terminal state; chunk acks
/// are rejected once the session leaves it. `Failed` additionally admits a
/// caller-initiated completion retry (merge retry without re-upload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Uploading,
    Completed,
    Failed,
    Cancelled,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Uploading)
    }
}

impl FromStr for UploadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uploading" => Ok(UploadStatus::Uploading),
            "completed" => Ok(UploadStatus::Completed),
            "failed" => Ok(UploadStatus::Failed),
            "cancelled" => Ok(UploadStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid upload status: {}", s)),
        }
    }
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadStatus::Uploading => write!(f, "uploading"),
            UploadStatus::Completed => write!(f, "completed"),
            UploadStatus::Failed => write!(f, "failed"),
            UploadStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-chunk upload state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl FromStr for ChunkStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ChunkStatus::Pending),
            "uploading" => Ok(ChunkStatus::Uploading),
            "completed" => Ok(ChunkStatus::Completed),
            "failed" => Ok(ChunkStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid chunk status: {}", s)),
        }
    }
}

impl Display for ChunkStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ChunkStatus::Pending => write!(f, "pending"),
            ChunkStatus::Uploading => write!(f, "uploading"),
            ChunkStatus::Completed => write!(f, "completed"),
            ChunkStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One file's chunked-upload progress record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub created_by: Option<Uuid>,
    pub file_name: String,
    pub file_size: i64,
    pub content_hash: String,
    pub content_type: String,
    pub business_type: String,
    pub business_id: Option<String>,
    pub provider_id: Uuid,
    /// Final object key, decided at initiation.
    pub storage_key: String,
    pub status: UploadStatus,
    pub chunk_size: i64,
    pub total_chunks: i32,
    pub uploaded_chunks: i32,
    pub attachment_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One chunk of one session. Unique per `(session_id, chunk_index)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub session_id: Uuid,
    pub chunk_index: i32,
    pub chunk_size: i64,
    pub chunk_hash: Option<String>,
    pub status: ChunkStatus,
    pub storage_key: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
mod sqlx_rows {
    use super::{ChunkRecord, UploadSession, UploadStatus};
    use sqlx::Row;

    fn decode_status<T: std::str::FromStr<Err = anyhow::Error>>(
        raw: String,
    ) -> Result<T, sqlx::Error> {
        raw.parse::<T>().map_err(|e| sqlx::Error::Decode(e.into()))
    }

    impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for UploadSession {
        fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
            Ok(UploadSession {
                id: row.get("id"),
                tenant_id: row.get("tenant_id"),
                created_by: row.get("created_by"),
                file_name: row.get("file_name"),
                file_size: row.get("file_size"),
                content_hash: row.get("content_hash"),
                content_type: row.get("content_type"),
                business_type: row.get("business_type"),
                business_id: row.get("business_id"),
                provider_id: row.get("provider_id"),
                storage_key: row.get("storage_key"),
                status: decode_status::<UploadStatus>(row.get("status"))?,
                chunk_size: row.get("chunk_size"),
                total_chunks: row.get("total_chunks"),
                uploaded_chunks: row.get("uploaded_chunks"),
                attachment_id: row.get("attachment_id"),
                error_message: row.get("error_message"),
                expires_at: row.get("expires_at"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            })
        }
    }

    impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ChunkRecord {
        fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
            Ok(ChunkRecord {
                session_id: row.get("session_id"),
                chunk_index: row.get("chunk_index"),
                chunk_size: row.get("chunk_size"),
                chunk_hash: row.get("chunk_hash"),
                status: decode_status(row.get("status"))?,
                storage_key: row.get("storage_key"),
                updated_at: row.get("updated_at"),
            })
        }
    }
}

/// Number of chunks a file of `file_size` splits into at `chunk_size`.
pub fn total_chunks(file_size: i64, chunk_size: i64) -> i32 {
    debug_assert!(file_size > 0 && chunk_size > 0);
    ((file_size + chunk_size - 1) / chunk_size) as i32
}

/// Length of chunk `index`; the last chunk carries the remainder.
pub fn chunk_len(file_size: i64, chunk_size: i64, index: i32) -> i64 {
    let start = index as i64 * chunk_size;
    (file_size - start).min(chunk_size)
}

/// Byte range `(offset, len)` of chunk `index` within the file.
pub fn chunk_range(file_size: i64, chunk_size: i64, index: i32) -> (i64, i64) {
    let offset = index as i64 * chunk_size;
    (offset, chunk_len(file_size, chunk_size, index))
}

/// Planned sizes for every chunk of a session, in index order.
pub fn chunk_plan(file_size: i64, chunk_size: i64) -> Vec<i64> {
    let count = total_chunks(file_size, chunk_size);
    (0..count)
        .map(|i| chunk_len(file_size, chunk_size, i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_chunks_is_ceiling() {
        assert_eq!(total_chunks(10 * 1024 * 1024, 5 * 1024 * 1024), 2);
        assert_eq!(total_chunks(10 * 1024 * 1024 + 1, 5 * 1024 * 1024), 3);
        assert_eq!(total_chunks(1, 5 * 1024 * 1024), 1);
        assert_eq!(total_chunks(5 * 1024 * 1024, 5 * 1024 * 1024), 1);
    }

    #[test]
    fn test_chunk_sizes_sum_to_file_size() {
        for file_size in [1i64, 17, 4096, 5_000_000, 10 * 1024 * 1024 + 3] {
            let plan = chunk_plan(file_size, 1024 * 1024);
            assert_eq!(plan.iter().sum::<i64>(), file_size);
            assert_eq!(plan.len() as i32, total_chunks(file_size, 1024 * 1024));
        }
    }

    #[test]
    fn test_last_chunk_carries_remainder() {
        let file_size = 10 * 1024 * 1024 + 7;
        let chunk_size = 5 * 1024 * 1024;
        assert_eq!(chunk_len(file_size, chunk_size, 0), chunk_size);
        assert_eq!(chunk_len(file_size, chunk_size, 1), chunk_size);
        assert_eq!(chunk_len(file_size, chunk_size, 2), 7);
    }

    #[test]
    fn test_chunk_range_offsets() {
        let (offset, len) = chunk_range(12, 5, 2);
        assert_eq!(offset, 10);
        assert_eq!(len, 2);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            UploadStatus::Uploading,
            UploadStatus::Completed,
            UploadStatus::Failed,
            UploadStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<UploadStatus>().unwrap(), status);
        }
        assert!(UploadStatus::Completed.is_terminal());
        assert!(!UploadStatus::Uploading.is_terminal());
    }
}
