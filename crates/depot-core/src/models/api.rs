//! Request/response types for the upload API.

use crate::models::upload::UploadStatus;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

/// Request to start a chunked upload session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct InitiateUploadRequest {
    /// Original filename
    #[validate(length(
        min = 1,
        max = 255,
        message = "Filename must be between 1 and 255 characters"
    ))]
    pub file_name: String,
    /// Total file size in bytes
    #[validate(range(min = 1, message = "File size must be at least 1 byte"))]
    pub file_size: i64,
    /// Content type (MIME type)
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Hex-encoded SHA-256 of the whole file
    #[validate(length(equal = 64, message = "Content hash must be 64 hex characters"))]
    pub content_hash: String,
    /// Business feature that owns the file (e.g. "contract", "avatar")
    #[validate(length(
        min = 1,
        max = 64,
        message = "Business type must be between 1 and 64 characters"
    ))]
    pub business_type: String,
    /// Optional id within the business feature
    #[serde(default)]
    pub business_id: Option<String>,
    /// Explicit storage provider; defaults to the enabled descriptor with the
    /// lowest priority
    #[serde(default)]
    pub storage_provider_id: Option<Uuid>,
}

/// Response for starting a chunked upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InitiateUploadResponse {
    /// Upload session ID. On an instant upload this equals the existing
    /// attachment id and no session exists.
    pub upload_id: Uuid,
    /// Chunk size in bytes the server expects
    pub chunk_size: i64,
    /// Total number of chunks (0 on instant upload)
    pub total_chunks: i32,
    /// Chunk indexes the server has already confirmed (for resume)
    pub uploaded_chunk_indexes: Vec<i32>,
    /// Content with this hash already exists; skip chunk transfer entirely
    pub can_instant_upload: bool,
    /// The deduplicated attachment, when `can_instant_upload` is true
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<Uuid>,
}

/// Response for a single chunk upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadChunkResponse {
    pub success: bool,
    /// Chunk index (0-based)
    pub chunk_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Upload progress; `uploaded_chunk_indexes` is the authoritative source for
/// client resume.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadProgressResponse {
    pub upload_id: Uuid,
    pub total_chunks: i32,
    pub uploaded_chunks: i32,
    /// Progress percentage (0-100)
    pub percentage: f64,
    pub status: UploadStatus,
    pub uploaded_chunk_indexes: Vec<i32>,
}

/// Response after completing an upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompleteUploadResponse {
    pub attachment_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    /// Presigned or public URL, when the provider supports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_url: Option<String>,
}

/// Presigned/temporary access URL for a stored attachment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttachmentUrlResponse {
    pub attachment_id: Uuid,
    pub url: String,
    /// Seconds the URL stays valid
    pub ttl_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiate_request_validation() {
        let request = InitiateUploadRequest {
            file_name: "report.pdf".to_string(),
            file_size: 1024,
            content_type: "application/pdf".to_string(),
            content_hash: "a".repeat(64),
            business_type: "contract".to_string(),
            business_id: None,
            storage_provider_id: None,
        };
        assert!(request.validate().is_ok());

        let mut bad = request.clone();
        bad.file_size = 0;
        assert!(bad.validate().is_err());

        let mut bad = request.clone();
        bad.content_hash = "abc".to_string();
        assert!(bad.validate().is_err());

        let mut bad = request;
        bad.file_name = String::new();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_initiate_request_defaults() {
        let json = r#"{
            "file_name": "a.bin",
            "file_size": 10,
            "content_hash": "0000000000000000000000000000000000000000000000000000000000000000",
            "business_type": "doc"
        }"#;
        let request: InitiateUploadRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.content_type, "application/octet-stream");
        assert!(request.business_id.is_none());
        assert!(request.storage_provider_id.is_none());
    }
}
