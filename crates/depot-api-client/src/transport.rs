//! Transport seam between the coordinator and the upload API.
//!
//! The coordinator only talks through `UploadTransport`, so tests can run it
//! against an in-process session manager and production uses the HTTP client.

use async_trait::async_trait;
use bytes::Bytes;
use depot_core::models::{
    CompleteUploadResponse, InitiateUploadRequest, InitiateUploadResponse, UploadChunkResponse,
    UploadProgressResponse,
};
use uuid::Uuid;

/// Transport failures, split by how the coordinator should react.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection-level failure (refused, reset, timeout). Retried by the
    /// worker's bounded retry loop.
    #[error("Transient transport error: {0}")]
    Transient(String),

    /// The server answered with a non-success status. 5xx responses are
    /// retried like transient failures; 4xx surface immediately.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl TransportError {
    /// Whether a retry can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Transient(_) => true,
            TransportError::Api { status, .. } => *status >= 500,
        }
    }

    /// Whether this is a 409 Conflict (terminal session or completion guard).
    pub fn is_conflict(&self) -> bool {
        matches!(self, TransportError::Api { status: 409, .. })
    }
}

/// The five operations of the upload protocol.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn initiate(
        &self,
        request: &InitiateUploadRequest,
    ) -> Result<InitiateUploadResponse, TransportError>;

    async fn upload_chunk(
        &self,
        upload_id: Uuid,
        chunk_index: i32,
        chunk_hash: Option<&str>,
        body: Bytes,
    ) -> Result<UploadChunkResponse, TransportError>;

    async fn progress(&self, upload_id: Uuid) -> Result<UploadProgressResponse, TransportError>;

    async fn complete(&self, upload_id: Uuid) -> Result<CompleteUploadResponse, TransportError>;

    async fn cancel(&self, upload_id: Uuid) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Transient("reset".to_string()).is_transient());
        assert!(TransportError::Api {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_transient());
        assert!(!TransportError::Api {
            status: 409,
            message: "conflict".to_string()
        }
        .is_transient());
        assert!(TransportError::Api {
            status: 409,
            message: "conflict".to_string()
        }
        .is_conflict());
    }
}
