//! Typed endpoint methods for the upload API.

use crate::transport::{TransportError, UploadTransport};
use crate::{api_prefix, ApiClient};
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::models::{
    CompleteUploadResponse, InitiateUploadRequest, InitiateUploadResponse, UploadChunkResponse,
    UploadProgressResponse,
};
use uuid::Uuid;

impl ApiClient {
    pub async fn initiate_upload(
        &self,
        request: &InitiateUploadRequest,
    ) -> Result<InitiateUploadResponse, TransportError> {
        self.post_json(&format!("{}/uploads", api_prefix()), request)
            .await
    }

    pub async fn upload_chunk(
        &self,
        upload_id: Uuid,
        chunk_index: i32,
        chunk_hash: Option<&str>,
        body: Bytes,
    ) -> Result<UploadChunkResponse, TransportError> {
        let path = format!(
            "{}/uploads/{}/chunks/{}",
            api_prefix(),
            upload_id,
            chunk_index
        );
        let headers: Vec<(&str, String)> = chunk_hash
            .map(|h| vec![("x-chunk-hash", h.to_string())])
            .unwrap_or_default();

        self.put_bytes(&path, body, &headers).await
    }

    pub async fn get_upload_progress(
        &self,
        upload_id: Uuid,
    ) -> Result<UploadProgressResponse, TransportError> {
        self.get(&format!("{}/uploads/{}/progress", api_prefix(), upload_id))
            .await
    }

    pub async fn complete_upload(
        &self,
        upload_id: Uuid,
    ) -> Result<CompleteUploadResponse, TransportError> {
        self.post_empty(&format!("{}/uploads/{}/complete", api_prefix(), upload_id))
            .await
    }

    pub async fn cancel_upload(&self, upload_id: Uuid) -> Result<(), TransportError> {
        self.delete(&format!("{}/uploads/{}", api_prefix(), upload_id))
            .await
    }
}

/// The HTTP client is the production transport.
#[async_trait]
impl UploadTransport for ApiClient {
    async fn initiate(
        &self,
        request: &InitiateUploadRequest,
    ) -> Result<InitiateUploadResponse, TransportError> {
        self.initiate_upload(request).await
    }

    async fn upload_chunk(
        &self,
        upload_id: Uuid,
        chunk_index: i32,
        chunk_hash: Option<&str>,
        body: Bytes,
    ) -> Result<UploadChunkResponse, TransportError> {
        ApiClient::upload_chunk(self, upload_id, chunk_index, chunk_hash, body).await
    }

    async fn progress(&self, upload_id: Uuid) -> Result<UploadProgressResponse, TransportError> {
        self.get_upload_progress(upload_id).await
    }

    async fn complete(&self, upload_id: Uuid) -> Result<CompleteUploadResponse, TransportError> {
        self.complete_upload(upload_id).await
    }

    async fn cancel(&self, upload_id: Uuid) -> Result<(), TransportError> {
        self.cancel_upload(upload_id).await
    }
}
