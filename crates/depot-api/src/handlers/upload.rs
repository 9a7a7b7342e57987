//! Chunked upload handlers.
//!
//! The full session protocol: initiate (with hash dedup), per-chunk PUT with
//! idempotent acknowledgment, progress for resume, completion (merge), and
//! cancellation.

use crate::auth::TenantContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use depot_core::models::{
    CompleteUploadResponse, InitiateUploadRequest, InitiateUploadResponse, UploadChunkResponse,
    UploadProgressResponse,
};
use std::sync::Arc;
use uuid::Uuid;

/// Optional per-chunk SHA-256, verified server-side when present.
pub const CHUNK_HASH_HEADER: &str = "x-chunk-hash";

/// Start a chunked upload session
#[utoipa::path(
    post,
    path = "/api/v0/uploads",
    tag = "uploads",
    request_body = InitiateUploadRequest,
    responses(
        (status = 200, description = "Upload session created or instant upload", body = InitiateUploadResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn initiate_upload(
    tenant_ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Json(request): Json<InitiateUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state
        .upload
        .initiate_upload(&tenant_ctx.caller(), request)
        .await?;

    Ok(Json(response))
}

/// Upload one chunk
#[utoipa::path(
    put,
    path = "/api/v0/uploads/{upload_id}/chunks/{chunk_index}",
    tag = "uploads",
    params(
        ("upload_id" = Uuid, Path, description = "Upload session ID"),
        ("chunk_index" = i32, Path, description = "Chunk index (0-based)")
    ),
    request_body(content = Vec<u8>, description = "Raw chunk bytes", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Chunk recorded (idempotent)", body = UploadChunkResponse),
        (status = 400, description = "Size or hash mismatch", body = ErrorResponse),
        (status = 404, description = "Session or chunk not found", body = ErrorResponse),
        (status = 409, description = "Session no longer accepts chunks", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn upload_chunk(
    tenant_ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path((upload_id, chunk_index)): Path<(Uuid, i32)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let chunk_hash = headers
        .get(CHUNK_HASH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let response = state
        .upload
        .record_chunk(
            &tenant_ctx.caller(),
            upload_id,
            chunk_index,
            chunk_hash.as_deref(),
            body,
        )
        .await?;

    Ok(Json(response))
}

/// Get upload progress
///
/// `uploaded_chunk_indexes` is the authoritative set a restarted client
/// resumes from.
#[utoipa::path(
    get,
    path = "/api/v0/uploads/{upload_id}/progress",
    tag = "uploads",
    params(
        ("upload_id" = Uuid, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Upload progress", body = UploadProgressResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn get_upload_progress(
    tenant_ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path(upload_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state
        .upload
        .get_progress(&tenant_ctx.caller(), upload_id)
        .await?;

    Ok(Json(response))
}

/// Complete a chunked upload by merging all chunks
#[utoipa::path(
    post,
    path = "/api/v0/uploads/{upload_id}/complete",
    tag = "uploads",
    params(
        ("upload_id" = Uuid, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Upload completed", body = CompleteUploadResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Chunks missing or session terminal", body = ErrorResponse),
        (status = 500, description = "Merge failed; session marked failed, completion may be retried", body = ErrorResponse)
    )
)]
pub async fn complete_upload(
    tenant_ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path(upload_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state
        .upload
        .complete_upload(&tenant_ctx.caller(), upload_id)
        .await?;

    Ok(Json(response))
}

/// Cancel an upload session
///
/// Idempotent; chunk artifacts are cleaned up asynchronously.
#[utoipa::path(
    delete,
    path = "/api/v0/uploads/{upload_id}",
    tag = "uploads",
    params(
        ("upload_id" = Uuid, Path, description = "Upload session ID")
    ),
    responses(
        (status = 204, description = "Upload cancelled"),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn cancel_upload(
    tenant_ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path(upload_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    state
        .upload
        .cancel_upload(&tenant_ctx.caller(), upload_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
