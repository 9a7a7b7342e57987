//! Attachment access: presigned URLs and proxied downloads.

use crate::auth::TenantContext;
use crate::constants::DEFAULT_PRESIGN_TTL_SECS;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use depot_core::models::AttachmentUrlResponse;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PresignQuery {
    /// Seconds the URL stays valid
    pub ttl_secs: Option<u64>,
}

/// Get a presigned/temporary URL for an attachment
#[utoipa::path(
    get,
    path = "/api/v0/files/{attachment_id}/url",
    tag = "files",
    params(
        ("attachment_id" = Uuid, Path, description = "Attachment ID"),
        PresignQuery
    ),
    responses(
        (status = 200, description = "Access URL", body = AttachmentUrlResponse),
        (status = 404, description = "Attachment not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn get_attachment_url(
    tenant_ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path(attachment_id): Path<Uuid>,
    Query(query): Query<PresignQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let ttl_secs = query.ttl_secs.unwrap_or(DEFAULT_PRESIGN_TTL_SECS);
    let url = state
        .upload
        .attachment_url(
            &tenant_ctx.caller(),
            attachment_id,
            Duration::from_secs(ttl_secs),
        )
        .await?;

    Ok(Json(AttachmentUrlResponse {
        attachment_id,
        url,
        ttl_secs,
    }))
}

/// Download an attachment as a proxied byte stream
#[utoipa::path(
    get,
    path = "/api/v0/files/{attachment_id}/download",
    tag = "files",
    params(
        ("attachment_id" = Uuid, Path, description = "Attachment ID")
    ),
    responses(
        (status = 200, description = "File bytes", content_type = "application/octet-stream"),
        (status = 404, description = "Attachment not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn download_attachment(
    tenant_ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path(attachment_id): Path<Uuid>,
) -> Result<Response, HttpAppError> {
    let (attachment, stream) = state
        .upload
        .attachment_stream(&tenant_ctx.caller(), attachment_id)
        .await?;

    tracing::debug!(
        attachment_id = %attachment_id,
        file_name = %attachment.file_name,
        size_bytes = attachment.file_size,
        "Streaming attachment download"
    );

    let response = Response::builder()
        .header(header::CONTENT_TYPE, attachment.content_type)
        .header(header::CONTENT_LENGTH, attachment.file_size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", attachment.file_name),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| depot_core::AppError::Internal(e.to_string()))?;

    Ok(response)
}
