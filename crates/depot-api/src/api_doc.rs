//! OpenAPI documentation.

use crate::error;
use crate::handlers;
use depot_core::models;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Depot API",
        version = "0.1.0",
        description = "Chunked, resumable file-upload service: sessions with \
            content-hash dedup, idempotent chunk acknowledgment, resumable \
            progress, pluggable storage backends, and presigned downloads. \
            All endpoints are versioned under /api/v0/."
    ),
    paths(
        handlers::upload::initiate_upload,
        handlers::upload::upload_chunk,
        handlers::upload::get_upload_progress,
        handlers::upload::complete_upload,
        handlers::upload::cancel_upload,
        handlers::files::get_attachment_url,
        handlers::files::download_attachment,
    ),
    components(schemas(
        models::InitiateUploadRequest,
        models::InitiateUploadResponse,
        models::UploadChunkResponse,
        models::UploadProgressResponse,
        models::CompleteUploadResponse,
        models::AttachmentUrlResponse,
        models::UploadStatus,
        error::ErrorResponse,
    )),
    tags(
        (name = "uploads", description = "Chunked upload session lifecycle"),
        (name = "files", description = "Stored attachment access")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
