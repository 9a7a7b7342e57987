//! Router assembly: API routes, OpenAPI document, and middleware layers.

use crate::api_doc::get_openapi_spec;
use crate::constants::{API_PREFIX, BODY_LIMIT_SLACK};
use crate::handlers::files::{download_attachment, get_attachment_url};
use crate::handlers::health::health;
use crate::handlers::upload::{
    cancel_upload, complete_upload, get_upload_progress, initiate_upload, upload_chunk,
};
use crate::state::AppState;
use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use depot_core::Config;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router against the given state.
/// Tests call this directly with in-memory stores.
pub fn build_router(state: Arc<AppState>, config: &Config) -> Result<Router> {
    let cors = setup_cors(config)?;
    // Chunk bodies plus slack; everything else is far smaller.
    let body_limit = state.upload.chunk_size() as usize + BODY_LIMIT_SLACK;

    let api = Router::new()
        .route("/uploads", post(initiate_upload))
        .route(
            "/uploads/{upload_id}/chunks/{chunk_index}",
            put(upload_chunk),
        )
        .route("/uploads/{upload_id}/progress", get(get_upload_progress))
        .route("/uploads/{upload_id}/complete", post(complete_upload))
        .route("/uploads/{upload_id}", delete(cancel_upload))
        .route("/files/{attachment_id}/url", get(get_attachment_url))
        .route("/files/{attachment_id}/download", get(download_attachment));

    let router = Router::new()
        .nest(API_PREFIX, api)
        .route("/health", get(health))
        .route(
            "/api/openapi.json",
            get(|| async { Json(get_openapi_spec()) }),
        )
        .nest(
            "/docs",
            utoipa_rapidoc::RapiDoc::new("/api/openapi.json")
                .path("/docs")
                .into(),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}

fn setup_cors(config: &Config) -> Result<CorsLayer> {
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Ok(cors)
}
