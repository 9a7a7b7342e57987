//! Test helpers: build AppState and router for HTTP-level tests.
//!
//! The app is wired against the in-memory upload store and a tempdir-backed
//! local storage backend, so the suite runs without external services.

use axum_test::TestServer;
use depot_api::constants;
use depot_api::setup::routes::build_router;
use depot_api::state::AppState;
use depot_core::models::provider::{ProviderKind, StorageProviderDescriptor};
use depot_core::{Config, DedupScope};
use depot_db::MemoryUploadStore;
use depot_services::{ProviderRegistry, UploadConfig, UploadService};
use depot_storage::{LocalStorage, Storage};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// API path prefix for tests (e.g. `/api/v0`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Test application: server plus owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub tenant_id: Uuid,
    pub _temp_dir: TempDir,
}

fn test_config(chunk_size: i64) -> Config {
    Config {
        server_port: 0,
        cors_origins: vec!["*".to_string()],
        environment: "test".to_string(),
        database_url: None,
        db_max_connections: 5,
        db_timeout_seconds: 5,
        chunk_size,
        max_file_size: 100 * 1024 * 1024,
        dedup_scope: DedupScope::Tenant,
        session_ttl_hours: 24,
        cleanup_interval_secs: 0,
        storage_providers_json: None,
        local_storage_path: None,
        local_storage_base_url: None,
    }
}

/// Build a test app with a small chunk size so multi-chunk flows stay tiny.
pub async fn setup_test_app(chunk_size: i64) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(temp_dir.path(), "http://localhost:3000/files".to_string())
            .await
            .expect("local storage"),
    );

    let providers = Arc::new(ProviderRegistry::with_instances(vec![(
        StorageProviderDescriptor {
            id: Uuid::new_v4(),
            name: "test-local".to_string(),
            kind: ProviderKind::Local,
            config: serde_json::json!({}),
            enabled: true,
            priority: 0,
        },
        storage,
    )]));

    let config = test_config(chunk_size);
    let upload = Arc::new(UploadService::new(
        Arc::new(MemoryUploadStore::new()),
        providers,
        UploadConfig {
            chunk_size: config.chunk_size,
            max_file_size: config.max_file_size,
            dedup_scope: config.dedup_scope,
            session_ttl: chrono::Duration::hours(config.session_ttl_hours),
            presign_ttl: Duration::from_secs(60),
        },
    ));

    let state = Arc::new(AppState {
        upload,
        config: config.clone(),
    });

    let router = build_router(state, &config).expect("router");
    let server = TestServer::new(router).expect("test server");

    TestApp {
        server,
        tenant_id: Uuid::new_v4(),
        _temp_dir: temp_dir,
    }
}

impl TestApp {
    /// JSON body for initiating an upload of `data`.
    pub fn initiate_body(&self, data: &[u8], business_type: &str) -> serde_json::Value {
        serde_json::json!({
            "file_name": "data.bin",
            "file_size": data.len(),
            "content_type": "application/octet-stream",
            "content_hash": sha256_hex(data),
            "business_type": business_type,
        })
    }
}
