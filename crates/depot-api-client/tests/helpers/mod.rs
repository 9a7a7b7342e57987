//! Test helpers: run the coordinator against an in-process session manager.
//!
//! `LocalTransport` wires `UploadTransport` straight into a real
//! `UploadService` (in-memory store, tempdir-backed local storage), mapping
//! service errors through their HTTP metadata exactly as the HTTP stack
//! would. Decorators add failure injection and concurrency accounting.

use async_trait::async_trait;
use bytes::Bytes;
use depot_api_client::progress::{ProgressReporter, UploadProgress};
use depot_api_client::transport::{TransportError, UploadTransport};
use depot_core::models::provider::{ProviderKind, StorageProviderDescriptor};
use depot_core::models::{
    CompleteUploadResponse, InitiateUploadRequest, InitiateUploadResponse, UploadChunkResponse,
    UploadProgressResponse,
};
use depot_core::{AppError, CallerContext, DedupScope, ErrorMetadata};
use depot_db::MemoryUploadStore;
use depot_services::{ProviderRegistry, UploadConfig, UploadService};
use depot_storage::{LocalStorage, Storage};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// An in-process backend: service + caller + owned storage dir.
pub struct TestBackend {
    pub service: Arc<UploadService>,
    pub ctx: CallerContext,
    pub _temp_dir: TempDir,
}

pub async fn setup_backend(chunk_size: i64) -> TestBackend {
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

    let service = Arc::new(UploadService::new(
        Arc::new(MemoryUploadStore::new()),
        providers,
        UploadConfig {
            chunk_size,
            max_file_size: 100 * 1024 * 1024,
            dedup_scope: DedupScope::Tenant,
            session_ttl: chrono::Duration::hours(24),
            presign_ttl: Duration::from_secs(60),
        },
    ));

    TestBackend {
        service,
        ctx: CallerContext::new(Uuid::new_v4(), Some(Uuid::new_v4())),
        _temp_dir: temp_dir,
    }
}

fn to_transport_error(e: AppError) -> TransportError {
    TransportError::Api {
        status: e.http_status_code(),
        message: e.client_message(),
    }
}

/// Transport that calls the session manager directly.
pub struct LocalTransport {
    service: Arc<UploadService>,
    ctx: CallerContext,
}

impl LocalTransport {
    pub fn new(backend: &TestBackend) -> Self {
        Self {
            service: backend.service.clone(),
            ctx: backend.ctx,
        }
    }
}

#[async_trait]
impl UploadTransport for LocalTransport {
    async fn initiate(
        &self,
        request: &InitiateUploadRequest,
    ) -> Result<InitiateUploadResponse, TransportError> {
        self.service
            .initiate_upload(&self.ctx, request.clone())
            .await
            .map_err(to_transport_error)
    }

    async fn upload_chunk(
        &self,
        upload_id: Uuid,
        chunk_index: i32,
        chunk_hash: Option<&str>,
        body: Bytes,
    ) -> Result<UploadChunkResponse, TransportError> {
        self.service
            .record_chunk(&self.ctx, upload_id, chunk_index, chunk_hash, body)
            .await
            .map_err(to_transport_error)
    }

    async fn progress(&self, upload_id: Uuid) -> Result<UploadProgressResponse, TransportError> {
        self.service
            .get_progress(&self.ctx, upload_id)
            .await
            .map_err(to_transport_error)
    }

    async fn complete(&self, upload_id: Uuid) -> Result<CompleteUploadResponse, TransportError> {
        self.service
            .complete_upload(&self.ctx, upload_id)
            .await
            .map_err(to_transport_error)
    }

    async fn cancel(&self, upload_id: Uuid) -> Result<(), TransportError> {
        self.service
            .cancel_upload(&self.ctx, upload_id)
            .await
            .map_err(to_transport_error)
    }
}

/// Decorator recording uploaded chunk indexes and the in-flight high-water
/// mark. A small delay per chunk forces workers to overlap.
pub struct RecordingTransport {
    inner: Arc<dyn UploadTransport>,
    pub uploaded: Mutex<Vec<i32>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub chunk_delay: Duration,
}

impl RecordingTransport {
    pub fn new(inner: Arc<dyn UploadTransport>) -> Self {
        Self {
            inner,
            uploaded: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            chunk_delay: Duration::from_millis(5),
        }
    }

    pub fn uploaded_indexes(&self) -> Vec<i32> {
        let mut indexes = self.uploaded.lock().expect("uploaded lock").clone();
        indexes.sort_unstable();
        indexes
    }
}

#[async_trait]
impl UploadTransport for RecordingTransport {
    async fn initiate(
        &self,
        request: &InitiateUploadRequest,
    ) -> Result<InitiateUploadResponse, TransportError> {
        self.inner.initiate(request).await
    }

    async fn upload_chunk(
        &self,
        upload_id: Uuid,
        chunk_index: i32,
        chunk_hash: Option<&str>,
        body: Bytes,
    ) -> Result<UploadChunkResponse, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.chunk_delay).await;
        let result = self
            .inner
            .upload_chunk(upload_id, chunk_index, chunk_hash, body)
            .await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if result.is_ok() {
            self.uploaded
                .lock()
                .expect("uploaded lock")
                .push(chunk_index);
        }

        result
    }

    async fn progress(&self, upload_id: Uuid) -> Result<UploadProgressResponse, TransportError> {
        self.inner.progress(upload_id).await
    }

    async fn complete(&self, upload_id: Uuid) -> Result<CompleteUploadResponse, TransportError> {
        self.inner.complete(upload_id).await
    }

    async fn cancel(&self, upload_id: Uuid) -> Result<(), TransportError> {
        self.inner.cancel(upload_id).await
    }
}

/// Decorator failing configured chunk indexes with transient errors a fixed
/// number of times before letting them through.
pub struct FlakyTransport {
    inner: Arc<dyn UploadTransport>,
    failures: Mutex<HashMap<i32, u32>>,
    pub attempts: Mutex<HashMap<i32, u32>>,
}

impl FlakyTransport {
    pub fn new(inner: Arc<dyn UploadTransport>, failures: HashMap<i32, u32>) -> Self {
        Self {
            inner,
            failures: Mutex::new(failures),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn attempts_for(&self, index: i32) -> u32 {
        *self
            .attempts
            .lock()
            .expect("attempts lock")
            .get(&index)
            .unwrap_or(&0)
    }
}

#[async_trait]
impl UploadTransport for FlakyTransport {
    async fn initiate(
        &self,
        request: &InitiateUploadRequest,
    ) -> Result<InitiateUploadResponse, TransportError> {
        self.inner.initiate(request).await
    }

    async fn upload_chunk(
        &self,
        upload_id: Uuid,
        chunk_index: i32,
        chunk_hash: Option<&str>,
        body: Bytes,
    ) -> Result<UploadChunkResponse, TransportError> {
        *self
            .attempts
            .lock()
            .expect("attempts lock")
            .entry(chunk_index)
            .or_insert(0) += 1;

        {
            let mut failures = self.failures.lock().expect("failures lock");
            if let Some(left) = failures.get_mut(&chunk_index) {
                if *left > 0 {
                    *left -= 1;
                    return Err(TransportError::Transient(format!(
                        "injected failure for chunk {}",
                        chunk_index
                    )));
                }
            }
        }

        self.inner
            .upload_chunk(upload_id, chunk_index, chunk_hash, body)
            .await
    }

    async fn progress(&self, upload_id: Uuid) -> Result<UploadProgressResponse, TransportError> {
        self.inner.progress(upload_id).await
    }

    async fn complete(&self, upload_id: Uuid) -> Result<CompleteUploadResponse, TransportError> {
        self.inner.complete(upload_id).await
    }

    async fn cancel(&self, upload_id: Uuid) -> Result<(), TransportError> {
        self.inner.cancel(upload_id).await
    }
}

/// Reporter that collects every progress event.
#[derive(Default)]
pub struct CollectingReporter {
    pub events: Mutex<Vec<UploadProgress>>,
}

impl ProgressReporter for CollectingReporter {
    fn report(&self, progress: &UploadProgress) {
        self.events.lock().expect("events lock").push(progress.clone());
    }
}

/// Write a file into `dir` and return its path.
pub fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, data).expect("write test file");
    path
}
