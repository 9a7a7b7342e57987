//! Durable resume state.
//!
//! The coordinator persists one `StoredUploadTask` per session behind the
//! small `TaskStore` port, so the backing mechanism (a directory of JSON
//! files, or memory in tests) can change without touching coordinator logic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Resume state for one in-flight upload, persisted after every chunk so a
/// crash loses at most the chunk that was in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUploadTask {
    pub upload_id: Uuid,
    pub file_path: PathBuf,
    pub file_name: String,
    pub file_size: i64,
    pub content_hash: String,
    pub content_type: String,
    pub business_type: String,
    pub business_id: Option<String>,
    pub chunk_size: i64,
    pub total_chunks: i32,
    /// Locally confirmed chunk indexes. Server truth still wins on resume.
    pub completed_chunks: BTreeSet<i32>,
    pub created_at: DateTime<Utc>,
}

impl StoredUploadTask {
    /// Indexes not yet confirmed, ascending.
    pub fn remaining_chunks(&self) -> Vec<i32> {
        (0..self.total_chunks)
            .filter(|i| !self.completed_chunks.contains(i))
            .collect()
    }
}

/// Key-value persistence port for resume state.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, upload_id: Uuid) -> Result<Option<StoredUploadTask>, anyhow::Error>;
    async fn put(&self, task: &StoredUploadTask) -> Result<(), anyhow::Error>;
    async fn delete(&self, upload_id: Uuid) -> Result<(), anyhow::Error>;
    /// All stored tasks (for listing resumable uploads after a restart).
    async fn list(&self) -> Result<Vec<StoredUploadTask>, anyhow::Error>;
}

/// File-backed task store: one JSON document per task, written to a temp file
/// and renamed so a crash never leaves a torn document.
pub struct FileTaskStore {
    dir: PathBuf,
}

impl FileTaskStore {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, anyhow::Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn task_path(&self, upload_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", upload_id))
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn get(&self, upload_id: Uuid) -> Result<Option<StoredUploadTask>, anyhow::Error> {
        let path = self.task_path(upload_id);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(task) => Ok(Some(task)),
            Err(e) => {
                tracing::warn!(
                    upload_id = %upload_id,
                    error = %e,
                    "Discarding corrupt upload task state"
                );
                Ok(None)
            }
        }
    }

    async fn put(&self, task: &StoredUploadTask) -> Result<(), anyhow::Error> {
        let path = self.task_path(task.upload_id);
        let tmp = self.dir.join(format!("{}.json.tmp", task.upload_id));

        let raw = serde_json::to_vec_pretty(task)?;
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&raw).await?;
        file.sync_all().await?;
        fs::rename(&tmp, &path).await?;

        Ok(())
    }

    async fn delete(&self, upload_id: Uuid) -> Result<(), anyhow::Error> {
        match fs::remove_file(self.task_path(upload_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<StoredUploadTask>, anyhow::Error> {
        let mut tasks = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(raw) = fs::read_to_string(&path).await else {
                continue;
            };
            if let Ok(task) = serde_json::from_str(&raw) {
                tasks.push(task);
            }
        }

        Ok(tasks)
    }
}

/// In-memory task store for tests.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<Uuid, StoredUploadTask>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn get(&self, upload_id: Uuid) -> Result<Option<StoredUploadTask>, anyhow::Error> {
        Ok(self.tasks.lock().await.get(&upload_id).cloned())
    }

    async fn put(&self, task: &StoredUploadTask) -> Result<(), anyhow::Error> {
        self.tasks.lock().await.insert(task.upload_id, task.clone());
        Ok(())
    }

    async fn delete(&self, upload_id: Uuid) -> Result<(), anyhow::Error> {
        self.tasks.lock().await.remove(&upload_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StoredUploadTask>, anyhow::Error> {
        Ok(self.tasks.lock().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(upload_id: Uuid) -> StoredUploadTask {
        StoredUploadTask {
            upload_id,
            file_path: PathBuf::from("/tmp/data.bin"),
            file_name: "data.bin".to_string(),
            file_size: 20,
            content_hash: "a".repeat(64),
            content_type: "application/octet-stream".to_string(),
            business_type: "doc".to_string(),
            business_id: None,
            chunk_size: 8,
            total_chunks: 3,
            completed_chunks: BTreeSet::from([0, 2]),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_remaining_chunks_is_complement() {
        let t = task(Uuid::new_v4());
        assert_eq!(t.remaining_chunks(), vec![1]);
    }

    #[tokio::test]
    async fn test_file_store_round_trip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let upload_id = Uuid::new_v4();

        {
            let store = FileTaskStore::new(dir.path()).await.unwrap();
            store.put(&task(upload_id)).await.unwrap();
        }

        // Fresh store over the same directory, as after a process restart.
        let store = FileTaskStore::new(dir.path()).await.unwrap();
        let loaded = store.get(upload_id).await.unwrap().unwrap();
        assert_eq!(loaded.upload_id, upload_id);
        assert_eq!(loaded.completed_chunks, BTreeSet::from([0, 2]));

        assert_eq!(store.list().await.unwrap().len(), 1);

        store.delete(upload_id).await.unwrap();
        assert!(store.get(upload_id).await.unwrap().is_none());
        // Deleting again is fine.
        store.delete(upload_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_ignores_corrupt_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTaskStore::new(dir.path()).await.unwrap();
        let upload_id = Uuid::new_v4();

        fs::write(dir.path().join(format!("{}.json", upload_id)), b"not json")
            .await
            .unwrap();

        assert!(store.get(upload_id).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }
}
