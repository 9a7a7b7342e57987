//! Aggregate upload progress and the injected reporter.

use depot_core::models::UploadStatus;
use serde::Serialize;
use uuid::Uuid;

/// Aggregate progress of one upload. Folded by the coordinator's single
/// accumulator; chunk workers never touch it.
#[derive(Debug, Clone, Serialize)]
pub struct UploadProgress {
    pub upload_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub uploaded_chunks: i32,
    pub total_chunks: i32,
    /// Percentage (0-100), chunk-granular.
    pub percentage: f64,
    /// Proportional byte estimate.
    pub uploaded_bytes: i64,
    pub status: UploadStatus,
}

impl UploadProgress {
    pub(crate) fn from_counts(
        upload_id: Uuid,
        file_name: &str,
        file_size: i64,
        uploaded_chunks: i32,
        total_chunks: i32,
        status: UploadStatus,
    ) -> Self {
        let (percentage, uploaded_bytes) = if total_chunks > 0 {
            let fraction = uploaded_chunks as f64 / total_chunks as f64;
            (
                (fraction * 100.0).round(),
                (file_size as f64 * fraction).round() as i64,
            )
        } else {
            (100.0, file_size)
        };

        Self {
            upload_id,
            file_name: file_name.to_string(),
            file_size,
            uploaded_chunks,
            total_chunks,
            percentage,
            uploaded_bytes,
            status,
        }
    }
}

/// Progress sink, injected at coordinator construction.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: &UploadProgress);
}

/// Discards progress.
pub struct NoopProgressReporter;

impl ProgressReporter for NoopProgressReporter {
    fn report(&self, _progress: &UploadProgress) {}
}

/// Logs progress through `tracing`.
pub struct TracingProgressReporter;

impl ProgressReporter for TracingProgressReporter {
    fn report(&self, progress: &UploadProgress) {
        tracing::debug!(
            upload_id = %progress.upload_id,
            file_name = %progress.file_name,
            uploaded_chunks = progress.uploaded_chunks,
            total_chunks = progress.total_chunks,
            percentage = progress.percentage,
            status = %progress.status,
            "Upload progress"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_math() {
        let p = UploadProgress::from_counts(
            Uuid::new_v4(),
            "a.bin",
            10 * 1024 * 1024,
            1,
            2,
            UploadStatus::Uploading,
        );
        assert_eq!(p.percentage, 50.0);
        assert_eq!(p.uploaded_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_progress_zero_chunks_is_complete() {
        let p = UploadProgress::from_counts(
            Uuid::new_v4(),
            "a.bin",
            123,
            0,
            0,
            UploadStatus::Completed,
        );
        assert_eq!(p.percentage, 100.0);
        assert_eq!(p.uploaded_bytes, 123);
    }
}
