//! Depot Storage Library
//!
//! Storage abstraction and backends for Depot: the `Storage` trait plus
//! implementations for the local filesystem and S3-compatible object stores.
//!
//! # Key format
//!
//! Storage keys are tenant- and business-scoped:
//!
//! - **Final objects**: `{tenant_id}/{business_type}/{yyyy-mm}/{uuid}{ext}`
//! - **Chunk artifacts**: `{final_key}.chunk.{index}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized
//! in the `keys` module so all backends stay consistent.
//!
//! # Merge contract
//!
//! `merge_chunks` publishes atomically: a failed merge never leaves a partial
//! object visible at the final key, and re-invoking it overwrites cleanly.
//! Chunk artifacts are never deleted by the backend itself; the session
//! manager removes them after a successful merge.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use depot_core::models::provider::ProviderKind;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
