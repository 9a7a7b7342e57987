//! Depot Services
//!
//! The Upload Session Manager (`UploadService`), the storage-provider
//! registry, and the background cleanup sweeper.

pub mod cleanup;
pub mod providers;
pub mod upload;

pub use cleanup::CleanupService;
pub use providers::ProviderRegistry;
pub use upload::{UploadConfig, UploadService};
