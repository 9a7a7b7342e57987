//! Depot Core Library
//!
//! This crate provides the domain models, error types, configuration, and
//! validation shared across all Depot components. It performs no I/O; storage
//! backends live in `depot-storage` and persistence in `depot-db`.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, DedupScope};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::context::CallerContext;
