//! Background cleanup of expired upload sessions.

mod service;

pub use service::CleanupService;
