//! Upload Session Manager.

mod service;

pub use service::{UploadConfig, UploadService};
