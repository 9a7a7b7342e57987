//! API constants.

/// Prefix for all versioned API routes.
pub const API_PREFIX: &str = "/api/v0";

/// Slack added on top of the configured chunk size for the request body limit
/// (headers, rounding).
pub const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Default TTL for presigned download URLs (seconds).
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 30 * 60;
