//! Shared constants.

/// Default chunk size handed to clients at initiation (5 MiB).
pub const DEFAULT_CHUNK_SIZE: i64 = 5 * 1024 * 1024;

/// Default maximum accepted file size (5 GiB).
pub const DEFAULT_MAX_FILE_SIZE: i64 = 5 * 1024 * 1024 * 1024;

/// Upper bound on chunks per session; callers must raise the chunk size
/// instead of exceeding it.
pub const MAX_CHUNK_COUNT: i32 = 10_000;

/// Default lifetime of an Uploading session before the sweeper cancels it.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Length of a hex-encoded SHA-256 content hash.
pub const CONTENT_HASH_LEN: usize = 64;
