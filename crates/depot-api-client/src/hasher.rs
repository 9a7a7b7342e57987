//! Incremental content hashing.
//!
//! Files are hashed over fixed-size read windows so a multi-gigabyte file is
//! never resident in memory.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const READ_WINDOW: usize = 64 * 1024;

/// Hex-encoded SHA-256 of a whole file, plus its size in bytes.
pub async fn hash_file(path: &Path) -> std::io::Result<(String, u64)> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut window = vec![0u8; READ_WINDOW];
    let mut total = 0u64;

    loop {
        let read = file.read(&mut window).await?;
        if read == 0 {
            break;
        }
        hasher.update(&window[..read]);
        total += read as u64;
    }

    Ok((hex::encode(hasher.finalize()), total))
}

/// Hex-encoded SHA-256 of an in-memory buffer (per-chunk hashes).
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
