//! Input validation helpers shared by the session manager and the API layer.

use crate::constants::CONTENT_HASH_LEN;
use crate::error::AppError;

/// Validate a hex-encoded SHA-256 content hash.
pub fn validate_content_hash(hash: &str) -> Result<(), AppError> {
    if hash.len() != CONTENT_HASH_LEN {
        return Err(AppError::InvalidInput(format!(
            "Content hash must be {} hex characters, got {}",
            CONTENT_HASH_LEN,
            hash.len()
        )));
    }

    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::InvalidInput(
            "Content hash contains non-hex characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate an original filename: non-empty, bounded, no path separators.
pub fn validate_file_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() || name.len() > 255 {
        return Err(AppError::InvalidInput(
            "Filename must be between 1 and 255 characters".to_string(),
        ));
    }

    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(AppError::InvalidInput(format!(
            "Filename contains invalid characters: {}",
            name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_content_hash() {
        let hash = "a".repeat(64);
        assert!(validate_content_hash(&hash).is_ok());
    }

    #[test]
    fn test_content_hash_wrong_length() {
        assert!(validate_content_hash("abc123").is_err());
        assert!(validate_content_hash(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_content_hash_non_hex() {
        let hash = format!("{}zz", "a".repeat(62));
        assert!(validate_content_hash(&hash).is_err());
    }

    #[test]
    fn test_file_name_rejects_traversal() {
        assert!(validate_file_name("report.pdf").is_ok());
        assert!(validate_file_name("../etc/passwd").is_err());
        assert!(validate_file_name("a/b.txt").is_err());
        assert!(validate_file_name("").is_err());
    }
}
