//! Storage key layout.
//!
//! Centralized so every backend and the session manager agree on where final
//! objects and chunk artifacts live.

use chrono::Utc;
use uuid::Uuid;

/// Final object key: `{tenant_id}/{business_type}/{yyyy-mm}/{uuid}{ext}`.
/// The original filename only contributes its extension; the stored name is a
/// fresh UUID so collisions and unsafe characters cannot occur.
pub fn final_key(tenant_id: Uuid, business_type: &str, file_name: &str) -> String {
    let month = Utc::now().format("%Y-%m");
    let file_id = Uuid::new_v4();
    match extension(file_name) {
        Some(ext) => format!("{}/{}/{}/{}.{}", tenant_id, business_type, month, file_id, ext),
        None => format!("{}/{}/{}/{}", tenant_id, business_type, month, file_id),
    }
}

/// Chunk artifact key: `{final_key}.chunk.{index}`.
pub fn chunk_key(final_key: &str, chunk_index: i32) -> String {
    format!("{}.chunk.{}", final_key, chunk_index)
}

fn extension(file_name: &str) -> Option<String> {
    let ext = file_name.rsplit('.').next()?;
    if ext.is_empty() || ext.len() > 16 || ext == file_name {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_key_layout() {
        let tenant_id = Uuid::new_v4();
        let key = final_key(tenant_id, "contract", "Quarterly Report.PDF");
        assert!(key.starts_with(&format!("{}/contract/", tenant_id)));
        assert!(key.ends_with(".pdf"));
        assert!(!key.contains(".."));
    }

    #[test]
    fn test_final_key_without_extension() {
        let key = final_key(Uuid::new_v4(), "doc", "README");
        assert!(!key.ends_with('.'));
    }

    #[test]
    fn test_chunk_key_suffix() {
        assert_eq!(chunk_key("t/b/2026-08/x.bin", 3), "t/b/2026-08/x.bin.chunk.3");
    }
}
