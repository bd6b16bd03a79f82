//! Content hashing for sync operations.
//!
//! The freshness check only treats a newer JSONL file as a reason to refuse
//! direct reads when its bytes actually differ from what was last imported.

use sha2::{Digest, Sha256};

/// SHA-256 of raw bytes, as lowercase hex.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Check if content has changed since it was last recorded.
///
/// Returns `true` if there is no stored hash or it differs.
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic_hex() {
        let a = content_hash(b"{\"id\":\"BD-1\"}\n");
        let b = content_hash(b"{\"id\":\"BD-1\"}\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, content_hash(b"{\"id\":\"BD-2\"}\n"));
    }

    #[test]
    fn test_has_changed() {
        assert!(has_changed("abc", None));
        assert!(has_changed("abc", Some("def")));
        assert!(!has_changed("abc", Some("abc")));
    }
}
