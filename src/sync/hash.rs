//! Content hashing for sync operations.
//!
//! SHA256 fingerprints of page bodies let the status report compare the
//! store against disk without holding both copies side by side. Bodies are
//! trimmed before hashing so that trailing newlines added by editors do
//! not count as changes.

use sha2::{Digest, Sha256};

/// Compute a SHA256 hash of a page body.
#[must_use]
pub fn content_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check if content has changed relative to a stored hash.
///
/// Returns `true` if:
/// - There is no stored hash (never written)
/// - The current hash differs from the stored hash
///
/// Returns `false` if the hashes match (no change).
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_deterministic() {
        let hash1 = content_hash("# Setup\n\nInstall things.");
        let hash2 = content_hash("# Setup\n\nInstall things.");

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA256 produces 64 hex chars
    }

    #[test]
    fn test_content_hash_ignores_surrounding_whitespace() {
        assert_eq!(content_hash("body\n"), content_hash("body"));
        assert_ne!(content_hash("body"), content_hash("Body"));
    }

    #[test]
    fn test_has_changed_no_stored_hash() {
        assert!(has_changed("abc123", None));
    }

    #[test]
    fn test_has_changed_different_hash() {
        assert!(has_changed("abc123", Some("xyz789")));
    }

    #[test]
    fn test_has_changed_same_hash() {
        assert!(!has_changed("abc123", Some("abc123")));
    }
}
