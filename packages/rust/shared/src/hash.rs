//! Content fingerprinting for change detection.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the full SHA-256 digest.
///
/// 64 bits of hash is ample for equality checks over a corpus of hundreds
/// of sections; this is not a security boundary.
const HASH_PREFIX_LEN: usize = 16;

/// Deterministic fingerprint of rendered content.
///
/// SHA-256, lowercase hex, truncated to [`HASH_PREFIX_LEN`] characters.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..HASH_PREFIX_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_fixed_length_hex() {
        let h = content_hash("<p>Some section body.</p>");
        assert_eq!(h.len(), 16);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
    }

    #[test]
    fn single_character_change_changes_hash() {
        let a = content_hash("<p>Guardrail height shall be 42 inches.</p>");
        let b = content_hash("<p>Guardrail height shall be 43 inches.</p>");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_content_hashes() {
        // Truncated sha256 of the empty string, stable across runs.
        assert_eq!(content_hash(""), "e3b0c44298fc1c14");
    }
}
