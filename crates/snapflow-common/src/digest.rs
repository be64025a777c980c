//! Content digest utilities
//!
//! Captures and individual items are identified by a 128-bit content
//! digest of their serialized JSON. The capture-level digest feeds the
//! raw object key and the deterministic record id; the per-item digest
//! is stored as the record fingerprint for external auditing.

use serde::Serialize;

use crate::error::Result;

/// Number of digest characters folded into a deterministic record id.
pub const ID_HASH_PREFIX_LEN: usize = 8;

/// Compute the hex digest of a byte slice.
pub fn content_digest(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Compute the hex digest of a value's JSON serialization.
pub fn value_digest<T: Serialize>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(content_digest(&bytes))
}

/// Derive the deterministic curated-record id.
///
/// Pure function of `(source, native item id, capture digest)`: replaying
/// the same capture always recomputes the same id, which is what makes the
/// insert-only-if-absent write an idempotent dedup.
pub fn record_id(source: &str, native_id: &str, content_hash: &str) -> String {
    let prefix = &content_hash[..content_hash.len().min(ID_HASH_PREFIX_LEN)];
    format!("{source}-{native_id}-{prefix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_digest_known_vector() {
        assert_eq!(content_digest(b"hello world"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_value_digest_matches_serialized_bytes() {
        let value = serde_json::json!({"id": 1, "title": "a"});
        let bytes = serde_json::to_vec(&value).unwrap();
        assert_eq!(value_digest(&value).unwrap(), content_digest(&bytes));
    }

    #[test]
    fn test_record_id_is_deterministic() {
        let a = record_id("jsonplaceholder", "42", "5eb63bbbe01eeed093cb22bb8f5acdc3");
        let b = record_id("jsonplaceholder", "42", "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(a, b);
        assert_eq!(a, "jsonplaceholder-42-5eb63bbb");
    }

    #[test]
    fn test_record_id_with_short_hash() {
        assert_eq!(record_id("src", "1", "abc"), "src-1-abc");
    }
}
