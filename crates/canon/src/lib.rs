//! Chainbank canon - RFC 8785 canonical JSON
//!
//! Canonical JSON is the cross-boundary contract of the ledger: event
//! payloads and snapshot payloads are persisted both as plain JSON and as
//! JCS bytes, and every payload digest is SHA-256 over the canonical form.
//!
//! All digest computation flows through [`CanonicalBytes`]. There is no
//! `sha256` over raw `serde_json::to_vec` output anywhere in the workspace;
//! the type system funnels every hashing path through canonicalization or
//! an explicitly typed builder.

pub mod jcs;

pub use jcs::{canonicalize, parse, CanonError, CanonicalBytes};

use sha2::{Digest, Sha256};

/// SHA-256 over canonical UTF-8 bytes.
pub fn sha256(bytes: &CanonicalBytes) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_bytes());
    hasher.finalize().into()
}

/// Hex-encoded SHA-256 over canonical UTF-8 bytes.
pub fn sha256_hex(bytes: &CanonicalBytes) -> String {
    hex::encode(sha256(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest_is_stable_across_key_order() {
        let a = canonicalize(&json!({"b": 1, "a": 2})).unwrap();
        let b = canonicalize(&json!({"a": 2, "b": 1})).unwrap();
        assert_eq!(sha256(&a), sha256(&b));
        assert_eq!(sha256_hex(&a).len(), 64);
    }
}
