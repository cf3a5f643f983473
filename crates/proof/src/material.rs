//! Event hash material
//!
//! Each event row's `hash` is SHA-256 over a length-prefixed concatenation
//! of its fields. Length prefixing makes the encoding unambiguous: no
//! separator collision, no field-boundary confusion. The exact layout is
//!
//! `lp(seq) lp(prev_hash_hex) lp(event_id) lp(created_at) lp(event_type)
//!  lp(aggregate_type) lp(aggregate_id) lp(correlation_id)
//!  lp(payload_hash_hex)`
//!
//! where `lp(s) = decimal_byte_length(s) ":" s` and an empty field encodes
//! as `"0:"`. All fields are ASCII (decimal seq, hex digests, UUID strings,
//! ISO-8601 UTC instants, trimmed identifiers), so byte length equals
//! character length.

use sha2::{Digest, Sha256};

/// The fields hashed into an event row's `hash`.
///
/// `prev_hash_hex` is empty for seq 1. `created_at` is the storage-assigned
/// instant in `YYYY-MM-DDTHH:MM:SS.ssssssZ` form.
#[derive(Debug, Clone, Copy)]
pub struct EventMaterial<'a> {
    pub seq: i64,
    pub prev_hash_hex: &'a str,
    pub event_id: &'a str,
    pub created_at: &'a str,
    pub event_type: &'a str,
    pub aggregate_type: &'a str,
    pub aggregate_id: &'a str,
    pub correlation_id: &'a str,
    pub payload_hash_hex: &'a str,
}

impl EventMaterial<'_> {
    /// The length-prefixed byte encoding.
    pub fn encode(&self) -> Vec<u8> {
        let seq = self.seq.to_string();
        let mut out = Vec::with_capacity(192);
        lp(&mut out, &seq);
        lp(&mut out, self.prev_hash_hex);
        lp(&mut out, self.event_id);
        lp(&mut out, self.created_at);
        lp(&mut out, self.event_type);
        lp(&mut out, self.aggregate_type);
        lp(&mut out, self.aggregate_id);
        lp(&mut out, self.correlation_id);
        lp(&mut out, self.payload_hash_hex);
        out
    }

    /// SHA-256 over the encoded material.
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.encode());
        hasher.finalize().into()
    }

    /// Hex form of [`EventMaterial::hash`].
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }
}

fn lp(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(s.as_bytes());
}
