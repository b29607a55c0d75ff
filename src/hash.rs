//! Content hashing.
//!
//! Identities in the crate (graph hash, cache key, blob id) are
//! hex-encoded SHA-256 digests. Structured values are hashed as
//! canonical JSON: routed through `serde_json::Value`, whose map type is
//! ordered, so object keys come out sorted.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::Result;

/// Hex SHA-256 of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hex SHA-256 over several byte segments, each length-prefixed so that
/// segment boundaries cannot be shifted to forge a collision.
pub fn sha256_hex_parts(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Serialize with sorted object keys and no whitespace.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let tree = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&tree)?)
}
