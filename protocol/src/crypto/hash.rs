//! # Hashing Utilities
//!
//! BLAKE3 is the only hash function Tally uses. It derives addresses, debt
//! identifiers and every signed message digest.
//!
//! Signed messages go through [`domain_separated_hash`], which runs BLAKE3 in
//! `derive_key` mode with a per-operation context string. Two operations whose
//! packed fields happen to be byte-identical still hash to unrelated digests.

/// Compute the BLAKE3 hash of the input data.
///
/// # Example
///
/// ```
/// use tally_protocol::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"tally");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Compute a domain-separated hash using BLAKE3 with a context string.
///
/// Uses BLAKE3's `derive_key` mode: the context selects a different internal
/// IV, so cross-context collisions are impossible by construction rather
/// than by convention.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Hash multiple byte slices together without concatenation overhead.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
