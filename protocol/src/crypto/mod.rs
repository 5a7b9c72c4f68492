//! # Cryptographic Primitives for Tally
//!
//! Everything security-related in the protocol flows through here: keys,
//! signatures and hashing.
//!
//! - **Ed25519** for signatures.
//! - **BLAKE3** for addresses, identifiers and message digests.
//!
//! Everything here is a thin, type-safe wrapper around audited
//! implementations.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_hash, domain_separated_hash};
pub use keys::{Identity, Keypair, Signature};
pub use signatures::{recover, sign, verify, Ed25519Verifier, SignatureError, SignatureVerifier};
