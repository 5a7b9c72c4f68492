//! # Digital Signatures
//!
//! Signing and signer recovery over protocol message digests.
//!
//! Every privileged vault or clearing-house operation is authorized by one or
//! two signatures over a [`Digest`]. Contracts never look at ambient caller
//! context; they ask a [`SignatureVerifier`] which identity signed the digest
//! and then check that identity against an owner or signer set.
//!
//! ## Strictness
//!
//! Verification uses `ed25519-dalek`'s strict mode, which rejects
//! small-order keys and non-canonical signatures that lenient verifiers
//! accept.

use thiserror::Error;

use super::keys::{Identity, Keypair, Signature};
use crate::digest::Digest;

/// Errors during signature operations.
///
/// Intentionally vague: we don't tell callers why verification failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignatureBytes,
}

/// The signature-recovery capability contracts are given.
///
/// Implementations return the identity that produced `signature` over
/// `digest`, or fail. They must be pure: the same inputs always yield the
/// same answer.
pub trait SignatureVerifier: Send + Sync {
    fn recover(&self, digest: &Digest, signature: &Signature) -> Result<Identity, SignatureError>;
}

/// Production verifier backed by strict Ed25519 verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn recover(&self, digest: &Digest, signature: &Signature) -> Result<Identity, SignatureError> {
        recover(digest, signature)
    }
}

/// Sign a message digest.
///
/// # Example
///
/// ```
/// use tally_protocol::crypto::{recover, sign, Keypair};
/// use tally_protocol::digest::Digest;
///
/// let keypair = Keypair::generate();
/// let digest = Digest::from_bytes([7u8; 32]);
/// let signature = sign(&keypair, &digest);
///
/// assert_eq!(recover(&digest, &signature).unwrap(), keypair.identity());
/// ```
pub fn sign(keypair: &Keypair, digest: &Digest) -> Signature {
    keypair.sign(digest.as_bytes())
}

/// Verify `signature` over `digest` and return the signer identity.
pub fn recover(digest: &Digest, signature: &Signature) -> Result<Identity, SignatureError> {
    if signature.as_bytes().len() != 64 {
        return Err(SignatureError::InvalidSignatureBytes);
    }
    let signer = *signature.claimed_signer();
    if signer.verify(digest.as_bytes(), signature) {
        Ok(signer)
    } else {
        Err(SignatureError::VerificationFailed)
    }
}

/// Returns `true` if `signature` is a valid signature by `identity` over `digest`.
pub fn verify(identity: &Identity, digest: &Digest, signature: &Signature) -> bool {
    identity.verify(digest.as_bytes(), signature)
}
