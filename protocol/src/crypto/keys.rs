//! # Key Management
//!
//! Ed25519 keypairs, identities and signatures for Tally principals.
//!
//! Every owner and every delegate signer of a vault is an Ed25519 key. The
//! public half is the principal's [`Identity`]; it is what vaults store in
//! their owner and signer sets and what signature recovery returns.
//!
//! ## Recovery without recovery
//!
//! Ed25519 signatures do not let a verifier derive the signer's key from the
//! signature alone (unlike secp256k1 ECDSA). A [`Signature`] therefore carries
//! the claimed signer identity next to the 64 signature bytes. "Recovering" a
//! signature means strictly verifying it against that claimed identity; the
//! identity is only ever returned when verification succeeds.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (ed25519-dalek does this for us).
//! - Key generation uses `OsRng`.
//! - Secret key bytes are never logged or printed in `Debug` output.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during key operations.
///
/// Deliberately terse about *why* something failed.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

/// An Ed25519 keypair held by a vault principal.
///
/// `Keypair` intentionally does NOT implement `Serialize`/`Deserialize`.
/// Exporting a secret key should be a deliberate act: use
/// [`secret_key_bytes`](Self::secret_key_bytes) explicitly.
///
/// # Examples
///
/// ```
/// use tally_protocol::crypto::keys::Keypair;
///
/// let kp = Keypair::generate();
/// let sig = kp.sign(b"retire vault");
/// assert!(kp.identity().verify(b"retire vault", &sig));
/// ```
pub struct Keypair {
    signing_key: SigningKey,
}

/// The public identity of a principal: a 32-byte Ed25519 verifying key.
///
/// Serializes as a hex string, like every other 32-byte id in the protocol.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    bytes: [u8; 32],
}

/// A signature over a message digest, tagged with the identity that claims
/// to have produced it.
///
/// The signature bytes are stored as `Vec<u8>` for serde compatibility but
/// are always 64 bytes when produced by [`Keypair::sign`]. A malformed
/// signature simply fails verification; it never panics.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    signer: Identity,
    bytes: Vec<u8>,
}

impl Keypair {
    /// Generate a fresh keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Constructs a keypair deterministically from a 32-byte seed.
    ///
    /// In Ed25519 the 32-byte secret key *is* the seed. Handy for fixtures
    /// and for keys derived by a KDF.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Reconstruct a keypair from a hex-encoded secret key.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidSecretKey)?;
        let arr: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&arr))
    }

    /// The public identity of this keypair.
    pub fn identity(&self) -> Identity {
        Identity {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign a message, producing a [`Signature`] tagged with this identity.
    ///
    /// Ed25519 is deterministic: the same (key, message) pair always yields
    /// the same signature bytes.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.signing_key.sign(message);
        Signature {
            signer: self.identity(),
            bytes: sig.to_bytes().to_vec(),
        }
    }

    /// Exports the raw 32-byte secret key material. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_bytes()
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material in debug output.
        write!(f, "Keypair(pub={})", self.identity().to_hex())
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

impl Identity {
    /// Create an `Identity` from raw bytes without validating the point.
    ///
    /// Invalid points are harmless here: nothing can ever verify against
    /// them, so they can sit in a signer set but never authorize anything.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Parse and validate an identity from a byte slice.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Strictly verify `signature` over `message` against this identity.
    ///
    /// Returns `false` when the signature was tagged with a different
    /// identity, has the wrong length, or does not verify.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        if signature.signer != *self {
            return false;
        }
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let Some(dalek_sig) = signature.to_dalek_signature() else {
            return false;
        };
        verifying_key.verify_strict(message, &dalek_sig).is_ok()
    }

    /// Hex-encoded representation. 64 characters for 32 bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse a hex-encoded identity.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self { bytes: arr })
    }

    /// Base58-encoded representation, the compact form shown to users.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.bytes).into_string()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", &self.to_hex()[..16])
    }
}

impl std::str::FromStr for Identity {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

impl Signature {
    /// Assemble a signature from a claimed signer and raw bytes, e.g. when
    /// decoding a co-signer's message received off-band.
    pub fn from_parts(signer: Identity, bytes: Vec<u8>) -> Self {
        Self { signer, bytes }
    }

    /// The identity this signature claims to come from. Unverified.
    pub fn claimed_signer(&self) -> &Identity {
        &self.signer
    }

    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Convert to the ed25519-dalek `Signature` type.
    ///
    /// Returns `None` if the internal bytes aren't exactly 64 bytes.
    pub fn to_dalek_signature(&self) -> Option<DalekSignature> {
        let arr: [u8; 64] = self.bytes.as_slice().try_into().ok()?;
        Some(DalekSignature::from_bytes(&arr))
    }

    /// Hex-encoded signature bytes (without the signer).
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 16 {
            write!(f, "Signature({:?}, {}..)", self.signer, &hex_str[..16])
        } else {
            write!(f, "Signature({:?}, {})", self.signer, hex_str)
        }
    }
}
