//! # Value Types
//!
//! Addresses and identifiers shared by every Tally contract.
//!
//! All of them are 32-byte values that render as lowercase hex. They
//! serialize as hex strings (not byte arrays) so they can be used directly
//! as JSON map keys in vault snapshots.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::crypto::hash::blake3_hash;
use crate::crypto::keys::Identity;

/// Quantity of an asset in its smallest unit. No decimals, ever.
pub type Amount = u64;

/// Parse exactly 32 bytes out of a hex string.
fn parse_hex32(s: &str) -> Result<[u8; 32], hex::FromHexError> {
    let bytes = hex::decode(s)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| hex::FromHexError::InvalidStringLength)
}

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Wrap raw bytes.
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// The raw 32 bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Lowercase hex, 64 characters.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex (exactly 32 bytes).
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                parse_hex32(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}...)", stringify!($name), &self.to_hex()[..12])
            }
        }

        impl std::str::FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_id!(
    /// Address of a vault inside the ledger.
    VaultAddress
);

hex_id!(
    /// Address of a clearing house inside the ledger.
    ClearingHouseAddress
);

hex_id!(
    /// Address of a fungible token contract.
    TokenAddress
);

hex_id!(
    /// A 32-byte message digest. Signatures are always taken over one of these.
    ///
    /// See [`crate::digest::Authorization`].
    Digest
);

hex_id!(
    /// Storage key of a debt: `BLAKE3(debtor || destination || asset || salt)`.
    ///
    /// See [`crate::digest::debt_identifier`].
    DebtId
);

impl VaultAddress {
    /// Deterministic address for the `nonce`-th vault opened by `creator`.
    pub fn derive(creator: &Identity, nonce: u64) -> Self {
        Self(derive_address(b"tally/vault", creator, nonce))
    }
}

impl ClearingHouseAddress {
    /// Deterministic address for the `nonce`-th clearing house deployed by `deployer`.
    pub fn derive(deployer: &Identity, nonce: u64) -> Self {
        Self(derive_address(b"tally/clearing-house", deployer, nonce))
    }
}

impl TokenAddress {
    /// Content-addressed token id from its ticker symbol.
    pub fn from_symbol(symbol: &str) -> Self {
        let mut preimage = b"tally/token\x00".to_vec();
        preimage.extend_from_slice(symbol.as_bytes());
        Self(blake3_hash(&preimage))
    }
}

fn derive_address(domain: &[u8], owner: &Identity, nonce: u64) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(domain.len() + 1 + 32 + 8);
    preimage.extend_from_slice(domain);
    preimage.push(0x00);
    preimage.extend_from_slice(owner.as_bytes());
    preimage.extend_from_slice(&nonce.to_be_bytes());
    blake3_hash(&preimage)
}

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// An asset a vault can hold: the ledger's native currency or a token.
///
/// Native deposits are value-attached to the call; token deposits are
/// pulled through an allowance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetId {
    Native,
    Token(TokenAddress),
}

impl AssetId {
    /// Fixed-width encoding used inside message digests: a tag byte followed
    /// by 32 bytes (all zero for the native asset).
    pub fn encode(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        match self {
            AssetId::Native => out[0] = 0x00,
            AssetId::Token(token) => {
                out[0] = 0x01;
                out[1..].copy_from_slice(token.as_bytes());
            }
        }
        out
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Native => write!(f, "native"),
            AssetId::Token(token) => write!(f, "token:{}", token.to_hex()),
        }
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Native => write!(f, "Native"),
            AssetId::Token(token) => write!(f, "Token({:?})", token),
        }
    }
}

impl std::str::FromStr for AssetId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("token:") {
            Some(hex_part) => TokenAddress::from_hex(hex_part).map(AssetId::Token),
            None if s == "native" => Ok(AssetId::Native),
            None => Err(hex::FromHexError::InvalidStringLength),
        }
    }
}

impl Serialize for AssetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
