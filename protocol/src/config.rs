//! # Protocol Configuration & Constants
//!
//! Every magic number in Tally lives here, next to the runtime knobs a host
//! ledger can tune: the default retiring period and the authorization
//! policies that differed between protocol revisions.
//!
//! Constants are consensus-relevant. Changing a digest length or a default
//! after deployment changes what signatures mean, so treat them as frozen.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Version tag embedded in every message digest context. Bump it and every
/// outstanding off-band signature becomes worthless, which is the point.
pub const MESSAGE_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Public (verifying) key length in bytes.
pub const IDENTITY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Digest, address and debt id length in bytes.
pub const HASH_OUTPUT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Vault Parameters
// ---------------------------------------------------------------------------

/// Default time a retiring vault must wait before it may be stopped.
/// Three days gives counterparties a window to collect what they are owed.
pub const DEFAULT_RETIRING_PERIOD_SECS: u64 = 3 * 24 * 60 * 60;

/// Upper bound on any settlement or retiring period: 10 years. Anything
/// longer is almost certainly a unit mistake (milliseconds for seconds).
pub const MAX_PERIOD_SECS: u64 = 10 * 365 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Authorization policies
// ---------------------------------------------------------------------------

/// Who must sign `addSigner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerEnrollment {
    /// A current owner signs the candidate in.
    #[default]
    OwnerDelegated,
    /// The candidate signs its own enrollment.
    SelfEnrolled,
}

/// Who must sign `removeOwner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerRemoval {
    /// Any current owner may remove any owner.
    #[default]
    AnyOwner,
    /// Owners may only remove themselves.
    SelfOnly,
}

/// Whether `addDebt` may overwrite an existing unresolved debt record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtOverride {
    /// Never overwrite a debt whose amount is still positive.
    #[default]
    NoOverrideWhileUnresolved,
    /// Overwrite only once the existing debt's collection window has opened.
    AfterCollectionWindow,
    /// Overwrite freely.
    Always,
}

/// The policy bundle governing who may authorize what.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationPolicy {
    pub signer_enrollment: SignerEnrollment,
    pub owner_removal: OwnerRemoval,
    pub debt_override: DebtOverride,
}

// ---------------------------------------------------------------------------
// ProtocolConfig
// ---------------------------------------------------------------------------

/// Errors loading or validating a [`ProtocolConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime configuration of a ledger instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Retiring period given to vaults opened without an explicit one.
    pub default_retiring_period_secs: u64,
    /// Authorization policies applied by every vault in the ledger.
    pub policy: AuthorizationPolicy,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            default_retiring_period_secs: DEFAULT_RETIRING_PERIOD_SECS,
            policy: AuthorizationPolicy::default(),
        }
    }
}

impl ProtocolConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Rejects values that cannot be intended.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_retiring_period_secs > MAX_PERIOD_SECS {
            return Err(ConfigError::Invalid(format!(
                "default_retiring_period_secs {} exceeds maximum {}",
                self.default_retiring_period_secs, MAX_PERIOD_SECS
            )));
        }
        Ok(())
    }
}
