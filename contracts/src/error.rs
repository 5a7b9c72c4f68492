//! Error taxonomy shared by every contract call.
//!
//! A call that returns any of these has been rolled back entirely: no state
//! changed and no events were recorded.

use thiserror::Error;

use tally_protocol::{Amount, Operation};

use crate::assets::TransferError;
use crate::clearing_house::ClearingError;

/// The role a signature had to come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Signer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Signer => write!(f, "signer"),
        }
    }
}

/// Errors returned by vault, clearing-house and ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// The signature did not verify, or its signer is not in the required set.
    #[error("invalid signature on {operation}: not from a current {required} of {scope}")]
    InvalidSignature {
        operation: Operation,
        required: Role,
        /// Which vault's sets were consulted.
        scope: String,
    },

    /// The signer is known to the vault but lacks the role this call needs.
    #[error("unauthorized {operation}: {reason}")]
    Unauthorized { operation: Operation, reason: String },

    /// A referenced vault, clearing house, debt or balance does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A lifecycle or debt-existence precondition does not hold.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Not enough funds, allowance or attached value.
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Amount, available: Amount },

    /// The clearing house declined a callback the caller could not do without.
    #[error("rejected by clearing house: {0}")]
    ExternalRejection(#[from] ClearingError),

    /// Checked arithmetic on an amount overflowed.
    #[error("amount overflow: operation would exceed allowed limits")]
    AmountOverflow,
}

impl ContractError {
    pub(crate) fn invalid_signature(operation: Operation, required: Role, scope: impl ToString) -> Self {
        ContractError::InvalidSignature {
            operation,
            required,
            scope: scope.to_string(),
        }
    }

    pub(crate) fn unauthorized(operation: Operation, reason: impl Into<String>) -> Self {
        ContractError::Unauthorized {
            operation,
            reason: reason.into(),
        }
    }
}

impl From<TransferError> for ContractError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::InsufficientBalance {
                requested,
                available,
                ..
            }
            | TransferError::InsufficientAllowance {
                requested,
                available,
                ..
            } => ContractError::InsufficientFunds {
                requested,
                available,
            },
            TransferError::ValueMismatch { declared, attached } => {
                ContractError::InsufficientFunds {
                    requested: declared,
                    available: attached,
                }
            }
            TransferError::UnexpectedValue { attached } => ContractError::InvalidState(format!(
                "token transfers cannot carry attached value ({attached} attached)"
            )),
            TransferError::Overflow => ContractError::AmountOverflow,
        }
    }
}
