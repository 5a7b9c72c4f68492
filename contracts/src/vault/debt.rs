//! Debt records and the terms both parties sign to create one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_protocol::clock::add_secs;
use tally_protocol::config::MAX_PERIOD_SECS;
use tally_protocol::{debt_identifier, Amount, AssetId, Authorization, DebtId, VaultAddress};

use crate::error::ContractError;

/// What a debtor owes a creditor vault.
///
/// A debt with `amount == 0` is *resolved*: fully collected or forgiven. The
/// record stays until `remove_debt` frees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debt {
    /// The creditor vault.
    pub destination: VaultAddress,
    pub asset: AssetId,
    /// Outstanding amount.
    pub amount: Amount,
    /// Earliest instant the creditor may collect. Reset to the Unix epoch when
    /// the debt is forgiven.
    pub collection_after: DateTime<Utc>,
    pub salt: u64,
}

impl Debt {
    pub fn is_resolved(&self) -> bool {
        self.amount == 0
    }

    /// Whether the collection window has opened at `now`.
    pub fn is_collectable_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.collection_after
    }
}

/// The terms of a new debt, as agreed and signed by debtor and creditor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtTerms {
    /// The creditor vault.
    pub destination: VaultAddress,
    pub asset: AssetId,
    pub amount: Amount,
    /// Disambiguates repeated debts between the same pair in the same asset.
    pub salt: u64,
    /// Seconds from creation until the creditor may collect.
    pub settlement_period_secs: u64,
}

impl DebtTerms {
    /// The message both sides sign for these terms against `debtor`.
    pub fn authorization(&self, debtor: &VaultAddress) -> Authorization {
        Authorization::add_debt(
            debtor,
            &self.destination,
            &self.asset,
            self.amount,
            self.salt,
            self.settlement_period_secs,
        )
    }

    /// Storage key these terms produce in `debtor`.
    pub fn debt_id(&self, debtor: &VaultAddress) -> DebtId {
        debt_identifier(debtor, &self.destination, &self.asset, self.salt)
    }

    /// Rejects terms no honest pair would sign.
    pub(crate) fn validate(&self, debtor: &VaultAddress) -> Result<(), ContractError> {
        if self.amount == 0 {
            return Err(ContractError::InvalidState(
                "debt amount must be positive".into(),
            ));
        }
        if self.destination == *debtor {
            return Err(ContractError::InvalidState(
                "a vault cannot owe itself".into(),
            ));
        }
        if self.settlement_period_secs > MAX_PERIOD_SECS {
            return Err(ContractError::InvalidState(format!(
                "settlement period {}s exceeds maximum {}s",
                self.settlement_period_secs, MAX_PERIOD_SECS
            )));
        }
        Ok(())
    }

    /// The record these terms create at `now`.
    pub(crate) fn into_debt(self, now: DateTime<Utc>) -> Debt {
        Debt {
            destination: self.destination,
            asset: self.asset,
            amount: self.amount,
            collection_after: add_secs(now, self.settlement_period_secs),
            salt: self.salt,
        }
    }
}
