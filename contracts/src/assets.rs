//! # Asset Book
//!
//! Custody of every asset the ledger knows about: who holds how much of the
//! native currency and of each token, and which token allowances have been
//! granted to which vaults.
//!
//! Vaults keep their own per-asset accounting; the book is the ground truth
//! for custody. A vault's recorded balance of an asset always equals what the
//! book says the vault holds, because every vault balance change goes through
//! one of the transfer methods below in the same call.
//!
//! ## Transfer rules
//!
//! - **Native** deposits are value-attached: the call carries `attached_value`,
//!   which must equal the declared amount exactly.
//! - **Token** deposits are pulled through an allowance the depositor granted
//!   to the vault beforehand. They must not carry attached value.
//! - All arithmetic is checked. Nothing saturates.
//!
//! ## Undo journal
//!
//! Between [`begin`](AssetBook::begin) and [`commit`](AssetBook::commit) the
//! book records the prior value of every entry it writes, so
//! [`rollback`](AssetBook::rollback) can restore exactly what one call
//! touched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use tally_protocol::crypto::Identity;
use tally_protocol::{Amount, AssetId, TokenAddress, VaultAddress};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a custody transfer failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("insufficient {asset} balance: requested {requested}, available {available}")]
    InsufficientBalance {
        asset: AssetId,
        requested: Amount,
        available: Amount,
    },

    #[error("insufficient {asset} allowance: requested {requested}, approved {available}")]
    InsufficientAllowance {
        asset: AssetId,
        requested: Amount,
        available: Amount,
    },

    /// A native deposit's attached value differs from its declared amount.
    #[error("attached value {attached} does not match declared amount {declared}")]
    ValueMismatch { declared: Amount, attached: Amount },

    #[error("token transfer carried {attached} of attached native value")]
    UnexpectedValue { attached: Amount },

    #[error("balance overflow")]
    Overflow,
}

// ---------------------------------------------------------------------------
// Holders
// ---------------------------------------------------------------------------

/// Anything that can hold assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "address", rename_all = "snake_case")]
pub enum Holder {
    /// An externally controlled account, identified by its public key.
    Account(Identity),
    /// A vault inside the ledger.
    Vault(VaultAddress),
}

impl std::fmt::Display for Holder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Holder::Account(identity) => write!(f, "account:{}", identity),
            Holder::Vault(address) => write!(f, "vault:{}", address),
        }
    }
}

// ---------------------------------------------------------------------------
// AssetBook
// ---------------------------------------------------------------------------

type BalanceKey = (AssetId, Holder);
type AllowanceKey = (TokenAddress, Identity, VaultAddress);

/// Value an entry held before one write.
#[derive(Debug, Clone)]
enum Undo {
    Balance(BalanceKey, Option<Amount>),
    Allowance(AllowanceKey, Option<Amount>),
}

/// Balances and allowances for every asset and holder.
#[derive(Debug, Clone, Default)]
pub struct AssetBook {
    /// `(asset, holder) -> balance`. Zero balances are removed.
    balances: HashMap<BalanceKey, Amount>,
    /// `(token, owner, spender vault) -> remaining allowance`.
    allowances: HashMap<AllowanceKey, Amount>,
    /// Open while a call is in flight.
    journal: Option<Vec<Undo>>,
}

impl AssetBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` of `asset` to an account out of thin air.
    ///
    /// This is how value enters the ledger: the native currency at genesis,
    /// tokens by their issuer. Minting to a vault directly is not offered;
    /// vault balances only grow through deposits.
    pub fn mint(&mut self, asset: AssetId, to: Identity, amount: Amount) -> Result<(), TransferError> {
        self.credit(asset, Holder::Account(to), amount)
    }

    /// Sets (not adds to) the allowance `owner` grants `spender` over `token`.
    pub fn approve(&mut self, token: TokenAddress, owner: Identity, spender: VaultAddress, amount: Amount) {
        self.set_allowance((token, owner, spender), amount);
    }

    /// Starts recording writes. Discards any journal left open.
    pub fn begin(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Keeps every write since [`begin`](Self::begin).
    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Undoes every write since [`begin`](Self::begin), newest first.
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for undo in journal.into_iter().rev() {
            match undo {
                Undo::Balance(key, Some(amount)) => {
                    self.balances.insert(key, amount);
                }
                Undo::Balance(key, None) => {
                    self.balances.remove(&key);
                }
                Undo::Allowance(key, Some(amount)) => {
                    self.allowances.insert(key, amount);
                }
                Undo::Allowance(key, None) => {
                    self.allowances.remove(&key);
                }
            }
        }
    }

    /// Current balance, `0` if the holder never held the asset.
    pub fn balance_of(&self, asset: &AssetId, holder: &Holder) -> Amount {
        self.balances.get(&(*asset, *holder)).copied().unwrap_or(0)
    }

    /// Remaining allowance `owner` has granted `spender` over `token`.
    pub fn allowance(&self, token: &TokenAddress, owner: &Identity, spender: &VaultAddress) -> Amount {
        self.allowances
            .get(&(*token, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    /// Moves `amount` of `asset` from an account into a vault's custody.
    ///
    /// Native: `attached_value` must equal `amount`. Token: `attached_value`
    /// must be zero and the allowance must cover `amount`; the allowance is
    /// consumed.
    pub fn transfer_in(
        &mut self,
        asset: &AssetId,
        from: &Identity,
        into: &VaultAddress,
        amount: Amount,
        attached_value: Amount,
    ) -> Result<(), TransferError> {
        match asset {
            AssetId::Native => {
                if attached_value != amount {
                    return Err(TransferError::ValueMismatch {
                        declared: amount,
                        attached: attached_value,
                    });
                }
            }
            AssetId::Token(token) => {
                if attached_value != 0 {
                    return Err(TransferError::UnexpectedValue {
                        attached: attached_value,
                    });
                }
                let approved = self.allowance(token, from, into);
                if approved < amount {
                    return Err(TransferError::InsufficientAllowance {
                        asset: *asset,
                        requested: amount,
                        available: approved,
                    });
                }
                // Checked above, cannot underflow.
                self.approve(*token, *from, *into, approved - amount);
            }
        }

        self.debit(*asset, Holder::Account(*from), amount)?;
        self.credit(*asset, Holder::Vault(*into), amount)
    }

    /// Pays `amount` of `asset` out of a vault to an account.
    pub fn transfer_out(
        &mut self,
        asset: &AssetId,
        from: &VaultAddress,
        to: &Identity,
        amount: Amount,
    ) -> Result<(), TransferError> {
        self.debit(*asset, Holder::Vault(*from), amount)?;
        self.credit(*asset, Holder::Account(*to), amount)
    }

    /// Moves custody between two vaults, as when a debt is collected.
    pub fn move_between_vaults(
        &mut self,
        asset: &AssetId,
        from: &VaultAddress,
        to: &VaultAddress,
        amount: Amount,
    ) -> Result<(), TransferError> {
        self.debit(*asset, Holder::Vault(*from), amount)?;
        self.credit(*asset, Holder::Vault(*to), amount)
    }

    fn debit(&mut self, asset: AssetId, holder: Holder, amount: Amount) -> Result<(), TransferError> {
        let available = self.balance_of(&asset, &holder);
        let remaining = available
            .checked_sub(amount)
            .ok_or(TransferError::InsufficientBalance {
                asset,
                requested: amount,
                available,
            })?;
        self.set_balance((asset, holder), remaining);
        Ok(())
    }

    fn credit(&mut self, asset: AssetId, holder: Holder, amount: Amount) -> Result<(), TransferError> {
        if amount == 0 {
            return Ok(());
        }
        let updated = self
            .balance_of(&asset, &holder)
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;
        self.set_balance((asset, holder), updated);
        Ok(())
    }

    fn set_balance(&mut self, key: BalanceKey, amount: Amount) {
        let prior = if amount == 0 {
            self.balances.remove(&key)
        } else {
            self.balances.insert(key, amount)
        };
        if let Some(journal) = self.journal.as_mut() {
            journal.push(Undo::Balance(key, prior));
        }
    }

    fn set_allowance(&mut self, key: AllowanceKey, amount: Amount) {
        let prior = if amount == 0 {
            self.allowances.remove(&key)
        } else {
            self.allowances.insert(key, amount)
        };
        if let Some(journal) = self.journal.as_mut() {
            journal.push(Undo::Allowance(key, prior));
        }
    }
}
