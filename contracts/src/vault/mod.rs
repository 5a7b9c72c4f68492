//! # Vault
//!
//! A vault holds per-asset balances on behalf of a set of owners and signers,
//! records debts it owes to other vaults, and pays them out when the creditor
//! collects. Every state-changing operation except `deposit`, `remove_debt`
//! and `stop` is authorized by a signature over a message digest, never by
//! who submitted the call.
//!
//! ## Who signs what
//!
//! | Operation                 | Signature from                         |
//! |---------------------------|----------------------------------------|
//! | `withdraw`                | a signer of this vault                 |
//! | `add_debt`                | a signer of this vault AND of the creditor |
//! | `collect_debt`            | a signer of the creditor               |
//! | `forgive_debt[_by_counterparty]` | a signer of the creditor        |
//! | `add_owner`/`remove_owner`| an owner (see [`OwnerRemoval`])        |
//! | `add_signer`/`remove_signer` | an owner (see [`SignerEnrollment`]) |
//! | `retire`                  | an owner                               |
//!
//! ## Collaborators
//!
//! A vault never reaches into other contracts directly. Everything outside
//! its own storage (the clock, signature recovery, asset custody, the
//! creditor vault, the clearing house, the event log) comes through the
//! [`VaultHost`] handed to each call.
//!
//! [`OwnerRemoval`]: tally_protocol::config::OwnerRemoval
//! [`SignerEnrollment`]: tally_protocol::config::SignerEnrollment

pub mod access;
pub mod debt;
pub mod lifecycle;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use tally_protocol::config::{AuthorizationPolicy, DebtOverride};
use tally_protocol::crypto::{Identity, Signature, SignatureError};
use tally_protocol::{Amount, AssetId, Authorization, ClearingHouseAddress, DebtId, VaultAddress};

use crate::assets::{Holder, TransferError};
use crate::clearing_house::ClearingError;
use crate::error::{ContractError, Role};
use crate::events::Event;

pub use access::AccessControl;
pub use debt::{Debt, DebtTerms};
pub use lifecycle::{Lifecycle, LifecycleState};

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Everything a vault needs from the world around it during one call.
pub trait VaultHost {
    /// The call's timestamp. Constant for the duration of the call.
    fn now(&self) -> DateTime<Utc>;

    fn policy(&self) -> AuthorizationPolicy;

    /// Identity that signed `authorization`'s digest.
    fn recover(&self, authorization: &Authorization, signature: &Signature) -> Result<Identity, SignatureError>;

    /// Whether `identity` may sign for another vault.
    fn is_signer_of(&self, vault: &VaultAddress, identity: &Identity) -> Result<bool, ContractError>;

    /// Takes custody of a deposit from an external account.
    fn pull_funds(
        &mut self,
        asset: &AssetId,
        from: &Identity,
        into: &VaultAddress,
        amount: Amount,
        attached_value: Amount,
    ) -> Result<(), TransferError>;

    /// Pays out of the vault's custody to an external account.
    fn push_funds(&mut self, asset: &AssetId, from: &VaultAddress, to: &Identity, amount: Amount) -> Result<(), TransferError>;

    /// Moves funds into another vault and credits them there as a deposit.
    fn pay_vault(&mut self, from: &VaultAddress, to: &VaultAddress, asset: &AssetId, amount: Amount) -> Result<(), ContractError>;

    /// Tells the creditor vault a payment on `debt_id` arrived.
    fn notify_collected(
        &mut self,
        creditor: &VaultAddress,
        debtor: &VaultAddress,
        debt_id: &DebtId,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<(), ContractError>;

    /// The forgiveness callback into the vault's clearing house.
    fn clearing_forgive(
        &mut self,
        house: &ClearingHouseAddress,
        debtor: &VaultAddress,
        debt_id: &DebtId,
    ) -> Result<(), ClearingError>;

    fn is_cleared(&self, house: &ClearingHouseAddress, vault: &VaultAddress, debt_id: &DebtId) -> Result<bool, ContractError>;

    fn emit(&mut self, event: Event);
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Result of one `collect_debt` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub debt_id: DebtId,
    /// Paid to the creditor by this call.
    pub amount: Amount,
    /// Still owed afterwards.
    pub remaining: Amount,
}

impl Collection {
    pub fn is_full(&self) -> bool {
        self.remaining == 0
    }
}

/// A serializable, read-only view of a vault's full state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    pub address: VaultAddress,
    pub clearing_house: ClearingHouseAddress,
    pub state: LifecycleState,
    pub retiring_period_secs: u64,
    pub retiring_since: Option<DateTime<Utc>>,
    pub owners: BTreeSet<Identity>,
    pub signers: BTreeSet<Identity>,
    pub balances: BTreeMap<AssetId, Amount>,
    pub balance_size: u64,
    pub debts: BTreeMap<DebtId, Debt>,
    pub debts_size: u64,
}

/// One vault's storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vault {
    address: VaultAddress,
    clearing_house: ClearingHouseAddress,
    /// Only nonzero balances are stored.
    balances: BTreeMap<AssetId, Amount>,
    /// Number of assets with a nonzero balance.
    balance_size: u64,
    debts: BTreeMap<DebtId, Debt>,
    /// Number of unresolved debts (`amount > 0`), not of records.
    debts_size: u64,
    access: AccessControl,
    lifecycle: Lifecycle,
}

impl Vault {
    /// A new, empty, Active vault owned by `creator`.
    pub fn open(
        address: VaultAddress,
        clearing_house: ClearingHouseAddress,
        creator: Identity,
        retiring_period_secs: u64,
    ) -> Self {
        Self {
            address,
            clearing_house,
            balances: BTreeMap::new(),
            balance_size: 0,
            debts: BTreeMap::new(),
            debts_size: 0,
            access: AccessControl::new(creator),
            lifecycle: Lifecycle::new(retiring_period_secs),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn address(&self) -> &VaultAddress {
        &self.address
    }

    pub fn clearing_house(&self) -> &ClearingHouseAddress {
        &self.clearing_house
    }

    pub fn balance(&self, asset: &AssetId) -> Amount {
        self.balances.get(asset).copied().unwrap_or(0)
    }

    pub fn balance_size(&self) -> u64 {
        self.balance_size
    }

    /// The debt record under `debt_id`, resolved or not.
    pub fn debt(&self, debt_id: &DebtId) -> Option<&Debt> {
        self.debts.get(debt_id)
    }

    pub fn debts_size(&self) -> u64 {
        self.debts_size
    }

    pub fn is_owner(&self, identity: &Identity) -> bool {
        self.access.is_owner(identity)
    }

    pub fn is_signer(&self, identity: &Identity) -> bool {
        self.access.is_signer(identity)
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn snapshot(&self) -> VaultSnapshot {
        VaultSnapshot {
            address: self.address,
            clearing_house: self.clearing_house,
            state: self.lifecycle.state(),
            retiring_period_secs: self.lifecycle.retiring_period_secs(),
            retiring_since: self.lifecycle.retiring_since(),
            owners: self.access.owners().clone(),
            signers: self.access.signers().clone(),
            balances: self.balances.clone(),
            balance_size: self.balance_size,
            debts: self.debts.clone(),
            debts_size: self.debts_size,
        }
    }

    // -----------------------------------------------------------------------
    // Funds
    // -----------------------------------------------------------------------

    /// Accepts `amount` of `asset` from `depositor`. Anyone may deposit.
    pub fn deposit(
        &mut self,
        host: &mut dyn VaultHost,
        depositor: &Identity,
        asset: AssetId,
        amount: Amount,
        attached_value: Amount,
    ) -> Result<(), ContractError> {
        self.lifecycle.ensure_not_stopped("deposit")?;
        if amount == 0 {
            return Err(ContractError::InvalidState(
                "deposit amount must be positive".into(),
            ));
        }
        host.pull_funds(&asset, depositor, &self.address, amount, attached_value)?;
        self.receive(host, Holder::Account(*depositor), asset, amount)
    }

    /// Credits funds whose custody has already moved to this vault.
    pub(crate) fn receive(
        &mut self,
        host: &mut dyn VaultHost,
        from: Holder,
        asset: AssetId,
        amount: Amount,
    ) -> Result<(), ContractError> {
        self.lifecycle.ensure_not_stopped("deposit")?;
        self.credit(asset, amount)?;
        host.emit(Event::Deposit {
            vault: self.address,
            from,
            asset,
            amount,
        });
        Ok(())
    }

    /// Creditor-side notification that `debtor` paid on one of this vault's
    /// claims. The funds themselves arrive through [`receive`](Self::receive).
    pub(crate) fn on_collect(
        &mut self,
        host: &mut dyn VaultHost,
        debtor: &VaultAddress,
        debt_id: &DebtId,
        asset: AssetId,
        amount: Amount,
    ) -> Result<(), ContractError> {
        self.lifecycle.ensure_not_stopped("on_collect")?;
        host.emit(Event::OnCollect {
            vault: self.address,
            debtor: *debtor,
            debt_id: *debt_id,
            asset,
            amount,
        });
        Ok(())
    }

    /// Pays `amount` of `asset` to `destination`, authorized by a signer.
    pub fn withdraw(
        &mut self,
        host: &mut dyn VaultHost,
        destination: &Identity,
        asset: AssetId,
        amount: Amount,
        signature: &Signature,
    ) -> Result<(), ContractError> {
        self.lifecycle.ensure_not_stopped("withdraw")?;
        let auth = Authorization::withdraw(&self.address, destination, &asset, amount);
        let signer = self.recover_own(host, &auth, signature, Role::Signer)?;
        if amount == 0 {
            return Err(ContractError::InvalidState(
                "withdraw amount must be positive".into(),
            ));
        }

        self.debit(asset, amount)?;
        host.push_funds(&asset, &self.address, destination, amount)?;
        host.emit(Event::Withdraw {
            vault: self.address,
            destination: *destination,
            asset,
            amount,
            authorized_by: signer,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Debts
    // -----------------------------------------------------------------------

    /// Records a debt to `terms.destination`, co-signed by a signer of each
    /// side, and returns its id.
    pub fn add_debt(
        &mut self,
        host: &mut dyn VaultHost,
        terms: DebtTerms,
        debtor_signature: &Signature,
        creditor_signature: &Signature,
    ) -> Result<DebtId, ContractError> {
        self.lifecycle.ensure_active("add_debt")?;
        terms.validate(&self.address)?;

        let now = host.now();
        let debt_id = terms.debt_id(&self.address);
        // A cleared id stays cleared; a debt reissued there could be removed
        // by anyone.
        if host.is_cleared(&self.clearing_house, &self.address, &debt_id)? {
            return Err(ContractError::InvalidState(format!(
                "debt id {} has been cleared; agree the debt under a new salt",
                debt_id
            )));
        }
        let replaces_unresolved = match self.debts.get(&debt_id) {
            Some(existing) if !existing.is_resolved() => {
                check_override(&debt_id, existing, host.policy().debt_override, now)?;
                true
            }
            _ => false,
        };

        let auth = terms.authorization(&self.address);
        self.recover_own(host, &auth, debtor_signature, Role::Signer)?;
        recover_counterparty(host, &terms.destination, &auth, creditor_signature)?;

        let debt = terms.into_debt(now);
        let collection_after = debt.collection_after;
        self.debts.insert(debt_id, debt);
        if !replaces_unresolved {
            self.debts_size += 1;
        }

        host.emit(Event::AddDebt {
            vault: self.address,
            destination: terms.destination,
            debt_id,
            asset: terms.asset,
            amount: terms.amount,
            collection_after,
        });
        Ok(debt_id)
    }

    /// Pays as much of `debt_id` as the vault's balance allows to the
    /// creditor, authorized by a signer of the creditor.
    ///
    /// On full payment the clearing house is offered the forgiveness
    /// callback first; if it declines, collection proceeds anyway.
    pub fn collect_debt(
        &mut self,
        host: &mut dyn VaultHost,
        debt_id: &DebtId,
        signature: &Signature,
    ) -> Result<Collection, ContractError> {
        self.lifecycle.ensure_not_stopped("collect_debt")?;
        let debt = self.unresolved_debt(debt_id)?.clone();

        let auth = Authorization::collect_debt(&self.address, debt_id);
        recover_counterparty(host, &debt.destination, &auth, signature)?;

        if !debt.is_collectable_at(host.now()) {
            return Err(ContractError::InvalidState(format!(
                "debt {} is not collectable until {}",
                debt_id, debt.collection_after
            )));
        }

        let available = self.balance(&debt.asset);
        let payable = debt.amount.min(available);
        if payable == 0 {
            return Err(ContractError::InsufficientFunds {
                requested: debt.amount,
                available,
            });
        }
        let remaining = debt.amount - payable;

        if remaining == 0 {
            if let Err(err) = host.clearing_forgive(&self.clearing_house, &self.address, debt_id) {
                warn!(
                    vault = %self.address,
                    debt_id = %debt_id,
                    error = %err,
                    "clearing house declined forgiveness on full collection; collecting anyway"
                );
            }
        }

        self.debit(debt.asset, payable)?;
        if let Some(record) = self.debts.get_mut(debt_id) {
            record.amount = remaining;
        }
        if remaining == 0 {
            self.debts_size = self.debts_size.saturating_sub(1);
            host.emit(Event::Close {
                vault: self.address,
                debt_id: *debt_id,
            });
        }

        host.pay_vault(&self.address, &debt.destination, &debt.asset, payable)?;
        host.notify_collected(&debt.destination, &self.address, debt_id, &debt.asset, payable)?;
        host.emit(Event::Collect {
            vault: self.address,
            destination: debt.destination,
            debt_id: *debt_id,
            asset: debt.asset,
            amount: payable,
            remaining,
        });

        Ok(Collection {
            debt_id: *debt_id,
            amount: payable,
            remaining,
        })
    }

    /// Forgives `debt_id`, authorized by a signer of the creditor. The
    /// clearing house must accept the forgiveness callback.
    pub fn forgive_debt(
        &mut self,
        host: &mut dyn VaultHost,
        debt_id: &DebtId,
        signature: &Signature,
    ) -> Result<(), ContractError> {
        self.lifecycle.ensure_not_stopped("forgive_debt")?;
        let destination = self.unresolved_debt(debt_id)?.destination;

        let auth = Authorization::forgive_debt(&self.address, debt_id);
        recover_counterparty(host, &destination, &auth, signature)?;

        self.forgive(host, debt_id, destination)
    }

    /// Forgives the single unresolved debt owed to `destination` in `asset`.
    ///
    /// Fails with `InvalidState` if more than one such debt exists; use
    /// [`forgive_debt`](Self::forgive_debt) with an explicit id then.
    pub fn forgive_debt_by_counterparty(
        &mut self,
        host: &mut dyn VaultHost,
        destination: &VaultAddress,
        asset: &AssetId,
        signature: &Signature,
    ) -> Result<DebtId, ContractError> {
        self.lifecycle.ensure_not_stopped("forgive_debt")?;
        let matching: Vec<DebtId> = self
            .debts
            .iter()
            .filter(|(_, d)| !d.is_resolved() && d.destination == *destination && d.asset == *asset)
            .map(|(id, _)| *id)
            .collect();
        let debt_id = match matching.as_slice() {
            [] => {
                return Err(ContractError::NotFound(format!(
                    "unresolved {} debt to vault {}",
                    asset, destination
                )))
            }
            [only] => *only,
            many => {
                return Err(ContractError::InvalidState(format!(
                    "{} unresolved {} debts to vault {}; forgive by id",
                    many.len(),
                    asset,
                    destination
                )))
            }
        };

        let auth = Authorization::forgive_by_counterparty(&self.address, destination, asset);
        recover_counterparty(host, destination, &auth, signature)?;

        self.forgive(host, &debt_id, *destination)?;
        Ok(debt_id)
    }

    fn forgive(
        &mut self,
        host: &mut dyn VaultHost,
        debt_id: &DebtId,
        destination: VaultAddress,
    ) -> Result<(), ContractError> {
        host.clearing_forgive(&self.clearing_house, &self.address, debt_id)?;

        if let Some(record) = self.debts.get_mut(debt_id) {
            record.amount = 0;
            // Unix epoch.
            record.collection_after = DateTime::<Utc>::default();
        }
        self.debts_size = self.debts_size.saturating_sub(1);

        host.emit(Event::ForgiveDebt {
            vault: self.address,
            destination,
            debt_id: *debt_id,
        });
        Ok(())
    }

    /// Deletes the record of a resolved or cleared debt. Anyone may call.
    pub fn remove_debt(&mut self, host: &mut dyn VaultHost, debt_id: &DebtId) -> Result<(), ContractError> {
        self.lifecycle.ensure_not_stopped("remove_debt")?;
        let debt = self
            .debts
            .get(debt_id)
            .ok_or_else(|| ContractError::NotFound(format!("debt {}", debt_id)))?;

        if !debt.is_resolved() {
            if !host.is_cleared(&self.clearing_house, &self.address, debt_id)? {
                return Err(ContractError::InvalidState(format!(
                    "debt {} is neither resolved nor cleared",
                    debt_id
                )));
            }
            // Cleared while still unresolved: it stops counting now.
            self.debts_size = self.debts_size.saturating_sub(1);
        }

        self.debts.remove(debt_id);
        host.emit(Event::RemoveDebt {
            vault: self.address,
            debt_id: *debt_id,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Access control
    // -----------------------------------------------------------------------

    pub fn add_owner(&mut self, host: &mut dyn VaultHost, candidate: &Identity, signature: &Signature) -> Result<(), ContractError> {
        self.lifecycle.ensure_not_stopped("add_owner")?;
        let auth = Authorization::add_owner(&self.address, candidate);
        let signer = self.recover_any(host, &auth, signature, Role::Owner)?;
        self.access.add_owner(*candidate, &signer, &self.scope())?;
        host.emit(Event::AddOwner {
            vault: self.address,
            owner: *candidate,
            authorized_by: signer,
        });
        Ok(())
    }

    pub fn remove_owner(
        &mut self,
        host: &mut dyn VaultHost,
        candidate: &Identity,
        signature: &Signature,
    ) -> Result<(), ContractError> {
        self.lifecycle.ensure_not_stopped("remove_owner")?;
        let auth = Authorization::remove_owner(&self.address, candidate);
        let signer = self.recover_any(host, &auth, signature, Role::Owner)?;
        let policy = host.policy().owner_removal;
        self.access.remove_owner(candidate, &signer, policy, &self.scope())?;
        host.emit(Event::RemoveOwner {
            vault: self.address,
            owner: *candidate,
            authorized_by: signer,
        });
        Ok(())
    }

    pub fn add_signer(&mut self, host: &mut dyn VaultHost, candidate: &Identity, signature: &Signature) -> Result<(), ContractError> {
        self.lifecycle.ensure_not_stopped("add_signer")?;
        let auth = Authorization::add_signer(&self.address, candidate);
        let signer = self.recover_any(host, &auth, signature, Role::Owner)?;
        let policy = host.policy().signer_enrollment;
        self.access.add_signer(*candidate, &signer, policy, &self.scope())?;
        host.emit(Event::AddSigner {
            vault: self.address,
            signer: *candidate,
            authorized_by: signer,
        });
        Ok(())
    }

    pub fn remove_signer(
        &mut self,
        host: &mut dyn VaultHost,
        candidate: &Identity,
        signature: &Signature,
    ) -> Result<(), ContractError> {
        self.lifecycle.ensure_not_stopped("remove_signer")?;
        let auth = Authorization::remove_signer(&self.address, candidate);
        let signer = self.recover_any(host, &auth, signature, Role::Owner)?;
        self.access.remove_signer(candidate, &signer, &self.scope())?;
        host.emit(Event::RemoveSigner {
            vault: self.address,
            signer: *candidate,
            authorized_by: signer,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Starts the retiring countdown. Authorized by an owner.
    pub fn retire(&mut self, host: &mut dyn VaultHost, signature: &Signature) -> Result<(), ContractError> {
        let auth = Authorization::retire(&self.address);
        self.recover_own(host, &auth, signature, Role::Owner)?;

        let now = host.now();
        self.lifecycle.retire(now)?;
        host.emit(Event::Retire {
            vault: self.address,
            since: now,
            stoppable_after: self.lifecycle.stoppable_after().unwrap_or(now),
        });
        Ok(())
    }

    /// Stops a retired, empty vault once its retiring period has elapsed.
    /// Anyone may call.
    pub fn stop(&mut self, host: &mut dyn VaultHost) -> Result<(), ContractError> {
        if self.debts_size > 0 || self.balance_size > 0 {
            return Err(ContractError::InvalidState(format!(
                "vault still holds {} balances and owes {} debts",
                self.balance_size, self.debts_size
            )));
        }
        self.lifecycle.stop(host.now())?;
        host.emit(Event::Stop {
            vault: self.address,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn scope(&self) -> String {
        format!("vault {}", self.address)
    }

    fn unresolved_debt(&self, debt_id: &DebtId) -> Result<&Debt, ContractError> {
        self.debts
            .get(debt_id)
            .filter(|d| !d.is_resolved())
            .ok_or_else(|| ContractError::NotFound(format!("unresolved debt {}", debt_id)))
    }

    /// Recovers the signer and checks it holds `required` in this vault.
    fn recover_own(
        &self,
        host: &dyn VaultHost,
        auth: &Authorization,
        signature: &Signature,
        required: Role,
    ) -> Result<Identity, ContractError> {
        let signer = self.recover_any(host, auth, signature, required)?;
        self.access
            .require(&signer, required, auth.operation(), &self.scope())?;
        Ok(signer)
    }

    /// Recovers the signer without checking any role.
    fn recover_any(
        &self,
        host: &dyn VaultHost,
        auth: &Authorization,
        signature: &Signature,
        required: Role,
    ) -> Result<Identity, ContractError> {
        host.recover(auth, signature)
            .map_err(|_| ContractError::invalid_signature(auth.operation(), required, self.scope()))
    }

    fn credit(&mut self, asset: AssetId, amount: Amount) -> Result<(), ContractError> {
        let current = self.balance(&asset);
        let updated = current
            .checked_add(amount)
            .ok_or(ContractError::AmountOverflow)?;
        if updated == 0 {
            return Ok(());
        }
        if current == 0 {
            self.balance_size += 1;
        }
        self.balances.insert(asset, updated);
        Ok(())
    }

    fn debit(&mut self, asset: AssetId, amount: Amount) -> Result<(), ContractError> {
        let current = *self
            .balances
            .get(&asset)
            .ok_or_else(|| ContractError::NotFound(format!("{} balance", asset)))?;
        let updated = current
            .checked_sub(amount)
            .ok_or(ContractError::InsufficientFunds {
                requested: amount,
                available: current,
            })?;
        if updated == 0 {
            self.balances.remove(&asset);
            self.balance_size = self.balance_size.saturating_sub(1);
        } else {
            self.balances.insert(asset, updated);
        }
        Ok(())
    }
}

/// Recovers the signer and checks it signs for `counterparty`.
fn recover_counterparty(
    host: &dyn VaultHost,
    counterparty: &VaultAddress,
    auth: &Authorization,
    signature: &Signature,
) -> Result<Identity, ContractError> {
    let scope = format!("vault {}", counterparty);
    let signer = host
        .recover(auth, signature)
        .map_err(|_| ContractError::invalid_signature(auth.operation(), Role::Signer, &scope))?;
    if host.is_signer_of(counterparty, &signer)? {
        Ok(signer)
    } else {
        Err(ContractError::invalid_signature(
            auth.operation(),
            Role::Signer,
            scope,
        ))
    }
}

fn check_override(
    debt_id: &DebtId,
    existing: &Debt,
    policy: DebtOverride,
    now: DateTime<Utc>,
) -> Result<(), ContractError> {
    match policy {
        DebtOverride::Always => Ok(()),
        DebtOverride::AfterCollectionWindow if existing.is_collectable_at(now) => Ok(()),
        DebtOverride::AfterCollectionWindow => Err(ContractError::InvalidState(format!(
            "debt {} is unresolved and its collection window opens at {}",
            debt_id, existing.collection_after
        ))),
        DebtOverride::NoOverrideWhileUnresolved => Err(ContractError::InvalidState(format!(
            "debt {} is still unresolved",
            debt_id
        ))),
    }
}
