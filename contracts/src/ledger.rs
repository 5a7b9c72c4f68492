//! # Ledger
//!
//! The execution substrate the contracts run on: it owns every vault,
//! clearing house and asset balance, reads the clock, and routes the
//! cross-contract calls a vault makes (paying a creditor vault, the
//! forgiveness callback into a clearing house) to their targets.
//!
//! ## Atomicity
//!
//! Every public mutating method is one *call*. A call runs against the live
//! state and journals what it is about to change: the prior copy of each
//! vault and clearing house it touches, each creator nonce it bumps, and
//! every asset book entry it writes. If any step fails (including a nested
//! call into another vault or a clearing house) the journal is replayed and
//! the call's buffered events are discarded. Callers see either the whole
//! effect and its events, or nothing. Untouched state is never copied.
//!
//! ## Time
//!
//! The clock is read once when a call starts. Every time-gated check inside
//! the call, and the timestamp on every event it records, uses that instant.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, info_span};

use tally_protocol::clock::Clock;
use tally_protocol::config::{AuthorizationPolicy, ProtocolConfig, MAX_PERIOD_SECS};
use tally_protocol::crypto::{Ed25519Verifier, Identity, Signature, SignatureError, SignatureVerifier};
use tally_protocol::{
    debt_identifier, Amount, AssetId, Authorization, ClearingHouseAddress, DebtId, TokenAddress, VaultAddress,
};

use crate::assets::{AssetBook, Holder, TransferError};
use crate::clearing_house::{Caller, ClearingError, ClearingHouse, ClearingHouseKind, SignerDirectory};
use crate::error::ContractError;
use crate::events::{Event, EventRecord};
use crate::vault::{Collection, Debt, DebtTerms, LifecycleState, Vault, VaultHost, VaultSnapshot};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What a committed call returned, plus the events it recorded, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt<T> {
    pub value: T,
    pub events: Vec<Event>,
}

impl<T> Receipt<T> {
    /// Names of the recorded events, in order.
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.iter().map(Event::name).collect()
    }
}

/// All contract state.
#[derive(Debug, Default)]
struct World {
    vaults: HashMap<VaultAddress, Vault>,
    houses: HashMap<ClearingHouseAddress, ClearingHouse>,
    assets: AssetBook,
    /// Next deployment nonce per creator, shared by vaults and houses.
    nonces: HashMap<Identity, u64>,
}

fn vault_not_found(address: &VaultAddress) -> ContractError {
    ContractError::NotFound(format!("vault {}", address))
}

fn house_not_found(address: &ClearingHouseAddress) -> ContractError {
    ContractError::NotFound(format!("clearing house {}", address))
}

impl SignerDirectory for HashMap<VaultAddress, Vault> {
    fn is_signer_of(&self, vault: &VaultAddress, identity: &Identity) -> Result<bool, ContractError> {
        let vault = self.get(vault).ok_or_else(|| vault_not_found(vault))?;
        vault.lifecycle().ensure_not_stopped("signer lookup")?;
        Ok(vault.is_signer(identity))
    }
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// Prior state of everything one call touched outside the asset book.
/// `None` means the entry did not exist before the call.
#[derive(Debug, Default)]
struct Journal {
    vaults: HashMap<VaultAddress, Option<Vault>>,
    houses: HashMap<ClearingHouseAddress, Option<ClearingHouse>>,
    nonces: HashMap<Identity, Option<u64>>,
}

impl Journal {
    /// Only the first record per key counts; later ones are already covered.
    fn record_vault(&mut self, address: &VaultAddress, prior: Option<&Vault>) {
        self.vaults
            .entry(*address)
            .or_insert_with(|| prior.cloned());
    }

    fn record_house(&mut self, address: &ClearingHouseAddress, prior: Option<&ClearingHouse>) {
        self.houses
            .entry(*address)
            .or_insert_with(|| prior.cloned());
    }

    fn record_nonce(&mut self, creator: &Identity, prior: Option<u64>) {
        self.nonces.entry(*creator).or_insert(prior);
    }

    /// Puts every recorded entry back as it was.
    fn undo(self, world: &mut World) {
        for (address, prior) in self.vaults {
            match prior {
                Some(vault) => world.vaults.insert(address, vault),
                None => world.vaults.remove(&address),
            };
        }
        for (address, prior) in self.houses {
            match prior {
                Some(house) => world.houses.insert(address, house),
                None => world.houses.remove(&address),
            };
        }
        for (creator, prior) in self.nonces {
            match prior {
                Some(nonce) => world.nonces.insert(creator, nonce),
                None => world.nonces.remove(&creator),
            };
        }
        world.assets.rollback();
    }
}

// ---------------------------------------------------------------------------
// CallContext
// ---------------------------------------------------------------------------

/// The [`VaultHost`] a vault sees during one call.
///
/// While a vault's method runs, that vault is taken out of `vaults`; nested
/// calls reach every *other* vault through here.
struct CallContext<'a> {
    now: DateTime<Utc>,
    policy: AuthorizationPolicy,
    verifier: &'a dyn SignatureVerifier,
    vaults: &'a mut HashMap<VaultAddress, Vault>,
    houses: &'a mut HashMap<ClearingHouseAddress, ClearingHouse>,
    assets: &'a mut AssetBook,
    nonces: &'a mut HashMap<Identity, u64>,
    journal: Journal,
    events: Vec<Event>,
}

impl CallContext<'_> {
    /// Runs `f` on the vault at `address` with this context as its host.
    fn with_vault<T>(
        &mut self,
        address: &VaultAddress,
        f: impl FnOnce(&mut Vault, &mut dyn VaultHost) -> Result<T, ContractError>,
    ) -> Result<T, ContractError> {
        let mut vault = self
            .vaults
            .remove(address)
            .ok_or_else(|| vault_not_found(address))?;
        self.journal.record_vault(address, Some(&vault));
        let result = f(&mut vault, self);
        self.vaults.insert(*address, vault);
        result
    }

    /// A clearing house, journaled before it is handed out for writing.
    fn house_mut(&mut self, address: &ClearingHouseAddress) -> Option<&mut ClearingHouse> {
        let house = self.houses.get_mut(address)?;
        self.journal.record_house(address, Some(&*house));
        Some(house)
    }

    fn next_nonce(&mut self, creator: &Identity) -> u64 {
        self.journal
            .record_nonce(creator, self.nonces.get(creator).copied());
        let nonce = self.nonces.entry(*creator).or_insert(0);
        let current = *nonce;
        *nonce += 1;
        current
    }
}

impl VaultHost for CallContext<'_> {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn policy(&self) -> AuthorizationPolicy {
        self.policy
    }

    fn recover(&self, authorization: &Authorization, signature: &Signature) -> Result<Identity, SignatureError> {
        self.verifier.recover(authorization.digest(), signature)
    }

    fn is_signer_of(&self, vault: &VaultAddress, identity: &Identity) -> Result<bool, ContractError> {
        SignerDirectory::is_signer_of(&*self.vaults, vault, identity)
    }

    fn pull_funds(
        &mut self,
        asset: &AssetId,
        from: &Identity,
        into: &VaultAddress,
        amount: Amount,
        attached_value: Amount,
    ) -> Result<(), TransferError> {
        self.assets.transfer_in(asset, from, into, amount, attached_value)
    }

    fn push_funds(&mut self, asset: &AssetId, from: &VaultAddress, to: &Identity, amount: Amount) -> Result<(), TransferError> {
        self.assets.transfer_out(asset, from, to, amount)
    }

    fn pay_vault(&mut self, from: &VaultAddress, to: &VaultAddress, asset: &AssetId, amount: Amount) -> Result<(), ContractError> {
        self.assets.move_between_vaults(asset, from, to, amount)?;
        self.with_vault(to, |creditor, host| {
            creditor.receive(host, Holder::Vault(*from), *asset, amount)
        })
    }

    fn notify_collected(
        &mut self,
        creditor: &VaultAddress,
        debtor: &VaultAddress,
        debt_id: &DebtId,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<(), ContractError> {
        self.with_vault(creditor, |creditor, host| {
            creditor.on_collect(host, debtor, debt_id, *asset, amount)
        })
    }

    fn clearing_forgive(
        &mut self,
        house: &ClearingHouseAddress,
        debtor: &VaultAddress,
        debt_id: &DebtId,
    ) -> Result<(), ClearingError> {
        let clearing_house = self
            .house_mut(house)
            .ok_or(ClearingError::NotRegisteredVault { house: *house })?;
        let event = clearing_house.forgive(Caller::Vault(*debtor), debt_id)?;
        self.events.push(event);
        Ok(())
    }

    fn is_cleared(&self, house: &ClearingHouseAddress, vault: &VaultAddress, debt_id: &DebtId) -> Result<bool, ContractError> {
        self.houses
            .get(house)
            .map(|h| h.is_cleared(vault, debt_id))
            .ok_or_else(|| house_not_found(house))
    }

    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// An in-memory ledger hosting vaults, clearing houses and assets.
pub struct Ledger {
    world: World,
    clock: Arc<dyn Clock>,
    verifier: Arc<dyn SignatureVerifier>,
    config: ProtocolConfig,
    log: Vec<EventRecord>,
}

impl Ledger {
    /// A ledger verifying signatures with Ed25519.
    pub fn new(config: ProtocolConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_verifier(config, clock, Arc::new(Ed25519Verifier))
    }

    pub fn with_verifier(config: ProtocolConfig, clock: Arc<dyn Clock>, verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self {
            world: World::default(),
            clock,
            verifier,
            config,
            log: Vec::new(),
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Current ledger time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Every event recorded by committed calls, oldest first.
    pub fn events(&self) -> &[EventRecord] {
        &self.log
    }

    /// Runs one call with all-or-nothing semantics.
    fn transact<T>(
        &mut self,
        call: &'static str,
        subject: &dyn Display,
        f: impl FnOnce(&mut CallContext<'_>) -> Result<T, ContractError>,
    ) -> Result<Receipt<T>, ContractError> {
        let span = info_span!("ledger_call", call, subject = %subject);
        let _guard = span.enter();

        let now = self.clock.now();
        self.world.assets.begin();

        let (result, journal, events) = {
            let mut ctx = CallContext {
                now,
                policy: self.config.policy,
                verifier: self.verifier.as_ref(),
                vaults: &mut self.world.vaults,
                houses: &mut self.world.houses,
                assets: &mut self.world.assets,
                nonces: &mut self.world.nonces,
                journal: Journal::default(),
                events: Vec::new(),
            };
            let result = f(&mut ctx);
            (result, ctx.journal, ctx.events)
        };

        match result {
            Ok(value) => {
                self.world.assets.commit();
                let first = self.log.len() as u64;
                self.log.extend(events.iter().cloned().enumerate().map(|(i, event)| EventRecord {
                    sequence: first + i as u64,
                    at: now,
                    event,
                }));
                info!(events = ?events.iter().map(Event::name).collect::<Vec<_>>(), "call committed");
                Ok(Receipt { value, events })
            }
            Err(err) => {
                journal.undo(&mut self.world);
                debug!(error = %err, discarded = events.len(), "call rolled back");
                Err(err)
            }
        }
    }

    fn vault_call<T>(
        &mut self,
        call: &'static str,
        address: &VaultAddress,
        f: impl FnOnce(&mut Vault, &mut dyn VaultHost) -> Result<T, ContractError>,
    ) -> Result<Receipt<T>, ContractError> {
        self.transact(call, address, |ctx| ctx.with_vault(address, f))
    }

    // -----------------------------------------------------------------------
    // Deployment
    // -----------------------------------------------------------------------

    /// Deploys a clearing house and returns its address.
    pub fn deploy_clearing_house(&mut self, deployer: &Identity, kind: ClearingHouseKind) -> ClearingHouseAddress {
        let nonce = self.world.nonces.entry(*deployer).or_insert(0);
        let address = ClearingHouseAddress::derive(deployer, *nonce);
        *nonce += 1;
        self.world
            .houses
            .insert(address, ClearingHouse::new(address, kind));
        info!(house = %address, %kind, "clearing house deployed");
        address
    }

    /// Opens a vault owned by `creator`, bound to `clearing_house`.
    ///
    /// `retiring_period_secs` defaults to the configured period.
    pub fn open_vault(
        &mut self,
        creator: &Identity,
        clearing_house: &ClearingHouseAddress,
        retiring_period_secs: Option<u64>,
    ) -> Result<Receipt<VaultAddress>, ContractError> {
        let retiring_period_secs = retiring_period_secs.unwrap_or(self.config.default_retiring_period_secs);
        self.transact("open_vault", clearing_house, |ctx| {
            if retiring_period_secs > MAX_PERIOD_SECS {
                return Err(ContractError::InvalidState(format!(
                    "retiring period {}s exceeds maximum {}s",
                    retiring_period_secs, MAX_PERIOD_SECS
                )));
            }
            if !ctx.houses.contains_key(clearing_house) {
                return Err(house_not_found(clearing_house));
            }

            let nonce = ctx.next_nonce(creator);
            let address = VaultAddress::derive(creator, nonce);
            if let Some(house) = ctx.house_mut(clearing_house) {
                house.register_vault(address);
            }
            ctx.journal.record_vault(&address, ctx.vaults.get(&address));
            ctx.vaults.insert(
                address,
                Vault::open(address, *clearing_house, *creator, retiring_period_secs),
            );
            ctx.emit(Event::VaultOpened {
                vault: address,
                clearing_house: *clearing_house,
                creator: *creator,
                retiring_period_secs,
            });
            Ok(address)
        })
    }

    // -----------------------------------------------------------------------
    // Custody
    // -----------------------------------------------------------------------

    /// Credits an external account with freshly issued funds.
    pub fn mint(&mut self, asset: AssetId, to: &Identity, amount: Amount) -> Result<(), ContractError> {
        self.world.assets.mint(asset, *to, amount)?;
        debug!(%asset, account = %to, amount, "minted");
        Ok(())
    }

    /// Sets the allowance `owner` grants `spender` over `token`.
    pub fn approve(&mut self, owner: &Identity, token: TokenAddress, spender: &VaultAddress, amount: Amount) {
        self.world.assets.approve(token, *owner, *spender, amount);
    }

    /// An external account's balance.
    pub fn account_balance(&self, asset: &AssetId, account: &Identity) -> Amount {
        self.world.assets.balance_of(asset, &Holder::Account(*account))
    }

    pub fn allowance(&self, token: &TokenAddress, owner: &Identity, spender: &VaultAddress) -> Amount {
        self.world.assets.allowance(token, owner, spender)
    }

    // -----------------------------------------------------------------------
    // Vault operations
    // -----------------------------------------------------------------------

    /// Deposits into a vault. Native deposits carry `attached_value`, which
    /// must equal `amount`; token deposits carry none.
    pub fn deposit(
        &mut self,
        vault: &VaultAddress,
        depositor: &Identity,
        asset: AssetId,
        amount: Amount,
        attached_value: Amount,
    ) -> Result<Receipt<()>, ContractError> {
        self.vault_call("deposit", vault, |v, host| {
            v.deposit(host, depositor, asset, amount, attached_value)
        })
    }

    pub fn withdraw(
        &mut self,
        vault: &VaultAddress,
        destination: &Identity,
        asset: AssetId,
        amount: Amount,
        signature: &Signature,
    ) -> Result<Receipt<()>, ContractError> {
        self.vault_call("withdraw", vault, |v, host| {
            v.withdraw(host, destination, asset, amount, signature)
        })
    }

    pub fn add_debt(
        &mut self,
        vault: &VaultAddress,
        terms: DebtTerms,
        debtor_signature: &Signature,
        creditor_signature: &Signature,
    ) -> Result<Receipt<DebtId>, ContractError> {
        self.vault_call("add_debt", vault, |v, host| {
            v.add_debt(host, terms, debtor_signature, creditor_signature)
        })
    }

    pub fn collect_debt(
        &mut self,
        vault: &VaultAddress,
        debt_id: &DebtId,
        signature: &Signature,
    ) -> Result<Receipt<Collection>, ContractError> {
        self.vault_call("collect_debt", vault, |v, host| {
            v.collect_debt(host, debt_id, signature)
        })
    }

    pub fn forgive_debt(
        &mut self,
        vault: &VaultAddress,
        debt_id: &DebtId,
        signature: &Signature,
    ) -> Result<Receipt<()>, ContractError> {
        self.vault_call("forgive_debt", vault, |v, host| {
            v.forgive_debt(host, debt_id, signature)
        })
    }

    pub fn forgive_debt_by_counterparty(
        &mut self,
        vault: &VaultAddress,
        destination: &VaultAddress,
        asset: &AssetId,
        signature: &Signature,
    ) -> Result<Receipt<DebtId>, ContractError> {
        self.vault_call("forgive_debt_by_counterparty", vault, |v, host| {
            v.forgive_debt_by_counterparty(host, destination, asset, signature)
        })
    }

    pub fn remove_debt(&mut self, vault: &VaultAddress, debt_id: &DebtId) -> Result<Receipt<()>, ContractError> {
        self.vault_call("remove_debt", vault, |v, host| v.remove_debt(host, debt_id))
    }

    pub fn add_owner(
        &mut self,
        vault: &VaultAddress,
        candidate: &Identity,
        signature: &Signature,
    ) -> Result<Receipt<()>, ContractError> {
        self.vault_call("add_owner", vault, |v, host| {
            v.add_owner(host, candidate, signature)
        })
    }

    pub fn remove_owner(
        &mut self,
        vault: &VaultAddress,
        candidate: &Identity,
        signature: &Signature,
    ) -> Result<Receipt<()>, ContractError> {
        self.vault_call("remove_owner", vault, |v, host| {
            v.remove_owner(host, candidate, signature)
        })
    }

    pub fn add_signer(
        &mut self,
        vault: &VaultAddress,
        candidate: &Identity,
        signature: &Signature,
    ) -> Result<Receipt<()>, ContractError> {
        self.vault_call("add_signer", vault, |v, host| {
            v.add_signer(host, candidate, signature)
        })
    }

    pub fn remove_signer(
        &mut self,
        vault: &VaultAddress,
        candidate: &Identity,
        signature: &Signature,
    ) -> Result<Receipt<()>, ContractError> {
        self.vault_call("remove_signer", vault, |v, host| {
            v.remove_signer(host, candidate, signature)
        })
    }

    pub fn retire(&mut self, vault: &VaultAddress, signature: &Signature) -> Result<Receipt<()>, ContractError> {
        self.vault_call("retire", vault, |v, host| v.retire(host, signature))
    }

    pub fn stop(&mut self, vault: &VaultAddress) -> Result<Receipt<()>, ContractError> {
        self.vault_call("stop", vault, |v, host| v.stop(host))
    }

    // -----------------------------------------------------------------------
    // Clearing house operations
    // -----------------------------------------------------------------------

    /// Nets `debt_a` (owed by `vault_a`) against `debt_b` (owed by `vault_b`).
    #[allow(clippy::too_many_arguments)]
    pub fn clear(
        &mut self,
        clearing_house: &ClearingHouseAddress,
        vault_a: &VaultAddress,
        vault_b: &VaultAddress,
        debt_a: &DebtId,
        debt_b: &DebtId,
        signature_a: &Signature,
        signature_b: &Signature,
    ) -> Result<Receipt<()>, ContractError> {
        self.transact("clear", clearing_house, |ctx| {
            let house = ctx
                .houses
                .get_mut(clearing_house)
                .ok_or_else(|| house_not_found(clearing_house))?;
            ctx.journal.record_house(clearing_house, Some(&*house));
            let events = house.clear(
                &*ctx.vaults,
                ctx.verifier,
                vault_a,
                vault_b,
                debt_a,
                debt_b,
                signature_a,
                signature_b,
            )?;
            ctx.events.extend(events);
            Ok(())
        })
    }

    /// Calls a clearing house's forgiveness entry point directly from an
    /// external account. Houses only accept this from their vaults, so it
    /// always fails; it exists so that refusal is observable.
    pub fn forgive_at_clearing_house(
        &mut self,
        clearing_house: &ClearingHouseAddress,
        caller: &Identity,
        debt_id: &DebtId,
    ) -> Result<Receipt<()>, ContractError> {
        self.transact("forgive", clearing_house, |ctx| {
            let house = ctx
                .house_mut(clearing_house)
                .ok_or_else(|| house_not_found(clearing_house))?;
            let event = house.forgive(Caller::Account(*caller), debt_id)?;
            ctx.emit(event);
            Ok(())
        })
    }

    pub fn is_cleared(
        &self,
        clearing_house: &ClearingHouseAddress,
        vault: &VaultAddress,
        debt_id: &DebtId,
    ) -> Result<bool, ContractError> {
        self.world
            .houses
            .get(clearing_house)
            .map(|h| h.is_cleared(vault, debt_id))
            .ok_or_else(|| house_not_found(clearing_house))
    }

    pub fn clearing_house_kind(&self, clearing_house: &ClearingHouseAddress) -> Result<ClearingHouseKind, ContractError> {
        self.world
            .houses
            .get(clearing_house)
            .map(ClearingHouse::kind)
            .ok_or_else(|| house_not_found(clearing_house))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// A vault that has not been stopped. Stopped vaults answer no queries.
    pub fn vault(&self, address: &VaultAddress) -> Result<&Vault, ContractError> {
        let vault = self
            .world
            .vaults
            .get(address)
            .ok_or_else(|| vault_not_found(address))?;
        vault.lifecycle().ensure_not_stopped("query")?;
        Ok(vault)
    }

    pub fn balance(&self, vault: &VaultAddress, asset: &AssetId) -> Result<Amount, ContractError> {
        Ok(self.vault(vault)?.balance(asset))
    }

    pub fn balance_size(&self, vault: &VaultAddress) -> Result<u64, ContractError> {
        Ok(self.vault(vault)?.balance_size())
    }

    pub fn debt(&self, vault: &VaultAddress, debt_id: &DebtId) -> Result<Option<Debt>, ContractError> {
        Ok(self.vault(vault)?.debt(debt_id).cloned())
    }

    pub fn debts_size(&self, vault: &VaultAddress) -> Result<u64, ContractError> {
        Ok(self.vault(vault)?.debts_size())
    }

    pub fn is_owner(&self, vault: &VaultAddress, identity: &Identity) -> Result<bool, ContractError> {
        Ok(self.vault(vault)?.is_owner(identity))
    }

    pub fn is_signer(&self, vault: &VaultAddress, identity: &Identity) -> Result<bool, ContractError> {
        Ok(self.vault(vault)?.is_signer(identity))
    }

    /// Lifecycle state. Fails once the vault is stopped.
    pub fn lifecycle(&self, vault: &VaultAddress) -> Result<LifecycleState, ContractError> {
        Ok(self.vault(vault)?.lifecycle().state())
    }

    /// The id `vault` would store a debt to `destination` under.
    pub fn debt_identifier(
        &self,
        vault: &VaultAddress,
        destination: &VaultAddress,
        asset: &AssetId,
        salt: u64,
    ) -> Result<DebtId, ContractError> {
        self.vault(vault)?;
        Ok(debt_identifier(vault, destination, asset, salt))
    }

    pub fn vault_snapshot(&self, vault: &VaultAddress) -> Result<VaultSnapshot, ContractError> {
        Ok(self.vault(vault)?.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_protocol::clock::ManualClock;
    use tally_protocol::crypto::Keypair;

    fn ledger() -> (Ledger, ManualClock) {
        let clock = ManualClock::at_epoch();
        (
            Ledger::new(ProtocolConfig::default(), Arc::new(clock.clone())),
            clock,
        )
    }

    #[test]
    fn addresses_are_deterministic_per_creator() {
        let (mut ledger, _) = ledger();
        let alice = Keypair::from_seed(&[1u8; 32]).identity();
        let house = ledger.deploy_clearing_house(&alice, ClearingHouseKind::Standard);
        assert_eq!(house, ClearingHouseAddress::derive(&alice, 0));

        let vault = ledger.open_vault(&alice, &house, None).unwrap().value;
        assert_eq!(vault, VaultAddress::derive(&alice, 1));
        assert!(ledger.world.houses[&house].is_registered(&vault));
        assert_eq!(
            ledger.vault(&vault).unwrap().lifecycle().retiring_period_secs(),
            ProtocolConfig::default().default_retiring_period_secs
        );
    }

    #[test]
    fn open_vault_against_unknown_house_leaves_no_trace() {
        let (mut ledger, _) = ledger();
        let alice = Keypair::from_seed(&[1u8; 32]).identity();
        let err = ledger
            .open_vault(&alice, &ClearingHouseAddress::from_bytes([7u8; 32]), None)
            .unwrap_err();
        assert!(matches!(err, ContractError::NotFound(_)));
        assert!(ledger.events().is_empty());

        // The failed call did not burn a nonce.
        let house = ledger.deploy_clearing_house(&alice, ClearingHouseKind::Standard);
        assert_eq!(house, ClearingHouseAddress::derive(&alice, 0));
    }

    #[test]
    fn failed_call_restores_state_and_drops_events() {
        let (mut ledger, _) = ledger();
        let alice = Keypair::from_seed(&[1u8; 32]);
        let house = ledger.deploy_clearing_house(&alice.identity(), ClearingHouseKind::Standard);
        let vault = ledger
            .open_vault(&alice.identity(), &house, None)
            .unwrap()
            .value;
        ledger.mint(AssetId::Native, &alice.identity(), 100).unwrap();
        ledger
            .deposit(&vault, &alice.identity(), AssetId::Native, 100, 100)
            .unwrap();
        let logged = ledger.events().len();

        // Signed for 50, submitted as 60.
        let auth = Authorization::withdraw(&vault, &alice.identity(), &AssetId::Native, 50);
        let err = ledger
            .withdraw(&vault, &alice.identity(), AssetId::Native, 60, &auth.sign(&alice))
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidSignature { .. }));
        assert_eq!(ledger.balance(&vault, &AssetId::Native).unwrap(), 100);
        assert_eq!(ledger.events().len(), logged);
    }

    #[test]
    fn rollback_restores_touched_vaults_houses_nonces_and_assets() {
        let (mut ledger, _) = ledger();
        let alice = Keypair::from_seed(&[1u8; 32]).identity();
        let house = ledger.deploy_clearing_house(&alice, ClearingHouseKind::Standard);
        let existing = ledger.open_vault(&alice, &house, None).unwrap().value;
        ledger.mint(AssetId::Native, &alice, 100).unwrap();
        ledger
            .deposit(&existing, &alice, AssetId::Native, 40, 40)
            .unwrap();
        let before = ledger.vault_snapshot(&existing).unwrap();
        let fresh = VaultAddress::derive(&alice, 2);

        let err = ledger
            .transact("open_and_fund", &house, |ctx| {
                let nonce = ctx.next_nonce(&alice);
                let address = VaultAddress::derive(&alice, nonce);
                if let Some(h) = ctx.house_mut(&house) {
                    h.register_vault(address);
                }
                ctx.journal.record_vault(&address, None);
                ctx.vaults
                    .insert(address, Vault::open(address, house, alice, 60));
                ctx.with_vault(&existing, |v, host| {
                    v.deposit(host, &alice, AssetId::Native, 60, 60)
                })?;
                Err::<(), _>(ContractError::InvalidState("abort".into()))
            })
            .unwrap_err();

        assert_eq!(err, ContractError::InvalidState("abort".into()));
        assert_eq!(ledger.vault_snapshot(&existing).unwrap(), before);
        assert_eq!(ledger.account_balance(&AssetId::Native, &alice), 60);
        assert!(matches!(ledger.vault(&fresh), Err(ContractError::NotFound(_))));
        assert!(!ledger.world.houses[&house].is_registered(&fresh));
        assert_eq!(ledger.events().len(), 2);

        // The nonce the aborted call took is handed out again.
        let reopened = ledger.open_vault(&alice, &house, None).unwrap().value;
        assert_eq!(reopened, fresh);
    }

    #[test]
    fn event_sequence_numbers_are_contiguous() {
        let (mut ledger, clock) = ledger();
        let alice = Keypair::from_seed(&[1u8; 32]).identity();
        let house = ledger.deploy_clearing_house(&alice, ClearingHouseKind::Standard);
        ledger.open_vault(&alice, &house, None).unwrap();
        clock.advance_secs(5);
        ledger.open_vault(&alice, &house, None).unwrap();

        let records = ledger.events();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, 0);
        assert_eq!(records[1].sequence, 1);
        assert!(records[1].at > records[0].at);
    }
}
