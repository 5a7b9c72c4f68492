//! Shared scaffolding for the integration tests: a ledger on a manual clock,
//! one clearing house, and helpers that sign messages the way counterparties
//! would off-band.

#![allow(dead_code)]

use std::sync::Arc;

use tally_contracts::{ClearingHouseKind, Collection, ContractError, DebtTerms, Ledger, Receipt};
use tally_protocol::clock::ManualClock;
use tally_protocol::config::{AuthorizationPolicy, ProtocolConfig};
use tally_protocol::crypto::Keypair;
use tally_protocol::logging::try_init_test_logging;
use tally_protocol::{AssetId, Authorization, ClearingHouseAddress, DebtId, TokenAddress, VaultAddress};

/// Every party starts with this much of the native asset and of USD.
pub const STARTING_FUNDS: u64 = 1_000_000;

pub struct Party {
    pub key: Keypair,
    pub vault: VaultAddress,
}

impl Party {
    pub fn id(&self) -> tally_protocol::crypto::Identity {
        self.key.identity()
    }
}

pub struct Harness {
    pub ledger: Ledger,
    pub clock: ManualClock,
    pub house: ClearingHouseAddress,
    next_seed: u8,
}

pub fn usd() -> AssetId {
    AssetId::Token(TokenAddress::from_symbol("USD"))
}

pub fn usd_token() -> TokenAddress {
    TokenAddress::from_symbol("USD")
}

impl Harness {
    pub fn new() -> Self {
        Self::with(ClearingHouseKind::Standard, AuthorizationPolicy::default())
    }

    pub fn with(kind: ClearingHouseKind, policy: AuthorizationPolicy) -> Self {
        try_init_test_logging();
        let clock = ManualClock::at_epoch();
        let config = ProtocolConfig {
            default_retiring_period_secs: 3_600,
            policy,
        };
        let mut ledger = Ledger::new(config, Arc::new(clock.clone()));
        let operator = Keypair::from_seed(&[0xFF; 32]);
        let house = ledger.deploy_clearing_house(&operator.identity(), kind);
        Self {
            ledger,
            clock,
            house,
            next_seed: 1,
        }
    }

    /// A fresh keypair with native and USD funds, not bound to any vault.
    pub fn account(&mut self) -> Keypair {
        let key = Keypair::from_seed(&[self.next_seed; 32]);
        self.next_seed += 1;
        self.ledger
            .mint(AssetId::Native, &key.identity(), STARTING_FUNDS)
            .unwrap();
        self.ledger.mint(usd(), &key.identity(), STARTING_FUNDS).unwrap();
        key
    }

    /// A funded account that owns a fresh vault bound to the house.
    pub fn party(&mut self) -> Party {
        let key = self.account();
        let vault = self
            .ledger
            .open_vault(&key.identity(), &self.house, None)
            .unwrap()
            .value;
        Party { key, vault }
    }

    /// Deposits `amount` of native currency from the party's own account.
    pub fn fund(&mut self, party: &Party, amount: u64) {
        self.ledger
            .deposit(&party.vault, &party.id(), AssetId::Native, amount, amount)
            .unwrap();
    }

    /// Deposits `amount` of USD through an allowance.
    pub fn fund_usd(&mut self, party: &Party, amount: u64) {
        self.ledger
            .approve(&party.id(), usd_token(), &party.vault, amount);
        self.ledger
            .deposit(&party.vault, &party.id(), usd(), amount, 0)
            .unwrap();
    }

    pub fn terms(creditor: &Party, asset: AssetId, amount: u64, salt: u64, period: u64) -> DebtTerms {
        DebtTerms {
            destination: creditor.vault,
            asset,
            amount,
            salt,
            settlement_period_secs: period,
        }
    }

    /// `debtor` owes `creditor`, both signing with their vault keys.
    pub fn add_debt(
        &mut self,
        debtor: &Party,
        creditor: &Party,
        terms: DebtTerms,
    ) -> Result<Receipt<DebtId>, ContractError> {
        let auth = terms.authorization(&debtor.vault);
        self.ledger.add_debt(
            &debtor.vault,
            terms,
            &auth.sign(&debtor.key),
            &auth.sign(&creditor.key),
        )
    }

    /// A native debt with no settlement period.
    pub fn owe(&mut self, debtor: &Party, creditor: &Party, amount: u64, salt: u64) -> DebtId {
        let terms = Self::terms(creditor, AssetId::Native, amount, salt, 0);
        self.add_debt(debtor, creditor, terms).unwrap().value
    }

    pub fn collect(
        &mut self,
        debtor: &Party,
        creditor: &Party,
        debt_id: &DebtId,
    ) -> Result<Receipt<Collection>, ContractError> {
        let auth = Authorization::collect_debt(&debtor.vault, debt_id);
        self.ledger
            .collect_debt(&debtor.vault, debt_id, &auth.sign(&creditor.key))
    }

    pub fn forgive(
        &mut self,
        debtor: &Party,
        creditor: &Party,
        debt_id: &DebtId,
    ) -> Result<Receipt<()>, ContractError> {
        let auth = Authorization::forgive_debt(&debtor.vault, debt_id);
        self.ledger
            .forgive_debt(&debtor.vault, debt_id, &auth.sign(&creditor.key))
    }

    pub fn native(&self, party: &Party) -> u64 {
        self.ledger.balance(&party.vault, &AssetId::Native).unwrap()
    }

    pub fn debts_size(&self, party: &Party) -> u64 {
        self.ledger.debts_size(&party.vault).unwrap()
    }
}
