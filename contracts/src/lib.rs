// Copyright (c) 2026 Tally Contributors. MIT License.
// See LICENSE for details.

//! # Tally Contracts
//!
//! Signature-authorized custody and bilateral credit between vaults:
//!
//! - **Vault**: holds balances for a set of owners and signers, records
//!   debts it owes other vaults, and pays them when the creditor collects.
//! - **Clearing House**: nets pairs of debts between vaults and serves the
//!   forgiveness callback vaults make when a debt is forgiven or settled.
//! - **Ledger**: the in-memory substrate both run on: asset custody, clock,
//!   signature verification, cross-contract routing, all-or-nothing calls
//!   and an ordered event log.
//!
//! ## Design Principles
//!
//! 1. Every monetary operation uses checked arithmetic. Wrapping arithmetic
//!    and money do not mix.
//! 2. State transitions are explicit: enum variants, not boolean flags.
//! 3. A signature over a digest gates every privileged operation.
//! 4. A failed call changes nothing and emits nothing.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use tally_contracts::{ClearingHouseKind, Ledger};
//! use tally_protocol::clock::ManualClock;
//! use tally_protocol::config::ProtocolConfig;
//! use tally_protocol::crypto::Keypair;
//! use tally_protocol::{AssetId, Authorization};
//!
//! let alice = Keypair::generate();
//! let mut ledger = Ledger::new(ProtocolConfig::default(), Arc::new(ManualClock::at_epoch()));
//!
//! let house = ledger.deploy_clearing_house(&alice.identity(), ClearingHouseKind::Standard);
//! let vault = ledger.open_vault(&alice.identity(), &house, None).unwrap().value;
//!
//! ledger.mint(AssetId::Native, &alice.identity(), 100).unwrap();
//! ledger.deposit(&vault, &alice.identity(), AssetId::Native, 100, 100).unwrap();
//!
//! let auth = Authorization::withdraw(&vault, &alice.identity(), &AssetId::Native, 40);
//! ledger
//!     .withdraw(&vault, &alice.identity(), AssetId::Native, 40, &auth.sign(&alice))
//!     .unwrap();
//! assert_eq!(ledger.balance(&vault, &AssetId::Native).unwrap(), 60);
//! ```

pub mod assets;
pub mod clearing_house;
pub mod error;
pub mod events;
pub mod ledger;
pub mod vault;

pub use assets::{AssetBook, Holder, TransferError};
pub use clearing_house::{Caller, ClearingError, ClearingHouse, ClearingHouseKind, SignerDirectory};
pub use error::{ContractError, Role};
pub use events::{Event, EventRecord};
pub use ledger::{Ledger, Receipt};
pub use vault::{Collection, Debt, DebtTerms, LifecycleState, Vault, VaultHost, VaultSnapshot};
