// Copyright (c) 2026 Tally Contributors. MIT License.
// See LICENSE for details.

//! # Tally Protocol Core Library
//!
//! Primitives shared by the Tally contracts: the vault that holds balances
//! and debts, and the clearing house that nets debts between vaults.
//!
//! ## Architecture
//!
//! - **crypto**: Ed25519 keys, signatures and the verifier seam; BLAKE3.
//! - **types**: addresses, asset ids, debt ids, digests.
//! - **digest**: the exact bytes every protocol message signs.
//! - **clock**: the time source the ledger reads once per call.
//! - **config**: constants, authorization policies, runtime config.
//! - **logging**: `tracing` subscriber setup.
//!
//! ## Design Philosophy
//!
//! 1. Authorization is always a signature over a digest, never "who called".
//! 2. Every signed message binds the contract that checks it.
//! 3. If it touches money, it has tests. Plural.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod digest;
pub mod logging;
pub mod types;

pub use digest::{debt_identifier, Authorization, Digest, Operation};
pub use types::{Amount, AssetId, ClearingHouseAddress, DebtId, TokenAddress, VaultAddress};
