//! # Message Digests
//!
//! Every protocol message a principal signs is produced here, by a pure
//! function of the operation's fields. Vaults and clearing houses recompute
//! the same digest from the call arguments and ask the signature verifier
//! who signed it; nothing is inferred from who submitted the call.
//!
//! ## Packing scheme
//!
//! ```text
//! digest = BLAKE3-derive-key(context(operation), field_1 || field_2 || ...)
//! ```
//!
//! - The context string is unique per operation and carries a version, so
//!   a withdraw message can never be replayed as, say, a retire message.
//! - Every field is fixed width: 32-byte addresses, identities and ids,
//!   33-byte assets (tag + 32 bytes), 8-byte big-endian integers. With no
//!   variable-length fields the concatenation is unambiguous, and field
//!   order is part of the message.
//! - The first field is always the address of the contract that checks the
//!   signature, so a message signed for one vault means nothing to another.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::hash::{blake3_hash_multi, domain_separated_hash};
use crate::crypto::keys::{Identity, Keypair, Signature};
use crate::types::{Amount, AssetId, ClearingHouseAddress, DebtId, VaultAddress};

pub use crate::types::Digest;

/// The kind of protocol message an [`Authorization`] covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Withdraw,
    AddDebt,
    CollectDebt,
    ForgiveDebt,
    ForgiveByCounterparty,
    AddOwner,
    RemoveOwner,
    AddSigner,
    RemoveSigner,
    Retire,
    Clear,
}

impl Operation {
    /// BLAKE3 `derive_key` context for this operation.
    pub fn context(&self) -> &'static str {
        match self {
            Operation::Withdraw => "tally 2026-01 vault withdraw v1",
            Operation::AddDebt => "tally 2026-01 vault add-debt v1",
            Operation::CollectDebt => "tally 2026-01 vault collect-debt v1",
            Operation::ForgiveDebt => "tally 2026-01 vault forgive-debt v1",
            Operation::ForgiveByCounterparty => "tally 2026-01 vault forgive-by-counterparty v1",
            Operation::AddOwner => "tally 2026-01 vault add-owner v1",
            Operation::RemoveOwner => "tally 2026-01 vault remove-owner v1",
            Operation::AddSigner => "tally 2026-01 vault add-signer v1",
            Operation::RemoveSigner => "tally 2026-01 vault remove-signer v1",
            Operation::Retire => "tally 2026-01 vault retire v1",
            Operation::Clear => "tally 2026-01 clearing-house clear v1",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A message to be signed: the operation it authorizes plus its digest.
///
/// Co-signers build the same `Authorization` off-band from the agreed terms,
/// sign it, and exchange signatures. The contract rebuilds it from the call
/// arguments, so any disagreement about terms shows up as a failed recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    operation: Operation,
    digest: Digest,
}

/// Fixed-width field accumulator for one message.
struct Packer {
    operation: Operation,
    buf: Vec<u8>,
}

impl Packer {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            buf: Vec::with_capacity(160),
        }
    }

    fn bytes32(mut self, bytes: &[u8; 32]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    fn asset(mut self, asset: &AssetId) -> Self {
        self.buf.extend_from_slice(&asset.encode());
        self
    }

    fn u64(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn finish(self) -> Authorization {
        let digest = Digest::from_bytes(domain_separated_hash(self.operation.context(), &self.buf));
        Authorization {
            operation: self.operation,
            digest,
        }
    }
}

impl Authorization {
    /// `withdraw`: `(vault, destination, asset, amount)`.
    pub fn withdraw(
        vault: &VaultAddress,
        destination: &Identity,
        asset: &AssetId,
        amount: Amount,
    ) -> Self {
        Packer::new(Operation::Withdraw)
            .bytes32(vault.as_bytes())
            .bytes32(destination.as_bytes())
            .asset(asset)
            .u64(amount)
            .finish()
    }

    /// `addDebt`, signed by both debtor and creditor:
    /// `(vault, destination, asset, amount, salt, settlement_period_secs)`.
    pub fn add_debt(
        vault: &VaultAddress,
        destination: &VaultAddress,
        asset: &AssetId,
        amount: Amount,
        salt: u64,
        settlement_period_secs: u64,
    ) -> Self {
        Packer::new(Operation::AddDebt)
            .bytes32(vault.as_bytes())
            .bytes32(destination.as_bytes())
            .asset(asset)
            .u64(amount)
            .u64(salt)
            .u64(settlement_period_secs)
            .finish()
    }

    /// `collectDebt`, signed by the creditor: `(vault, debt_id)`.
    pub fn collect_debt(vault: &VaultAddress, debt_id: &DebtId) -> Self {
        Packer::new(Operation::CollectDebt)
            .bytes32(vault.as_bytes())
            .bytes32(debt_id.as_bytes())
            .finish()
    }

    /// `forgiveDebt`, signed by the creditor: `(vault, debt_id)`.
    pub fn forgive_debt(vault: &VaultAddress, debt_id: &DebtId) -> Self {
        Packer::new(Operation::ForgiveDebt)
            .bytes32(vault.as_bytes())
            .bytes32(debt_id.as_bytes())
            .finish()
    }

    /// Counterparty-keyed forgive: `(vault, destination, asset)`.
    pub fn forgive_by_counterparty(
        vault: &VaultAddress,
        destination: &VaultAddress,
        asset: &AssetId,
    ) -> Self {
        Packer::new(Operation::ForgiveByCounterparty)
            .bytes32(vault.as_bytes())
            .bytes32(destination.as_bytes())
            .asset(asset)
            .finish()
    }

    /// `addOwner`: `(vault, candidate)`.
    pub fn add_owner(vault: &VaultAddress, candidate: &Identity) -> Self {
        Self::membership(Operation::AddOwner, vault, candidate)
    }

    /// `removeOwner`: `(vault, candidate)`.
    pub fn remove_owner(vault: &VaultAddress, candidate: &Identity) -> Self {
        Self::membership(Operation::RemoveOwner, vault, candidate)
    }

    /// `addSigner`: `(vault, candidate)`.
    pub fn add_signer(vault: &VaultAddress, candidate: &Identity) -> Self {
        Self::membership(Operation::AddSigner, vault, candidate)
    }

    /// `removeSigner`: `(vault, candidate)`.
    pub fn remove_signer(vault: &VaultAddress, candidate: &Identity) -> Self {
        Self::membership(Operation::RemoveSigner, vault, candidate)
    }

    fn membership(operation: Operation, vault: &VaultAddress, candidate: &Identity) -> Self {
        Packer::new(operation)
            .bytes32(vault.as_bytes())
            .bytes32(candidate.as_bytes())
            .finish()
    }

    /// `retire`: `(vault)`.
    pub fn retire(vault: &VaultAddress) -> Self {
        Packer::new(Operation::Retire)
            .bytes32(vault.as_bytes())
            .finish()
    }

    /// `clear`, signed by both sides:
    /// `(house, vault_a, vault_b, debt_id_a, debt_id_b)`.
    pub fn clear(
        house: &ClearingHouseAddress,
        vault_a: &VaultAddress,
        vault_b: &VaultAddress,
        debt_id_a: &DebtId,
        debt_id_b: &DebtId,
    ) -> Self {
        Packer::new(Operation::Clear)
            .bytes32(house.as_bytes())
            .bytes32(vault_a.as_bytes())
            .bytes32(vault_b.as_bytes())
            .bytes32(debt_id_a.as_bytes())
            .bytes32(debt_id_b.as_bytes())
            .finish()
    }

    /// The operation this message authorizes.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// The digest that gets signed.
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Sign this message with `keypair`.
    pub fn sign(&self, keypair: &Keypair) -> Signature {
        crate::crypto::signatures::sign(keypair, &self.digest)
    }
}

/// Storage key of the debt `debtor` owes `destination` in `asset` under `salt`.
///
/// Stable across versions: the preimage is a fixed-width concatenation behind
/// a domain prefix, hashed with plain BLAKE3.
pub fn debt_identifier(
    debtor: &VaultAddress,
    destination: &VaultAddress,
    asset: &AssetId,
    salt: u64,
) -> DebtId {
    DebtId::from_bytes(blake3_hash_multi(&[
        b"tally/debt-id\x00",
        debtor.as_bytes(),
        destination.as_bytes(),
        &asset.encode(),
        &salt.to_be_bytes(),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenAddress;

    fn vault(byte: u8) -> VaultAddress {
        VaultAddress::from_bytes([byte; 32])
    }

    fn usd() -> AssetId {
        AssetId::Token(TokenAddress::from_symbol("USD"))
    }

    #[test]
    fn digests_are_deterministic() {
        let a = Authorization::add_debt(&vault(1), &vault(2), &usd(), 100, 7, 60);
        let b = Authorization::add_debt(&vault(1), &vault(2), &usd(), 100, 7, 60);
        assert_eq!(a, b);
        assert_eq!(a.operation(), Operation::AddDebt);
    }

    #[test]
    fn every_field_changes_the_add_debt_digest() {
        let base = Authorization::add_debt(&vault(1), &vault(2), &usd(), 100, 7, 60);
        let variants = [
            Authorization::add_debt(&vault(9), &vault(2), &usd(), 100, 7, 60),
            Authorization::add_debt(&vault(1), &vault(9), &usd(), 100, 7, 60),
            Authorization::add_debt(&vault(1), &vault(2), &AssetId::Native, 100, 7, 60),
            Authorization::add_debt(&vault(1), &vault(2), &usd(), 101, 7, 60),
            Authorization::add_debt(&vault(1), &vault(2), &usd(), 100, 8, 60),
            Authorization::add_debt(&vault(1), &vault(2), &usd(), 100, 7, 61),
        ];
        for variant in variants {
            assert_ne!(base.digest(), variant.digest());
        }
    }

    #[test]
    fn field_order_matters() {
        // Swapping debtor and creditor must not produce the same message.
        let ab = Authorization::add_debt(&vault(1), &vault(2), &usd(), 100, 0, 0);
        let ba = Authorization::add_debt(&vault(2), &vault(1), &usd(), 100, 0, 0);
        assert_ne!(ab.digest(), ba.digest());
    }

    #[test]
    fn operations_with_identical_fields_do_not_collide() {
        let debt_id = DebtId::from_bytes([5u8; 32]);
        let collect = Authorization::collect_debt(&vault(1), &debt_id);
        let forgive = Authorization::forgive_debt(&vault(1), &debt_id);
        assert_ne!(collect.digest(), forgive.digest());

        let who = Identity::from_bytes([3u8; 32]);
        let digests = [
            Authorization::add_owner(&vault(1), &who),
            Authorization::remove_owner(&vault(1), &who),
            Authorization::add_signer(&vault(1), &who),
            Authorization::remove_signer(&vault(1), &who),
        ];
        for (i, a) in digests.iter().enumerate() {
            for b in &digests[i + 1..] {
                assert_ne!(a.digest(), b.digest());
            }
        }
    }

    #[test]
    fn contexts_carry_the_message_version() {
        let suffix = format!("v{}", crate::config::MESSAGE_VERSION);
        for op in [
            Operation::Withdraw,
            Operation::AddDebt,
            Operation::CollectDebt,
            Operation::ForgiveDebt,
            Operation::ForgiveByCounterparty,
            Operation::AddOwner,
            Operation::RemoveOwner,
            Operation::AddSigner,
            Operation::RemoveSigner,
            Operation::Retire,
            Operation::Clear,
        ] {
            assert!(op.context().ends_with(&suffix), "{op} context is unversioned");
        }
    }

    #[test]
    fn debt_identifier_binds_every_input() {
        let base = debt_identifier(&vault(1), &vault(2), &usd(), 0x125);
        assert_eq!(base, debt_identifier(&vault(1), &vault(2), &usd(), 0x125));
        assert_ne!(base, debt_identifier(&vault(2), &vault(1), &usd(), 0x125));
        assert_ne!(base, debt_identifier(&vault(1), &vault(2), &AssetId::Native, 0x125));
        assert_ne!(base, debt_identifier(&vault(1), &vault(2), &usd(), 0x126));
    }

    #[test]
    fn signed_authorization_recovers_signer() {
        let kp = Keypair::generate();
        let auth = Authorization::retire(&vault(4));
        let sig = auth.sign(&kp);
        assert_eq!(
            crate::crypto::recover(auth.digest(), &sig),
            Ok(kp.identity())
        );
    }
}
