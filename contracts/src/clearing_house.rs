//! # Clearing House
//!
//! Records which debts have been netted against each other, and serves the
//! forgiveness callback a vault makes when one of its debts is forgiven or
//! fully collected.
//!
//! ## Clearing
//!
//! Two vaults that owe each other can agree off-band to cancel a pair of
//! debts. Each side signs `Authorization::clear(house, a, b, debt_a, debt_b)`;
//! the house checks the first signature against vault A's signers and the
//! second against vault B's, then marks both `(vault, debt)` pairs cleared.
//! Both or neither: a bad second signature leaves the first pair untouched.
//!
//! A cleared debt is not resolved. Its amount is still owed on paper; it
//! only becomes removable from the debtor vault.
//!
//! ## Forgiveness callback
//!
//! The standard house accepts `forgive` only from a vault registered with it,
//! and marks the pair cleared. The unforgiving variant rejects every call, so
//! vaults bound to it can never have debts forgiven and treat the callback as
//! optional on collection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

use tally_protocol::crypto::{Identity, Signature, SignatureVerifier};
use tally_protocol::{Authorization, ClearingHouseAddress, DebtId, Operation, VaultAddress};

use crate::error::{ContractError, Role};
use crate::events::Event;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why the clearing house declined a forgiveness callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClearingError {
    /// The caller is not a vault registered with this house.
    #[error("forgive must be called by a vault registered with clearing house {house}")]
    NotRegisteredVault { house: ClearingHouseAddress },

    /// This house never forgives.
    #[error("clearing house {house} does not accept forgiveness")]
    ForgivenessDisabled { house: ClearingHouseAddress },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Behavior of the forgiveness callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearingHouseKind {
    /// Accepts `forgive` from registered vaults.
    #[default]
    Standard,
    /// Rejects every `forgive`.
    Unforgiving,
}

impl std::fmt::Display for ClearingHouseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClearingHouseKind::Standard => write!(f, "Standard"),
            ClearingHouseKind::Unforgiving => write!(f, "Unforgiving"),
        }
    }
}

/// Who is calling into the house.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Account(Identity),
    Vault(VaultAddress),
}

/// Read access to vault signer sets, which the house needs to check `clear`
/// signatures without owning the vaults.
pub trait SignerDirectory {
    /// Whether `identity` may sign for `vault`.
    ///
    /// Fails with [`ContractError::NotFound`] if no such vault exists, and
    /// with [`ContractError::InvalidState`] if it has been stopped.
    fn is_signer_of(&self, vault: &VaultAddress, identity: &Identity) -> Result<bool, ContractError>;
}

/// One clearing house.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearingHouse {
    address: ClearingHouseAddress,
    kind: ClearingHouseKind,
    /// `(vault, debt)` pairs that have been cleared. Entries are never removed.
    cleared: BTreeSet<(VaultAddress, DebtId)>,
    /// Vaults that were opened against this house.
    vaults: BTreeSet<VaultAddress>,
}

impl ClearingHouse {
    pub fn new(address: ClearingHouseAddress, kind: ClearingHouseKind) -> Self {
        Self {
            address,
            kind,
            cleared: BTreeSet::new(),
            vaults: BTreeSet::new(),
        }
    }

    pub fn address(&self) -> &ClearingHouseAddress {
        &self.address
    }

    pub fn kind(&self) -> ClearingHouseKind {
        self.kind
    }

    /// Registers a vault so its forgiveness callbacks are accepted.
    pub fn register_vault(&mut self, vault: VaultAddress) {
        self.vaults.insert(vault);
    }

    pub fn is_registered(&self, vault: &VaultAddress) -> bool {
        self.vaults.contains(vault)
    }

    /// Whether `(vault, debt_id)` has been cleared.
    pub fn is_cleared(&self, vault: &VaultAddress, debt_id: &DebtId) -> bool {
        self.cleared.contains(&(*vault, *debt_id))
    }

    /// Nets a pair of debts.
    ///
    /// `signature_a` must recover to a signer of `vault_a` and `signature_b`
    /// to a signer of `vault_b`, both over the same clear digest. On success
    /// both pairs are marked cleared and one `Clear` event per pair is
    /// returned.
    ///
    /// Clearing an already-cleared pair is allowed and changes nothing but
    /// the event log.
    #[allow(clippy::too_many_arguments)]
    pub fn clear(
        &mut self,
        directory: &dyn SignerDirectory,
        verifier: &dyn SignatureVerifier,
        vault_a: &VaultAddress,
        vault_b: &VaultAddress,
        debt_a: &DebtId,
        debt_b: &DebtId,
        signature_a: &Signature,
        signature_b: &Signature,
    ) -> Result<Vec<Event>, ContractError> {
        let auth = Authorization::clear(&self.address, vault_a, vault_b, debt_a, debt_b);

        // Check both sides before touching anything.
        self.check_side(directory, verifier, &auth, vault_a, signature_a)?;
        self.check_side(directory, verifier, &auth, vault_b, signature_b)?;

        let mut events = Vec::with_capacity(2);
        for (vault, debt_id) in [(vault_a, debt_a), (vault_b, debt_b)] {
            self.cleared.insert((*vault, *debt_id));
            events.push(Event::Clear {
                clearing_house: self.address,
                vault: *vault,
                debt_id: *debt_id,
            });
        }
        debug!(house = %self.address, a = %vault_a, b = %vault_b, "debt pair cleared");
        Ok(events)
    }

    fn check_side(
        &self,
        directory: &dyn SignerDirectory,
        verifier: &dyn SignatureVerifier,
        auth: &Authorization,
        vault: &VaultAddress,
        signature: &Signature,
    ) -> Result<(), ContractError> {
        let scope = format!("vault {}", vault);
        let signer = verifier
            .recover(auth.digest(), signature)
            .map_err(|_| ContractError::invalid_signature(Operation::Clear, Role::Signer, &scope))?;
        if directory.is_signer_of(vault, &signer)? {
            Ok(())
        } else {
            Err(ContractError::invalid_signature(
                Operation::Clear,
                Role::Signer,
                scope,
            ))
        }
    }

    /// Forgiveness callback. Marks `(caller vault, debt_id)` cleared.
    pub fn forgive(&mut self, caller: Caller, debt_id: &DebtId) -> Result<Event, ClearingError> {
        if self.kind == ClearingHouseKind::Unforgiving {
            return Err(ClearingError::ForgivenessDisabled {
                house: self.address,
            });
        }
        let vault = match caller {
            Caller::Vault(vault) if self.vaults.contains(&vault) => vault,
            _ => {
                return Err(ClearingError::NotRegisteredVault {
                    house: self.address,
                })
            }
        };

        self.cleared.insert((vault, *debt_id));
        Ok(Event::DidForgive {
            clearing_house: self.address,
            vault,
            debt_id: *debt_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tally_protocol::crypto::{Ed25519Verifier, Keypair};

    /// Vault address -> its signers.
    struct Directory(HashMap<VaultAddress, Vec<Identity>>);

    impl SignerDirectory for Directory {
        fn is_signer_of(&self, vault: &VaultAddress, identity: &Identity) -> Result<bool, ContractError> {
            self.0
                .get(vault)
                .map(|signers| signers.contains(identity))
                .ok_or_else(|| ContractError::NotFound(format!("vault {}", vault)))
        }
    }

    struct Fixture {
        house: ClearingHouse,
        directory: Directory,
        alice: Keypair,
        bob: Keypair,
        vault_a: VaultAddress,
        vault_b: VaultAddress,
    }

    fn fixture(kind: ClearingHouseKind) -> Fixture {
        let alice = Keypair::from_seed(&[1u8; 32]);
        let bob = Keypair::from_seed(&[2u8; 32]);
        let vault_a = VaultAddress::derive(&alice.identity(), 0);
        let vault_b = VaultAddress::derive(&bob.identity(), 0);
        let mut house = ClearingHouse::new(ClearingHouseAddress::derive(&alice.identity(), 0), kind);
        house.register_vault(vault_a);
        house.register_vault(vault_b);

        let mut signers = HashMap::new();
        signers.insert(vault_a, vec![alice.identity()]);
        signers.insert(vault_b, vec![bob.identity()]);

        Fixture {
            house,
            directory: Directory(signers),
            alice,
            bob,
            vault_a,
            vault_b,
        }
    }

    #[test]
    fn clear_marks_both_sides() {
        let mut f = fixture(ClearingHouseKind::Standard);
        let (d1, d2) = (DebtId::from_bytes([1u8; 32]), DebtId::from_bytes([2u8; 32]));
        let auth = Authorization::clear(f.house.address(), &f.vault_a, &f.vault_b, &d1, &d2);

        let events = f
            .house
            .clear(
                &f.directory,
                &Ed25519Verifier,
                &f.vault_a,
                &f.vault_b,
                &d1,
                &d2,
                &auth.sign(&f.alice),
                &auth.sign(&f.bob),
            )
            .unwrap();

        assert_eq!(events.len(), 2);
        assert!(f.house.is_cleared(&f.vault_a, &d1));
        assert!(f.house.is_cleared(&f.vault_b, &d2));
        assert!(!f.house.is_cleared(&f.vault_a, &d2));
    }

    #[test]
    fn clear_with_swapped_signatures_changes_nothing() {
        let mut f = fixture(ClearingHouseKind::Standard);
        let (d1, d2) = (DebtId::from_bytes([1u8; 32]), DebtId::from_bytes([2u8; 32]));
        let auth = Authorization::clear(f.house.address(), &f.vault_a, &f.vault_b, &d1, &d2);

        let err = f
            .house
            .clear(
                &f.directory,
                &Ed25519Verifier,
                &f.vault_a,
                &f.vault_b,
                &d1,
                &d2,
                &auth.sign(&f.bob),
                &auth.sign(&f.alice),
            )
            .unwrap_err();

        assert!(matches!(err, ContractError::InvalidSignature { .. }));
        assert!(!f.house.is_cleared(&f.vault_a, &d1));
        assert!(!f.house.is_cleared(&f.vault_b, &d2));
    }

    #[test]
    fn forgive_only_from_registered_vaults() {
        let mut f = fixture(ClearingHouseKind::Standard);
        let debt = DebtId::from_bytes([9u8; 32]);

        let err = f
            .house
            .forgive(Caller::Account(f.alice.identity()), &debt)
            .unwrap_err();
        assert!(matches!(err, ClearingError::NotRegisteredVault { .. }));

        let stranger = VaultAddress::from_bytes([0xEE; 32]);
        assert!(f.house.forgive(Caller::Vault(stranger), &debt).is_err());

        let event = f.house.forgive(Caller::Vault(f.vault_a), &debt).unwrap();
        assert_eq!(
            event,
            Event::DidForgive {
                clearing_house: *f.house.address(),
                vault: f.vault_a,
                debt_id: debt,
            }
        );
        assert!(f.house.is_cleared(&f.vault_a, &debt));
    }

    #[test]
    fn unforgiving_house_rejects_everyone() {
        let mut f = fixture(ClearingHouseKind::Unforgiving);
        let debt = DebtId::from_bytes([9u8; 32]);
        assert!(matches!(
            f.house.forgive(Caller::Vault(f.vault_a), &debt),
            Err(ClearingError::ForgivenessDisabled { .. })
        ));
        assert!(!f.house.is_cleared(&f.vault_a, &debt));
    }
}
