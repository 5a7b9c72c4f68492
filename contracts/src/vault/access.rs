//! Owner and signer sets.
//!
//! Owners administer the vault. Signers may authorize day-to-day operations
//! (withdrawals, debts, collection). Every owner is implicitly a signer, so
//! `is_signer` answers for the union of both sets.
//!
//! The vault always has at least one owner.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use tally_protocol::config::{OwnerRemoval, SignerEnrollment};
use tally_protocol::crypto::Identity;
use tally_protocol::Operation;

use crate::error::{ContractError, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    owners: BTreeSet<Identity>,
    signers: BTreeSet<Identity>,
}

impl AccessControl {
    /// A fresh set with `creator` as the only owner.
    pub fn new(creator: Identity) -> Self {
        Self {
            owners: BTreeSet::from([creator]),
            signers: BTreeSet::new(),
        }
    }

    pub fn is_owner(&self, identity: &Identity) -> bool {
        self.owners.contains(identity)
    }

    /// Owner or explicitly enrolled signer.
    pub fn is_signer(&self, identity: &Identity) -> bool {
        self.is_owner(identity) || self.signers.contains(identity)
    }

    pub fn owners(&self) -> &BTreeSet<Identity> {
        &self.owners
    }

    /// Explicitly enrolled signers, not counting owners.
    pub fn signers(&self) -> &BTreeSet<Identity> {
        &self.signers
    }

    /// Strongest role `identity` holds, if any.
    pub fn role_of(&self, identity: &Identity) -> Option<Role> {
        if self.is_owner(identity) {
            Some(Role::Owner)
        } else if self.signers.contains(identity) {
            Some(Role::Signer)
        } else {
            None
        }
    }

    /// Checks that a recovered `identity` holds `required`.
    ///
    /// An identity the vault has never heard of fails as `InvalidSignature`;
    /// a signer standing in for an owner fails as `Unauthorized`.
    pub fn require(
        &self,
        identity: &Identity,
        required: Role,
        operation: Operation,
        scope: &str,
    ) -> Result<(), ContractError> {
        match (self.role_of(identity), required) {
            (Some(Role::Owner), _) | (Some(Role::Signer), Role::Signer) => Ok(()),
            (Some(Role::Signer), Role::Owner) => Err(ContractError::unauthorized(
                operation,
                format!("{} is a signer but not an owner", identity),
            )),
            (None, _) => Err(ContractError::invalid_signature(operation, required, scope)),
        }
    }

    /// Adds `candidate` as an owner. `authorizer` must already be an owner.
    pub fn add_owner(&mut self, candidate: Identity, authorizer: &Identity, scope: &str) -> Result<(), ContractError> {
        self.require(authorizer, Role::Owner, Operation::AddOwner, scope)?;
        if !self.owners.insert(candidate) {
            return Err(ContractError::InvalidState(format!(
                "{} is already an owner",
                candidate
            )));
        }
        Ok(())
    }

    /// Removes `candidate` from the owners.
    pub fn remove_owner(
        &mut self,
        candidate: &Identity,
        authorizer: &Identity,
        policy: OwnerRemoval,
        scope: &str,
    ) -> Result<(), ContractError> {
        self.require(authorizer, Role::Owner, Operation::RemoveOwner, scope)?;
        if policy == OwnerRemoval::SelfOnly && authorizer != candidate {
            return Err(ContractError::unauthorized(
                Operation::RemoveOwner,
                "owners may only remove themselves",
            ));
        }
        if !self.owners.contains(candidate) {
            return Err(ContractError::NotFound(format!("owner {}", candidate)));
        }
        if self.owners.len() == 1 {
            return Err(ContractError::InvalidState(
                "cannot remove the last owner".into(),
            ));
        }
        self.owners.remove(candidate);
        Ok(())
    }

    /// Enrolls `candidate` as a signer.
    ///
    /// Under [`SignerEnrollment::OwnerDelegated`] the authorizer must be an
    /// owner; under [`SignerEnrollment::SelfEnrolled`] it must be the
    /// candidate itself.
    pub fn add_signer(
        &mut self,
        candidate: Identity,
        authorizer: &Identity,
        policy: SignerEnrollment,
        scope: &str,
    ) -> Result<(), ContractError> {
        match policy {
            SignerEnrollment::OwnerDelegated => {
                self.require(authorizer, Role::Owner, Operation::AddSigner, scope)?
            }
            SignerEnrollment::SelfEnrolled => {
                if *authorizer != candidate {
                    return Err(ContractError::invalid_signature(
                        Operation::AddSigner,
                        Role::Signer,
                        format!("{} (self-enrollment by {})", scope, candidate),
                    ));
                }
            }
        }
        if self.is_signer(&candidate) {
            return Err(ContractError::InvalidState(format!(
                "{} can already sign",
                candidate
            )));
        }
        self.signers.insert(candidate);
        Ok(())
    }

    /// Removes an enrolled signer. An owner may remove anyone; a signer may
    /// always remove itself.
    pub fn remove_signer(&mut self, candidate: &Identity, authorizer: &Identity, scope: &str) -> Result<(), ContractError> {
        if authorizer != candidate {
            self.require(authorizer, Role::Owner, Operation::RemoveSigner, scope)?;
        }
        if !self.signers.remove(candidate) {
            return Err(ContractError::NotFound(format!("signer {}", candidate)));
        }
        Ok(())
    }
}
