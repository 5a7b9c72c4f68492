//! Integration tests for vault lifecycle (retire, stop) and for owner and
//! signer management under each authorization policy.

mod common;

use common::{Harness, Party};
use tally_contracts::{ClearingHouseKind, ContractError, LifecycleState};
use tally_protocol::config::{AuthorizationPolicy, OwnerRemoval, SignerEnrollment, MAX_PERIOD_SECS};
use tally_protocol::crypto::Keypair;
use tally_protocol::{AssetId, Authorization};

fn retire(h: &mut Harness, party: &Party, key: &Keypair) -> Result<(), ContractError> {
    let auth = Authorization::retire(&party.vault);
    h.ledger.retire(&party.vault, &auth.sign(key)).map(|_| ())
}

fn withdraw_all(h: &mut Harness, party: &Party) {
    let amount = h.native(party);
    let auth = Authorization::withdraw(&party.vault, &party.id(), &AssetId::Native, amount);
    h.ledger
        .withdraw(&party.vault, &party.id(), AssetId::Native, amount, &auth.sign(&party.key))
        .unwrap();
}

fn enroll(h: &mut Harness, party: &Party, candidate: &Keypair) {
    let auth = Authorization::add_signer(&party.vault, &candidate.identity());
    h.ledger
        .add_signer(&party.vault, &candidate.identity(), &auth.sign(&party.key))
        .unwrap();
}

// ---------------------------------------------------------------------------
// Opening
// ---------------------------------------------------------------------------

#[test]
fn open_vault_uses_requested_or_default_retiring_period() {
    let mut h = Harness::new();
    let owner = h.account();

    let custom = h
        .ledger
        .open_vault(&owner.identity(), &h.house, Some(60))
        .unwrap();
    assert_eq!(custom.event_names(), ["vault_opened"]);
    let snapshot = h.ledger.vault_snapshot(&custom.value).unwrap();
    assert_eq!(snapshot.retiring_period_secs, 60);
    assert_eq!(snapshot.state, LifecycleState::Active);
    assert!(snapshot.owners.contains(&owner.identity()));

    let default = h.ledger.open_vault(&owner.identity(), &h.house, None).unwrap();
    assert_ne!(default.value, custom.value);
    assert_eq!(
        h.ledger.vault_snapshot(&default.value).unwrap().retiring_period_secs,
        3_600
    );
}

#[test]
fn open_vault_rejects_absurd_retiring_period() {
    let mut h = Harness::new();
    let owner = h.account();
    let err = h
        .ledger
        .open_vault(&owner.identity(), &h.house, Some(MAX_PERIOD_SECS + 1))
        .unwrap_err();
    assert!(matches!(err, ContractError::InvalidState(_)));
}

// ---------------------------------------------------------------------------
// Retire & stop
// ---------------------------------------------------------------------------

#[test]
fn retire_then_stop_once_empty_and_elapsed() {
    let mut h = Harness::new();
    let a = h.party();
    h.fund(&a, 100);

    retire(&mut h, &a, &a.key).unwrap();
    assert_eq!(h.ledger.lifecycle(&a.vault).unwrap(), LifecycleState::Retiring);

    // Too early, and still holding funds.
    assert!(matches!(h.ledger.stop(&a.vault), Err(ContractError::InvalidState(_))));
    h.clock.advance_secs(3_600);
    assert!(matches!(h.ledger.stop(&a.vault), Err(ContractError::InvalidState(_))));

    withdraw_all(&mut h, &a);
    let receipt = h.ledger.stop(&a.vault).unwrap();
    assert_eq!(receipt.event_names(), ["stop"]);

    // Stopped vaults answer nothing and accept nothing.
    assert!(matches!(h.ledger.lifecycle(&a.vault), Err(ContractError::InvalidState(_))));
    assert!(matches!(
        h.ledger.balance(&a.vault, &AssetId::Native),
        Err(ContractError::InvalidState(_))
    ));
    assert!(matches!(
        h.ledger.deposit(&a.vault, &a.id(), AssetId::Native, 1, 1),
        Err(ContractError::InvalidState(_))
    ));
}

#[test]
fn stop_requires_the_full_retiring_period() {
    let mut h = Harness::new();
    let a = h.party();
    retire(&mut h, &a, &a.key).unwrap();

    h.clock.advance_secs(3_599);
    assert!(h.ledger.stop(&a.vault).is_err());
    h.clock.advance_secs(1);
    h.ledger.stop(&a.vault).unwrap();
}

#[test]
fn active_vault_cannot_be_stopped() {
    let mut h = Harness::new();
    let a = h.party();
    h.clock.advance_secs(1_000_000);
    assert!(matches!(h.ledger.stop(&a.vault), Err(ContractError::InvalidState(_))));
    assert_eq!(h.ledger.lifecycle(&a.vault).unwrap(), LifecycleState::Active);
}

#[test]
fn outstanding_debt_blocks_stop() {
    let mut h = Harness::new();
    let a = h.party();
    let b = h.party();
    h.owe(&a, &b, 10, 1);
    retire(&mut h, &a, &a.key).unwrap();
    h.clock.advance_secs(3_600);

    assert!(matches!(h.ledger.stop(&a.vault), Err(ContractError::InvalidState(_))));
}

#[test]
fn retiring_vault_takes_deposits_and_settles_but_takes_no_new_debt() {
    let mut h = Harness::new();
    let a = h.party();
    let b = h.party();
    let debt_id = h.owe(&a, &b, 40, 1);
    retire(&mut h, &a, &a.key).unwrap();

    let err = h
        .add_debt(&a, &b, Harness::terms(&b, AssetId::Native, 10, 2, 0))
        .unwrap_err();
    assert!(matches!(err, ContractError::InvalidState(_)));

    // Deposits and collection still work so the vault can wind down.
    h.fund(&a, 40);
    h.collect(&a, &b, &debt_id).unwrap();
    h.ledger.remove_debt(&a.vault, &debt_id).unwrap();

    h.clock.advance_secs(3_600);
    h.ledger.stop(&a.vault).unwrap();
}

#[test]
fn only_an_owner_can_retire() {
    let mut h = Harness::new();
    let a = h.party();
    let delegate = Keypair::from_seed(&[0xD1; 32]);
    let stranger = Keypair::from_seed(&[0x66; 32]);
    enroll(&mut h, &a, &delegate);

    assert!(matches!(
        retire(&mut h, &a, &delegate),
        Err(ContractError::Unauthorized { .. })
    ));
    assert!(matches!(
        retire(&mut h, &a, &stranger),
        Err(ContractError::InvalidSignature { .. })
    ));
    retire(&mut h, &a, &a.key).unwrap();
    assert!(matches!(
        retire(&mut h, &a, &a.key),
        Err(ContractError::InvalidState(_))
    ));
}

#[test]
fn stopped_creditor_cannot_be_paid() {
    let mut h = Harness::new();
    let a = h.party();
    let b = h.party();
    h.fund(&a, 100);
    let debt_id = h.owe(&a, &b, 100, 1);

    retire(&mut h, &b, &b.key).unwrap();
    h.clock.advance_secs(3_600);
    h.ledger.stop(&b.vault).unwrap();

    let err = h.collect(&a, &b, &debt_id).unwrap_err();
    assert!(matches!(err, ContractError::InvalidState(_)));
    assert_eq!(h.native(&a), 100);
    assert_eq!(h.debts_size(&a), 1);
}

// ---------------------------------------------------------------------------
// Owners
// ---------------------------------------------------------------------------

#[test]
fn owner_adds_owner_who_can_then_act() {
    let mut h = Harness::new();
    let a = h.party();
    let partner = Keypair::from_seed(&[0xB2; 32]);
    h.fund(&a, 10);

    let auth = Authorization::add_owner(&a.vault, &partner.identity());
    let receipt = h
        .ledger
        .add_owner(&a.vault, &partner.identity(), &auth.sign(&a.key))
        .unwrap();
    assert_eq!(receipt.event_names(), ["add_owner"]);
    assert!(h.ledger.is_owner(&a.vault, &partner.identity()).unwrap());
    assert!(h.ledger.is_signer(&a.vault, &partner.identity()).unwrap());

    // Owners can sign anything a signer can.
    let auth = Authorization::withdraw(&a.vault, &partner.identity(), &AssetId::Native, 10);
    h.ledger
        .withdraw(&a.vault, &partner.identity(), AssetId::Native, 10, &auth.sign(&partner))
        .unwrap();

    // Adding again is a no-op the vault refuses.
    let auth = Authorization::add_owner(&a.vault, &partner.identity());
    assert!(matches!(
        h.ledger.add_owner(&a.vault, &partner.identity(), &auth.sign(&a.key)),
        Err(ContractError::InvalidState(_))
    ));
}

#[test]
fn signer_cannot_add_owner() {
    let mut h = Harness::new();
    let a = h.party();
    let delegate = Keypair::from_seed(&[0xD1; 32]);
    enroll(&mut h, &a, &delegate);

    let auth = Authorization::add_owner(&a.vault, &delegate.identity());
    let err = h
        .ledger
        .add_owner(&a.vault, &delegate.identity(), &auth.sign(&delegate))
        .unwrap_err();
    assert!(matches!(err, ContractError::Unauthorized { .. }));
    assert!(!h.ledger.is_owner(&a.vault, &delegate.identity()).unwrap());
}

#[test]
fn last_owner_cannot_be_removed() {
    let mut h = Harness::new();
    let a = h.party();
    let auth = Authorization::remove_owner(&a.vault, &a.id());
    let err = h
        .ledger
        .remove_owner(&a.vault, &a.id(), &auth.sign(&a.key))
        .unwrap_err();
    assert!(matches!(err, ContractError::InvalidState(_)));
    assert!(h.ledger.is_owner(&a.vault, &a.id()).unwrap());
}

fn with_second_owner(h: &mut Harness, a: &Party) -> Keypair {
    let partner = Keypair::from_seed(&[0xB2; 32]);
    let auth = Authorization::add_owner(&a.vault, &partner.identity());
    h.ledger
        .add_owner(&a.vault, &partner.identity(), &auth.sign(&a.key))
        .unwrap();
    partner
}

#[test]
fn any_owner_may_remove_another_by_default() {
    let mut h = Harness::new();
    let a = h.party();
    let partner = with_second_owner(&mut h, &a);

    let auth = Authorization::remove_owner(&a.vault, &a.id());
    h.ledger
        .remove_owner(&a.vault, &a.id(), &auth.sign(&partner))
        .unwrap();
    assert!(!h.ledger.is_owner(&a.vault, &a.id()).unwrap());
    assert!(!h.ledger.is_signer(&a.vault, &a.id()).unwrap());
}

#[test]
fn self_only_removal_policy() {
    let policy = AuthorizationPolicy {
        owner_removal: OwnerRemoval::SelfOnly,
        ..Default::default()
    };
    let mut h = Harness::with(ClearingHouseKind::Standard, policy);
    let a = h.party();
    let partner = with_second_owner(&mut h, &a);

    let auth = Authorization::remove_owner(&a.vault, &a.id());
    assert!(matches!(
        h.ledger.remove_owner(&a.vault, &a.id(), &auth.sign(&partner)),
        Err(ContractError::Unauthorized { .. })
    ));

    let auth = Authorization::remove_owner(&a.vault, &partner.identity());
    h.ledger
        .remove_owner(&a.vault, &partner.identity(), &auth.sign(&partner))
        .unwrap();
    assert!(!h.ledger.is_owner(&a.vault, &partner.identity()).unwrap());
}

// ---------------------------------------------------------------------------
// Signers
// ---------------------------------------------------------------------------

#[test]
fn removed_signer_loses_signing_power() {
    let mut h = Harness::new();
    let a = h.party();
    let delegate = Keypair::from_seed(&[0xD1; 32]);
    h.fund(&a, 10);
    enroll(&mut h, &a, &delegate);

    let auth = Authorization::remove_signer(&a.vault, &delegate.identity());
    let receipt = h
        .ledger
        .remove_signer(&a.vault, &delegate.identity(), &auth.sign(&a.key))
        .unwrap();
    assert_eq!(receipt.event_names(), ["remove_signer"]);

    let auth = Authorization::withdraw(&a.vault, &delegate.identity(), &AssetId::Native, 10);
    let err = h
        .ledger
        .withdraw(&a.vault, &delegate.identity(), AssetId::Native, 10, &auth.sign(&delegate))
        .unwrap_err();
    assert!(matches!(err, ContractError::InvalidSignature { .. }));
}

#[test]
fn signer_may_resign_but_not_remove_others() {
    let mut h = Harness::new();
    let a = h.party();
    let first = Keypair::from_seed(&[0xD1; 32]);
    let second = Keypair::from_seed(&[0xD2; 32]);
    enroll(&mut h, &a, &first);
    enroll(&mut h, &a, &second);

    let auth = Authorization::remove_signer(&a.vault, &second.identity());
    assert!(matches!(
        h.ledger.remove_signer(&a.vault, &second.identity(), &auth.sign(&first)),
        Err(ContractError::Unauthorized { .. })
    ));

    let auth = Authorization::remove_signer(&a.vault, &first.identity());
    h.ledger
        .remove_signer(&a.vault, &first.identity(), &auth.sign(&first))
        .unwrap();
    assert!(!h.ledger.is_signer(&a.vault, &first.identity()).unwrap());
    assert!(h.ledger.is_signer(&a.vault, &second.identity()).unwrap());
}

#[test]
fn self_enrollment_policy() {
    let policy = AuthorizationPolicy {
        signer_enrollment: SignerEnrollment::SelfEnrolled,
        ..Default::default()
    };
    let mut h = Harness::with(ClearingHouseKind::Standard, policy);
    let a = h.party();
    let candidate = Keypair::from_seed(&[0xE1; 32]);
    let auth = Authorization::add_signer(&a.vault, &candidate.identity());

    // An owner signing on the candidate's behalf is not enough.
    assert!(matches!(
        h.ledger.add_signer(&a.vault, &candidate.identity(), &auth.sign(&a.key)),
        Err(ContractError::InvalidSignature { .. })
    ));

    h.ledger
        .add_signer(&a.vault, &candidate.identity(), &auth.sign(&candidate))
        .unwrap();
    assert!(h.ledger.is_signer(&a.vault, &candidate.identity()).unwrap());
    assert!(!h.ledger.is_owner(&a.vault, &candidate.identity()).unwrap());
}

#[test]
fn stranger_cannot_enroll_signers() {
    let mut h = Harness::new();
    let a = h.party();
    let stranger = Keypair::from_seed(&[0x66; 32]);
    let auth = Authorization::add_signer(&a.vault, &stranger.identity());
    assert!(matches!(
        h.ledger.add_signer(&a.vault, &stranger.identity(), &auth.sign(&stranger)),
        Err(ContractError::InvalidSignature { .. })
    ));
}
