//! # Events
//!
//! Observable records of successful operations. A call's events are recorded
//! only if the whole call commits; a failed call leaves no trace in the log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_protocol::crypto::Identity;
use tally_protocol::{Amount, AssetId, ClearingHouseAddress, DebtId, VaultAddress};

use crate::assets::Holder;

/// Something that happened in a committed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A vault was opened and registered with its clearing house.
    VaultOpened {
        vault: VaultAddress,
        clearing_house: ClearingHouseAddress,
        creator: Identity,
        retiring_period_secs: u64,
    },
    Deposit {
        vault: VaultAddress,
        from: Holder,
        asset: AssetId,
        amount: Amount,
    },
    Withdraw {
        vault: VaultAddress,
        destination: Identity,
        asset: AssetId,
        amount: Amount,
        authorized_by: Identity,
    },
    AddDebt {
        vault: VaultAddress,
        destination: VaultAddress,
        debt_id: DebtId,
        asset: AssetId,
        amount: Amount,
        collection_after: DateTime<Utc>,
    },
    /// A debt was fully repaid by collection.
    Close { vault: VaultAddress, debt_id: DebtId },
    /// Emitted by the creditor vault when a payment on one of its claims arrives.
    OnCollect {
        vault: VaultAddress,
        debtor: VaultAddress,
        debt_id: DebtId,
        asset: AssetId,
        amount: Amount,
    },
    Collect {
        vault: VaultAddress,
        destination: VaultAddress,
        debt_id: DebtId,
        asset: AssetId,
        amount: Amount,
        remaining: Amount,
    },
    ForgiveDebt {
        vault: VaultAddress,
        destination: VaultAddress,
        debt_id: DebtId,
    },
    RemoveDebt { vault: VaultAddress, debt_id: DebtId },
    /// A clearing house accepted a forgiveness callback from a vault.
    DidForgive {
        clearing_house: ClearingHouseAddress,
        vault: VaultAddress,
        debt_id: DebtId,
    },
    /// A clearing house marked one side of a netted pair as cleared.
    Clear {
        clearing_house: ClearingHouseAddress,
        vault: VaultAddress,
        debt_id: DebtId,
    },
    AddOwner {
        vault: VaultAddress,
        owner: Identity,
        authorized_by: Identity,
    },
    RemoveOwner {
        vault: VaultAddress,
        owner: Identity,
        authorized_by: Identity,
    },
    AddSigner {
        vault: VaultAddress,
        signer: Identity,
        authorized_by: Identity,
    },
    RemoveSigner {
        vault: VaultAddress,
        signer: Identity,
        authorized_by: Identity,
    },
    Retire {
        vault: VaultAddress,
        since: DateTime<Utc>,
        stoppable_after: DateTime<Utc>,
    },
    Stop { vault: VaultAddress },
}

impl Event {
    /// Short, stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Event::VaultOpened { .. } => "vault_opened",
            Event::Deposit { .. } => "deposit",
            Event::Withdraw { .. } => "withdraw",
            Event::AddDebt { .. } => "add_debt",
            Event::Close { .. } => "close",
            Event::OnCollect { .. } => "on_collect",
            Event::Collect { .. } => "collect",
            Event::ForgiveDebt { .. } => "forgive_debt",
            Event::RemoveDebt { .. } => "remove_debt",
            Event::DidForgive { .. } => "did_forgive",
            Event::Clear { .. } => "clear",
            Event::AddOwner { .. } => "add_owner",
            Event::RemoveOwner { .. } => "remove_owner",
            Event::AddSigner { .. } => "add_signer",
            Event::RemoveSigner { .. } => "remove_signer",
            Event::Retire { .. } => "retire",
            Event::Stop { .. } => "stop",
        }
    }
}

/// An event as stored in the ledger's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 0. Strictly increasing.
    pub sequence: u64,
    /// Ledger time of the call that produced the event.
    pub at: DateTime<Utc>,
    pub event: Event,
}
