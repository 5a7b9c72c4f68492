//! Vault lifecycle: `Active → Retiring → Stopped`.
//!
//! Retiring starts a countdown. Once the retiring period has elapsed, anyone
//! may stop the vault, provided it holds nothing and owes nothing. Stopped is
//! terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_protocol::clock::add_secs;

use crate::error::ContractError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    Retiring,
    Stopped,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Active => write!(f, "Active"),
            LifecycleState::Retiring => write!(f, "Retiring"),
            LifecycleState::Stopped => write!(f, "Stopped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    state: LifecycleState,
    retiring_period_secs: u64,
    retiring_since: Option<DateTime<Utc>>,
}

impl Lifecycle {
    pub fn new(retiring_period_secs: u64) -> Self {
        Self {
            state: LifecycleState::Active,
            retiring_period_secs,
            retiring_since: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn retiring_period_secs(&self) -> u64 {
        self.retiring_period_secs
    }

    pub fn retiring_since(&self) -> Option<DateTime<Utc>> {
        self.retiring_since
    }

    /// Earliest instant `stop` may succeed, once retiring.
    pub fn stoppable_after(&self) -> Option<DateTime<Utc>> {
        self.retiring_since
            .map(|since| add_secs(since, self.retiring_period_secs))
    }

    pub(crate) fn ensure_active(&self, what: &str) -> Result<(), ContractError> {
        if self.state != LifecycleState::Active {
            return Err(ContractError::InvalidState(format!(
                "{} requires an Active vault, but it is {}",
                what, self.state
            )));
        }
        Ok(())
    }

    pub(crate) fn ensure_not_stopped(&self, what: &str) -> Result<(), ContractError> {
        if self.state == LifecycleState::Stopped {
            return Err(ContractError::InvalidState(format!(
                "{} on a stopped vault",
                what
            )));
        }
        Ok(())
    }

    /// `Active → Retiring`, recording `now` as the start of the countdown.
    pub(crate) fn retire(&mut self, now: DateTime<Utc>) -> Result<(), ContractError> {
        self.ensure_active("retire")?;
        self.state = LifecycleState::Retiring;
        self.retiring_since = Some(now);
        Ok(())
    }

    /// `Retiring → Stopped`. The caller checks the vault is empty.
    pub(crate) fn stop(&mut self, now: DateTime<Utc>) -> Result<(), ContractError> {
        let Some(stoppable_after) = self.stoppable_after().filter(|_| self.state == LifecycleState::Retiring)
        else {
            return Err(ContractError::InvalidState(format!(
                "stop requires a Retiring vault, but it is {}",
                self.state
            )));
        };
        if now < stoppable_after {
            return Err(ContractError::InvalidState(format!(
                "retiring period has not elapsed: stoppable after {}",
                stoppable_after
            )));
        }
        self.state = LifecycleState::Stopped;
        Ok(())
    }
}
