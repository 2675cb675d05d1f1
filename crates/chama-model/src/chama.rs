// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{ChamaId, EvmAddress, ValidationError};

pub const NAME_MAX_LEN: usize = 80;
pub const MIN_MEMBERS: u32 = 2;
pub const MAX_MEMBERS: u32 = 50;
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 2 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChamaStatus {
    Draft,
    Recruiting,
    Waiting,
    Registered,
    Active,
    Completed,
    Cancelled,
}

impl ChamaStatus {
    pub const ALL: [Self; 7] = [
        Self::Draft,
        Self::Recruiting,
        Self::Waiting,
        Self::Registered,
        Self::Active,
        Self::Completed,
        Self::Cancelled,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Recruiting => "recruiting",
            Self::Waiting => "waiting",
            Self::Registered => "registered",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError(format!("unknown chama status: {s}")))
    }

    /// Statuses that only exist once the contract is deployed.
    #[must_use]
    pub const fn is_on_chain(self) -> bool {
        matches!(self, Self::Registered | Self::Active | Self::Completed)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Pre-chain statuses from which the creator may deploy.
    #[must_use]
    pub const fn is_deployable(self) -> bool {
        matches!(self, Self::Recruiting | Self::Waiting)
    }

    #[must_use]
    pub const fn accepts_members(self) -> bool {
        matches!(self, Self::Recruiting)
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Recruiting | Self::Cancelled)
                | (
                    Self::Recruiting,
                    Self::Waiting | Self::Registered | Self::Cancelled
                )
                | (
                    Self::Waiting,
                    Self::Recruiting | Self::Registered | Self::Cancelled
                )
                | (Self::Registered, Self::Active)
                | (Self::Active, Self::Completed)
        )
    }
}

impl Display for ChamaStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Savings-circle record as held by the off-chain store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Chama {
    pub id: ChamaId,
    pub name: String,
    pub contribution_amount: u128,
    #[serde(default)]
    pub deposit_amount: u128,
    pub cycle_duration_secs: u64,
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    pub max_members: u32,
    pub status: ChamaStatus,
    #[serde(default)]
    pub onchain_address: Option<EvmAddress>,
    pub creator: EvmAddress,
    pub created_at: u64,
}

fn default_grace_period_secs() -> u64 {
    DEFAULT_GRACE_PERIOD_SECS
}

impl Chama {
    #[must_use]
    pub const fn requires_deposit(&self) -> bool {
        self.deposit_amount > 0
    }

    #[must_use]
    pub const fn is_on_chain(&self) -> bool {
        self.onchain_address.is_some()
    }

    /// Pot paid to one recipient when every member contributes.
    #[must_use]
    pub fn pot_size(&self, member_count: u32) -> u128 {
        self.contribution_amount
            .saturating_mul(u128::from(member_count))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError("chama name must not be empty".to_string()));
        }
        if name.chars().count() > NAME_MAX_LEN {
            return Err(ValidationError(format!(
                "chama name exceeds max length {NAME_MAX_LEN}"
            )));
        }
        if self.contribution_amount == 0 {
            return Err(ValidationError(
                "contribution amount must be > 0".to_string(),
            ));
        }
        if self.cycle_duration_secs == 0 {
            return Err(ValidationError("cycle duration must be > 0".to_string()));
        }
        if !(MIN_MEMBERS..=MAX_MEMBERS).contains(&self.max_members) {
            return Err(ValidationError(format!(
                "max members must be within {MIN_MEMBERS}..={MAX_MEMBERS}"
            )));
        }
        check_address_invariant(self.status, self.onchain_address.as_ref())
    }

    /// Moves the record to `next`, enforcing the transition table and the
    /// address invariant. `address` is required when entering `registered`.
    pub fn transition(
        &mut self,
        next: ChamaStatus,
        address: Option<EvmAddress>,
    ) -> Result<(), ValidationError> {
        if !self.status.can_transition_to(next) {
            return Err(ValidationError(format!(
                "illegal chama transition {} -> {}",
                self.status, next
            )));
        }
        let new_address = match (next, address) {
            (ChamaStatus::Registered, Some(addr)) => Some(addr),
            (ChamaStatus::Registered, None) => {
                return Err(ValidationError(
                    "registering a chama requires an on-chain address".to_string(),
                ))
            }
            (_, Some(_)) => {
                return Err(ValidationError(format!(
                    "on-chain address can only be attached when entering registered, not {next}"
                )))
            }
            (_, None) => self.onchain_address.clone(),
        };
        check_address_invariant(next, new_address.as_ref())?;
        self.status = next;
        self.onchain_address = new_address;
        Ok(())
    }
}

pub fn check_address_invariant(
    status: ChamaStatus,
    address: Option<&EvmAddress>,
) -> Result<(), ValidationError> {
    match (status.is_on_chain(), address) {
        (true, None) => Err(ValidationError(format!(
            "status {status} requires an on-chain address"
        ))),
        (false, Some(addr)) => Err(ValidationError(format!(
            "status {status} must not carry on-chain address {addr}"
        ))),
        _ => Ok(()),
    }
}
