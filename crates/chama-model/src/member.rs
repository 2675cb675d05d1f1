// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{ChamaId, EvmAddress, ValidationError};

pub const DISPLAY_NAME_MAX_LEN: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    PendingDeposit,
    DepositPaid,
    Active,
    Contributed,
    Late,
    Defaulted,
    Winner,
    Completed,
    Inactive,
}

impl MembershipStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingDeposit => "pending_deposit",
            Self::DepositPaid => "deposit_paid",
            Self::Active => "active",
            Self::Contributed => "contributed",
            Self::Late => "late",
            Self::Defaulted => "defaulted",
            Self::Winner => "winner",
            Self::Completed => "completed",
            Self::Inactive => "inactive",
        }
    }

    /// Statuses that are only reachable after the deposit was staked.
    #[must_use]
    pub const fn requires_paid_deposit(self) -> bool {
        matches!(
            self,
            Self::Active | Self::Contributed | Self::Late | Self::Winner | Self::Completed
        )
    }

    #[must_use]
    pub const fn is_participating(self) -> bool {
        !matches!(self, Self::Inactive | Self::Defaulted)
    }
}

impl Display for MembershipStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    #[default]
    NotRequired,
    Pending,
    Paid,
    Refunded,
    Forfeited,
}

impl DepositStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotRequired => "not_required",
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
            Self::Forfeited => "forfeited",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Member {
    pub chama_id: ChamaId,
    pub address: EvmAddress,
    pub display_name: String,
    pub status: MembershipStatus,
    #[serde(default)]
    pub deposit_status: DepositStatus,
    #[serde(default)]
    pub has_received_payout: bool,
    #[serde(default)]
    pub payout_round: Option<u32>,
    pub joined_at: u64,
}

impl Member {
    /// Fresh membership row for someone who just joined.
    #[must_use]
    pub fn joined(
        chama_id: ChamaId,
        address: EvmAddress,
        display_name: &str,
        deposit_required: bool,
        joined_at: u64,
    ) -> Self {
        let (status, deposit_status) = if deposit_required {
            (MembershipStatus::PendingDeposit, DepositStatus::Pending)
        } else {
            (MembershipStatus::Active, DepositStatus::NotRequired)
        };
        Self {
            chama_id,
            address,
            display_name: display_name.trim().to_string(),
            status,
            deposit_status,
            has_received_payout: false,
            payout_round: None,
            joined_at,
        }
    }

    pub fn validate(&self, deposit_required: bool) -> Result<(), ValidationError> {
        if self.address.is_zero() {
            return Err(ValidationError(
                "member address must not be the zero address".to_string(),
            ));
        }
        if self.display_name.chars().count() > DISPLAY_NAME_MAX_LEN {
            return Err(ValidationError(format!(
                "display name exceeds max length {DISPLAY_NAME_MAX_LEN}"
            )));
        }
        if deposit_required {
            let deposit_ok = match self.status {
                MembershipStatus::Completed => matches!(
                    self.deposit_status,
                    DepositStatus::Paid | DepositStatus::Refunded
                ),
                status if status.requires_paid_deposit() => {
                    self.deposit_status == DepositStatus::Paid
                }
                _ => true,
            };
            if !deposit_ok {
                return Err(ValidationError(format!(
                    "member {} cannot be {} with deposit {}",
                    self.address,
                    self.status,
                    self.deposit_status.as_str()
                )));
            }
        } else if self.status == MembershipStatus::PendingDeposit {
            return Err(ValidationError(
                "pending_deposit is meaningless when no deposit is required".to_string(),
            ));
        }
        if self.status == MembershipStatus::Winner
            && (!self.has_received_payout || self.payout_round.is_none())
        {
            return Err(ValidationError(format!(
                "winner {} must have received a payout in a recorded round",
                self.address
            )));
        }
        Ok(())
    }

    /// Records the deposit as staked and activates the member.
    pub fn mark_deposit_paid(&mut self) -> Result<(), ValidationError> {
        if self.deposit_status != DepositStatus::Pending {
            return Err(ValidationError(format!(
                "deposit for {} is {}, not pending",
                self.address,
                self.deposit_status.as_str()
            )));
        }
        self.deposit_status = DepositStatus::Paid;
        self.status = MembershipStatus::Active;
        Ok(())
    }
}
