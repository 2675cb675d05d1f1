// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{EvmAddress, TxHash, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContributionRecord {
    pub member: EvmAddress,
    pub amount: u128,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PayoutRecord {
    pub recipient: EvmAddress,
    pub amount: u128,
    pub paid_at: u64,
    #[serde(default)]
    pub tx: Option<TxHash>,
}

/// One rotation of the pool, mirrored from chain reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Round {
    pub number: u32,
    pub recipient: EvmAddress,
    pub opened_at: u64,
    pub due_at: u64,
    pub default_at: u64,
    #[serde(default)]
    pub contributions: Vec<ContributionRecord>,
    #[serde(default)]
    pub payout: Option<PayoutRecord>,
}

impl Round {
    /// Complete only once the configured recipient was paid.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.payout
            .as_ref()
            .is_some_and(|p| p.recipient == self.recipient)
    }

    #[must_use]
    pub fn total_contributed(&self) -> u128 {
        self.contributions
            .iter()
            .fold(0_u128, |acc, c| acc.saturating_add(c.amount))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.number == 0 {
            return Err(ValidationError("round numbers start at 1".to_string()));
        }
        if !(self.opened_at <= self.due_at && self.due_at <= self.default_at) {
            return Err(ValidationError(format!(
                "round {} must satisfy opened_at <= due_at <= default_at",
                self.number
            )));
        }
        if let Some(payout) = &self.payout {
            if payout.recipient != self.recipient {
                return Err(ValidationError(format!(
                    "round {} paid {} but recipient is {}",
                    self.number, payout.recipient, self.recipient
                )));
            }
        }
        Ok(())
    }
}

/// Rounds must be numbered 1, 2, 3, ... with no gaps.
pub fn validate_round_sequence(rounds: &[Round]) -> Result<(), ValidationError> {
    for (idx, round) in rounds.iter().enumerate() {
        round.validate()?;
        let expected = u32::try_from(idx + 1)
            .map_err(|_| ValidationError("too many rounds".to_string()))?;
        if round.number != expected {
            return Err(ValidationError(format!(
                "round sequence broken: expected round {expected}, found {}",
                round.number
            )));
        }
    }
    Ok(())
}
