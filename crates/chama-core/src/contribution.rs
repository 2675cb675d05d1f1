// SPDX-License-Identifier: Apache-2.0

//! Per-round contribution classification and member reliability.

use std::collections::BTreeSet;

use chama_model::{
    validate_round_sequence, Chama, ChamaStatus, DepositStatus, EvmAddress, Member,
    MembershipStatus, Round, ValidationError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundWindow {
    pub number: u32,
    pub due_at: u64,
    pub default_at: u64,
}

impl From<&Round> for RoundWindow {
    fn from(round: &Round) -> Self {
        Self {
            number: round.number,
            due_at: round.due_at,
            default_at: round.default_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    OnTime,
    Late,
    Missed,
    Pending,
}

impl ContributionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnTime => "on_time",
            Self::Late => "late",
            Self::Missed => "missed",
            Self::Pending => "pending",
        }
    }

    #[must_use]
    pub const fn is_due(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// The due time itself counts as on time.
#[must_use]
pub const fn classify_contribution(
    window: &RoundWindow,
    contributed_at: Option<u64>,
    now: u64,
) -> ContributionStatus {
    match contributed_at {
        Some(ts) if ts <= window.due_at => ContributionStatus::OnTime,
        Some(ts) if ts <= window.default_at => ContributionStatus::Late,
        Some(_) => ContributionStatus::Missed,
        None if now > window.default_at => ContributionStatus::Missed,
        None => ContributionStatus::Pending,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReliabilityPolicy {
    /// Weight multiplier applied once per step back in history.
    pub decay: f64,
    /// Credit for a late contribution; on time is 1, missed is 0.
    pub late_credit: f64,
}

impl Default for ReliabilityPolicy {
    fn default() -> Self {
        Self {
            decay: 0.8,
            late_credit: 0.5,
        }
    }
}

impl ReliabilityPolicy {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.decay > 0.0 && self.decay <= 1.0) {
            return Err(ValidationError(format!(
                "reliability decay must be in (0, 1], got {}",
                self.decay
            )));
        }
        if !(0.0..=1.0).contains(&self.late_credit) {
            return Err(ValidationError(format!(
                "late credit must be in [0, 1], got {}",
                self.late_credit
            )));
        }
        Ok(())
    }

    fn credit(&self, status: ContributionStatus) -> Option<f64> {
        match status {
            ContributionStatus::OnTime => Some(1.0),
            ContributionStatus::Late => Some(self.late_credit),
            ContributionStatus::Missed => Some(0.0),
            ContributionStatus::Pending => None,
        }
    }

    /// Recency-weighted score in 0..=100; `history` is ordered oldest first.
    /// Members with nothing due yet score 100.
    #[must_use]
    pub fn score(&self, history: &[ContributionStatus]) -> u8 {
        let mut weight = 1.0_f64;
        let mut earned = 0.0_f64;
        let mut total = 0.0_f64;
        for credit in history.iter().rev().filter_map(|s| self.credit(*s)) {
            earned += weight * credit;
            total += weight;
            weight *= self.decay;
        }
        if total <= 0.0 {
            return 100;
        }
        let pct = (100.0 * earned / total).round().clamp(0.0, 100.0);
        pct as u8
    }
}

/// Time at which a member's running total first covered `required`.
#[must_use]
pub fn settled_at(round: &Round, member: &EvmAddress, required: u128) -> Option<u64> {
    let mut own: Vec<_> = round
        .contributions
        .iter()
        .filter(|c| &c.member == member)
        .collect();
    own.sort_by_key(|c| c.timestamp);
    let mut paid = 0_u128;
    for record in own {
        paid = paid.saturating_add(record.amount);
        if paid >= required {
            return Some(record.timestamp);
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStanding {
    pub round: u32,
    pub status: ContributionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberStanding {
    pub address: EvmAddress,
    pub rounds: Vec<RoundStanding>,
    pub reliability: u8,
    pub status: MembershipStatus,
    pub total_contributed: u128,
    pub payout_round: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundLedger {
    pub chama_id: chama_model::ChamaId,
    pub current_round: Option<u32>,
    pub completed_rounds: u32,
    pub pot_per_round: u128,
    pub members: Vec<MemberStanding>,
}

impl RoundLedger {
    /// Builds standings for the membership rows from chain-mirrored rounds.
    ///
    /// Rejects gaps in round numbering, payouts to non-members and any
    /// member paid out twice.
    pub fn build(
        chama: &Chama,
        members: &[Member],
        rounds: &[Round],
        now: u64,
        policy: &ReliabilityPolicy,
    ) -> Result<Self, ValidationError> {
        validate_round_sequence(rounds)?;
        let roster: BTreeSet<&EvmAddress> = members.iter().map(|m| &m.address).collect();
        let mut paid: BTreeSet<&EvmAddress> = BTreeSet::new();
        for round in rounds {
            if !roster.contains(&round.recipient) {
                return Err(ValidationError(format!(
                    "round {} recipient {} is not a member",
                    round.number, round.recipient
                )));
            }
            if round.is_complete() && !paid.insert(&round.recipient) {
                return Err(ValidationError(format!(
                    "member {} received more than one payout",
                    round.recipient
                )));
            }
        }

        let standings = members
            .iter()
            .map(|member| standing_for(chama, member, rounds, now, policy))
            .collect();
        let member_count = u32::try_from(members.len()).unwrap_or(u32::MAX);
        let completed_rounds =
            u32::try_from(rounds.iter().filter(|r| r.is_complete()).count()).unwrap_or(u32::MAX);
        Ok(Self {
            chama_id: chama.id.clone(),
            current_round: rounds.last().map(|r| r.number),
            completed_rounds,
            pot_per_round: chama.pot_size(member_count),
            members: standings,
        })
    }

    #[must_use]
    pub fn standing(&self, member: &EvmAddress) -> Option<&MemberStanding> {
        self.members.iter().find(|s| &s.address == member)
    }
}

fn standing_for(
    chama: &Chama,
    row: &Member,
    rounds: &[Round],
    now: u64,
    policy: &ReliabilityPolicy,
) -> MemberStanding {
    let member = &row.address;
    let per_round: Vec<RoundStanding> = rounds
        .iter()
        .map(|round| RoundStanding {
            round: round.number,
            status: classify_contribution(
                &RoundWindow::from(round),
                settled_at(round, member, chama.contribution_amount),
                now,
            ),
        })
        .collect();
    let history: Vec<ContributionStatus> = per_round.iter().map(|r| r.status).collect();
    let payout_round = rounds
        .iter()
        .find(|r| r.is_complete() && &r.recipient == member)
        .map(|r| r.number);
    let total_contributed = rounds
        .iter()
        .flat_map(|r| r.contributions.iter())
        .filter(|c| &c.member == member)
        .fold(0_u128, |acc, c| acc.saturating_add(c.amount));

    let status = if history.contains(&ContributionStatus::Missed) {
        MembershipStatus::Defaulted
    } else if !row.status.is_participating() {
        row.status
    } else if row.deposit_status == DepositStatus::Pending {
        MembershipStatus::PendingDeposit
    } else if chama.status == ChamaStatus::Completed {
        MembershipStatus::Completed
    } else if payout_round.is_some() {
        MembershipStatus::Winner
    } else {
        match history.last() {
            Some(ContributionStatus::OnTime) => MembershipStatus::Contributed,
            Some(ContributionStatus::Late) => MembershipStatus::Late,
            _ => MembershipStatus::Active,
        }
    };

    MemberStanding {
        address: member.clone(),
        reliability: policy.score(&history),
        rounds: per_round,
        status,
        total_contributed,
        payout_round,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chama_model::{ChamaId, ContributionRecord, PayoutRecord};

    const WINDOW: RoundWindow = RoundWindow {
        number: 1,
        due_at: 100,
        default_at: 200,
    };

    fn addr(byte: u8) -> EvmAddress {
        EvmAddress::new(format!("0x{}", format!("{byte:02x}").repeat(20))).expect("address")
    }

    #[test]
    fn deadline_boundaries() {
        assert_eq!(classify_contribution(&WINDOW, Some(100), 500), ContributionStatus::OnTime);
        assert_eq!(classify_contribution(&WINDOW, Some(101), 500), ContributionStatus::Late);
        assert_eq!(classify_contribution(&WINDOW, Some(200), 500), ContributionStatus::Late);
        assert_eq!(classify_contribution(&WINDOW, Some(201), 500), ContributionStatus::Missed);
        assert_eq!(classify_contribution(&WINDOW, None, 200), ContributionStatus::Pending);
        assert_eq!(classify_contribution(&WINDOW, None, 201), ContributionStatus::Missed);
    }

    #[test]
    fn score_weights_recent_rounds_more() {
        use ContributionStatus::{Late, Missed, OnTime, Pending};
        let policy = ReliabilityPolicy::default();
        assert_eq!(policy.score(&[]), 100);
        assert_eq!(policy.score(&[Pending]), 100);
        assert_eq!(policy.score(&[OnTime, OnTime]), 100);
        assert_eq!(policy.score(&[Missed]), 0);
        // (0.8 * 1 + 1 * 0.5) / 1.8
        assert_eq!(policy.score(&[OnTime, Late]), 72);
        assert!(policy.score(&[Missed, OnTime]) > policy.score(&[OnTime, Missed]));
    }

    #[test]
    fn policy_bounds_are_checked() {
        assert!(ReliabilityPolicy::default().validate().is_ok());
        assert!(ReliabilityPolicy { decay: 0.0, late_credit: 0.5 }.validate().is_err());
        assert!(ReliabilityPolicy { decay: 0.5, late_credit: 1.5 }.validate().is_err());
    }

    #[test]
    fn partial_payments_settle_when_covered() {
        let round = Round {
            number: 1,
            recipient: addr(1),
            opened_at: 0,
            due_at: 100,
            default_at: 200,
            contributions: vec![
                ContributionRecord { member: addr(2), amount: 4, timestamp: 50 },
                ContributionRecord { member: addr(2), amount: 6, timestamp: 150 },
            ],
            payout: None,
        };
        assert_eq!(settled_at(&round, &addr(2), 10), Some(150));
        assert_eq!(settled_at(&round, &addr(2), 11), None);
    }

    fn active_chama(deposit_amount: u128) -> Chama {
        Chama {
            id: ChamaId::new("c1").expect("id"),
            name: "C1".to_string(),
            contribution_amount: 10,
            deposit_amount,
            cycle_duration_secs: 100,
            grace_period_secs: 100,
            max_members: 2,
            status: ChamaStatus::Active,
            onchain_address: Some(addr(9)),
            creator: addr(1),
            created_at: 0,
        }
    }

    fn row(chama: &Chama, byte: u8) -> Member {
        Member::joined(chama.id.clone(), addr(byte), "m", chama.requires_deposit(), 0)
    }

    #[test]
    fn ledger_rejects_double_payout() {
        let chama = active_chama(0);
        let paid_round = |number: u32| Round {
            number,
            recipient: addr(1),
            opened_at: 0,
            due_at: 100,
            default_at: 200,
            contributions: vec![],
            payout: Some(PayoutRecord { recipient: addr(1), amount: 20, paid_at: 210, tx: None }),
        };
        let err = RoundLedger::build(
            &chama,
            &[row(&chama, 1), row(&chama, 2)],
            &[paid_round(1), paid_round(2)],
            300,
            &ReliabilityPolicy::default(),
        )
        .expect_err("double payout");
        assert!(err.0.contains("more than one payout"));
    }

    #[test]
    fn stored_membership_state_outranks_contributions() {
        let chama = active_chama(50);
        let round = Round {
            number: 1,
            recipient: addr(1),
            opened_at: 0,
            due_at: 100,
            default_at: 200,
            contributions: vec![
                ContributionRecord { member: addr(1), amount: 10, timestamp: 50 },
                ContributionRecord { member: addr(2), amount: 10, timestamp: 50 },
                ContributionRecord { member: addr(3), amount: 10, timestamp: 50 },
            ],
            payout: None,
        };
        let mut paid = row(&chama, 1);
        paid.mark_deposit_paid().expect("pending deposit");
        let unpaid = row(&chama, 2);
        let mut inactive = row(&chama, 3);
        inactive.mark_deposit_paid().expect("pending deposit");
        inactive.status = MembershipStatus::Inactive;

        let ledger = RoundLedger::build(
            &chama,
            &[paid, unpaid, inactive],
            &[round],
            150,
            &ReliabilityPolicy::default(),
        )
        .expect("ledger");
        let status = |byte: u8| ledger.standing(&addr(byte)).map(|s| s.status);
        assert_eq!(status(1), Some(MembershipStatus::Contributed));
        assert_eq!(status(2), Some(MembershipStatus::PendingDeposit));
        assert_eq!(status(3), Some(MembershipStatus::Inactive));
    }
}
