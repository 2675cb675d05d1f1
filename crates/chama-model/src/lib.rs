// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Chama model SSOT.
//!
//! Off-chain records (chama, member, invite) and chain mirrors (rounds,
//! contributions, payouts) share these types so every layer agrees on
//! statuses and invariants.

use std::fmt::{Display, Formatter};

mod chama;
mod ids;
mod invite;
mod member;
mod round;

pub use chama::{
    check_address_invariant, Chama, ChamaStatus, DEFAULT_GRACE_PERIOD_SECS, MAX_MEMBERS,
    MIN_MEMBERS, NAME_MAX_LEN,
};
pub use ids::{ChamaId, EvmAddress, TxHash, CHAMA_ID_MAX_LEN};
pub use invite::Invite;
pub use member::{DepositStatus, Member, MembershipStatus, DISPLAY_NAME_MAX_LEN};
pub use round::{validate_round_sequence, ContributionRecord, PayoutRecord, Round};

pub const CRATE_NAME: &str = "chama-model";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}
