// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Pure chama lifecycle logic shared by the sync service and the CLI.

mod access;
pub mod canonical;
mod contribution;
mod errors;
mod invite;
pub mod ports;
mod reconcile;

pub use access::{resolve_access, AccessLevel, AccessSnapshot};
pub use contribution::{
    classify_contribution, settled_at, ContributionStatus, MemberStanding, ReliabilityPolicy,
    RoundLedger, RoundStanding, RoundWindow,
};
pub use errors::{Error, ErrorClass, ErrorCode, ExitCode, MachineError, Result};
pub use invite::{
    check_redeemable, redeem_in_place, InviteCode, InviteError, InviteIssuer, InviteTarget,
    DEFAULT_MAX_USES, INVITE_PREFIX, INVITE_TTL_SECS, PLATFORM_TARGET,
};
pub use reconcile::{
    reconcile_status, ChainObservation, DisplayStatus, OnChainSnapshot, ReconciledStatus,
};

pub const CRATE_NAME: &str = "chama-core";
