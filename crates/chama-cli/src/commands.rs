// SPDX-License-Identifier: Apache-2.0

use crate::command_output_adapters::{emit_ok, read_json};
use crate::{CliError, OutputMode};
use chama_core::ports::{ClockPort, FixedClock, SystemClock, SystemRandom};
use chama_core::{
    reconcile_status, resolve_access, AccessSnapshot, ChainObservation, ErrorCode, InviteCode,
    InviteIssuer, InviteTarget, OnChainSnapshot, ReliabilityPolicy, RoundLedger,
    INVITE_TTL_SECS,
};
use chama_model::{Chama, ChamaId, EvmAddress, Member, Round, ValidationError};
use chama_sync::migrate_file;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

pub(crate) enum ChainInput {
    NotQueried,
    Snapshot(PathBuf),
    Failed(String),
    Missing(String),
}

impl ChainInput {
    pub(crate) fn from_flags(
        chain: Option<PathBuf>,
        failed: Option<String>,
        missing: Option<String>,
    ) -> Self {
        match (chain, failed, missing) {
            (Some(path), _, _) => Self::Snapshot(path),
            (None, Some(reason), _) => Self::Failed(reason),
            (None, None, Some(reason)) => Self::Missing(reason),
            (None, None, None) => Self::NotQueried,
        }
    }
}

fn invalid(err: &ValidationError) -> CliError {
    CliError::coded(ErrorCode::ValidationError, err.to_string())
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, CliError> {
    serde_json::to_value(value).map_err(|e| CliError::internal(e.to_string()))
}

pub(crate) fn run_access(
    snapshot: &Path,
    viewer: Option<&str>,
    output_mode: OutputMode,
) -> Result<(), CliError> {
    let snapshot: AccessSnapshot = read_json(snapshot, "access snapshot")?;
    let viewer = viewer
        .map(EvmAddress::new)
        .transpose()
        .map_err(|e| invalid(&e))?;
    let level = resolve_access(viewer.as_ref(), &snapshot);
    emit_ok(
        output_mode,
        &json!({
            "command": "access",
            "access": level.as_str(),
            "can_manage": level.can_manage(),
            "can_contribute": level.can_contribute(),
            "can_join": level.can_join(),
        }),
    )
}

pub(crate) fn run_reconcile(
    record: &Path,
    chain: ChainInput,
    output_mode: OutputMode,
) -> Result<(), CliError> {
    let chama: Chama = read_json(record, "chama record")?;
    let observation = match chain {
        ChainInput::NotQueried => ChainObservation::NotQueried,
        ChainInput::Snapshot(path) => {
            ChainObservation::Fetched(read_json::<OnChainSnapshot>(&path, "chain snapshot")?)
        }
        ChainInput::Failed(reason) => ChainObservation::Failed { reason },
        ChainInput::Missing(reason) => ChainObservation::Missing { reason },
    };
    let reconciled = reconcile_status(&chama, &observation);
    tracing::debug!(chama = %chama.id, ?observation, "reconciled record");
    emit_ok(
        output_mode,
        &json!({
            "command": "reconcile",
            "chama_id": chama.id.as_str(),
            "reconciled": to_value(&reconciled)?,
        }),
    )
}

pub(crate) fn run_invite_issue(
    inviter: &str,
    chama: Option<&str>,
    max_uses: u32,
    now: Option<u64>,
    output_mode: OutputMode,
) -> Result<(), CliError> {
    let inviter = EvmAddress::new(inviter).map_err(|e| invalid(&e))?;
    let chama = chama.map(ChamaId::new).transpose().map_err(|e| invalid(&e))?;
    let fixed;
    let clock: &dyn ClockPort = match now {
        Some(ts) => {
            fixed = FixedClock::new(ts);
            &fixed
        }
        None => &SystemClock,
    };
    let invite = InviteIssuer::new(clock, &SystemRandom)
        .issue(&inviter, chama.as_ref(), Some(max_uses))
        .map_err(|e| invalid(&e))?;
    emit_ok(
        output_mode,
        &json!({
            "command": "invite issue",
            "invite": to_value(&invite)?,
        }),
    )
}

pub(crate) fn run_invite_inspect(code: &str, output_mode: OutputMode) -> Result<(), CliError> {
    let parsed = InviteCode::parse(code).map_err(|e| CliError::coded(e.code(), e.to_string()))?;
    let (scope, target) = match &parsed.target {
        InviteTarget::Platform => ("platform", None),
        InviteTarget::Chama(fragment) => ("chama", Some(fragment.clone())),
    };
    emit_ok(
        output_mode,
        &json!({
            "command": "invite inspect",
            "code": parsed.to_string(),
            "inviter_fragment": parsed.inviter_fragment,
            "scope": scope,
            "chama_fragment": target,
            "issued_at": parsed.issued_at,
            "expires_at": parsed.issued_at.saturating_add(INVITE_TTL_SECS),
            "nonce": parsed.nonce,
        }),
    )
}

pub(crate) enum RosterInput {
    FromRounds,
    Addresses(Vec<String>),
    Rows(PathBuf),
}

impl RosterInput {
    pub(crate) fn from_flags(members: Vec<String>, members_file: Option<PathBuf>) -> Self {
        match (members_file, members.is_empty()) {
            (Some(path), _) => Self::Rows(path),
            (None, false) => Self::Addresses(members),
            (None, true) => Self::FromRounds,
        }
    }
}

pub(crate) fn run_rounds(
    rounds: &Path,
    chama: &Path,
    roster: RosterInput,
    now: Option<u64>,
    policy: &ReliabilityPolicy,
    output_mode: OutputMode,
) -> Result<(), CliError> {
    let rounds: Vec<Round> = read_json(rounds, "rounds")?;
    let chama: Chama = read_json(chama, "chama record")?;
    let members: Vec<Member> = match roster {
        RosterInput::Rows(path) => {
            let rows: Vec<Member> = read_json(&path, "member rows")?;
            for row in &rows {
                if row.chama_id != chama.id {
                    return Err(CliError::coded(
                        ErrorCode::ValidationError,
                        format!(
                            "member {} belongs to {}, not {}",
                            row.address, row.chama_id, chama.id
                        ),
                    ));
                }
                row.validate(chama.requires_deposit()).map_err(|e| invalid(&e))?;
            }
            rows
        }
        RosterInput::Addresses(addresses) => addresses
            .iter()
            .map(EvmAddress::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid(&e))?
            .into_iter()
            .map(|address| settled_row(&chama, address))
            .collect(),
        RosterInput::FromRounds => roster_from_rounds(&rounds)
            .into_iter()
            .map(|address| settled_row(&chama, address))
            .collect(),
    };
    let now = now.unwrap_or_else(|| SystemClock.now_unix());
    let ledger = RoundLedger::build(&chama, &members, &rounds, now, policy)
        .map_err(|e| invalid(&e))?;
    emit_ok(
        output_mode,
        &json!({
            "command": "rounds",
            "now": now,
            "ledger": to_value(&ledger)?,
        }),
    )
}

/// Bare addresses carry no deposit state; treat them as settled members.
fn settled_row(chama: &Chama, address: EvmAddress) -> Member {
    Member::joined(chama.id.clone(), address, "", false, chama.created_at)
}

/// Recipients and contributors in first-seen order.
fn roster_from_rounds(rounds: &[Round]) -> Vec<EvmAddress> {
    let mut roster: Vec<EvmAddress> = Vec::new();
    let seen = rounds.iter().flat_map(|round| {
        std::iter::once(&round.recipient).chain(round.contributions.iter().map(|c| &c.member))
    });
    for address in seen {
        if !roster.contains(address) {
            roster.push(address.clone());
        }
    }
    roster
}

pub(crate) fn run_state_migrate(path: &Path, output_mode: OutputMode) -> Result<(), CliError> {
    let report = migrate_file(path).map_err(|e| {
        CliError::coded(e.error_code(), e.to_string())
            .with_detail("path", &path.display().to_string())
    })?;
    emit_ok(
        output_mode,
        &json!({
            "command": "state migrate",
            "path": path.display().to_string(),
            "from_version": report.from_version,
            "to_version": report.to_version,
            "migrated": report.migrated(),
        }),
    )
}
