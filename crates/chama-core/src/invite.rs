// SPDX-License-Identifier: Apache-2.0

//! Invite codes: generation, parsing and redemption rules.
//!
//! Code layout is `CHM-<INVITER>-<TARGET>-<TIME>-<RAND>`:
//! the last six hex digits of the inviter address, `ALL` or a six character
//! chama fragment, the issue time in base36 and six Crockford base32
//! characters of randomness.

use std::fmt;

use chama_model::{ChamaId, EvmAddress, Invite, ValidationError};

use crate::errors::ErrorCode;
use crate::ports::{ClockPort, RandomPort};

pub const INVITE_PREFIX: &str = "CHM";
pub const INVITE_TTL_SECS: u64 = 30 * 24 * 60 * 60;
pub const DEFAULT_MAX_USES: u32 = 10;
pub const PLATFORM_TARGET: &str = "ALL";

const FRAGMENT_LEN: usize = 6;
const MAX_TIME_LEN: usize = 13;
const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteError {
    Malformed { reason: String },
    NotFound,
    SelfInvite,
    Inactive,
    Expired { expired_at: u64 },
    Exhausted { max_uses: u32 },
}

impl InviteError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Malformed { .. } => ErrorCode::InviteMalformed,
            Self::NotFound => ErrorCode::InviteNotFound,
            Self::SelfInvite => ErrorCode::InviteSelfRedeem,
            Self::Inactive => ErrorCode::InviteInactive,
            Self::Expired { .. } => ErrorCode::InviteExpired,
            Self::Exhausted { .. } => ErrorCode::InviteExhausted,
        }
    }

    fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for InviteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { reason } => write!(f, "invite code is malformed: {reason}"),
            Self::NotFound => write!(f, "invite code does not exist"),
            Self::SelfInvite => write!(f, "an inviter cannot redeem their own code"),
            Self::Inactive => write!(f, "invite code has been deactivated"),
            Self::Expired { expired_at } => write!(f, "invite code expired at {expired_at}"),
            Self::Exhausted { max_uses } => {
                write!(f, "invite code reached its limit of {max_uses} uses")
            }
        }
    }
}

impl std::error::Error for InviteError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteTarget {
    Platform,
    Chama(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteCode {
    pub inviter_fragment: String,
    pub target: InviteTarget,
    pub issued_at: u64,
    pub nonce: String,
}

impl InviteCode {
    #[must_use]
    pub fn compose(inviter: &EvmAddress, chama: Option<&ChamaId>, issued_at: u64, random: u64) -> Self {
        let hex = inviter.hex_digits();
        let inviter_fragment = hex[hex.len() - FRAGMENT_LEN..].to_ascii_uppercase();
        let target = chama.map_or(InviteTarget::Platform, |id| {
            InviteTarget::Chama(chama_fragment(id))
        });
        Self {
            inviter_fragment,
            target,
            issued_at,
            nonce: crockford_nonce(random),
        }
    }

    /// Parses a code case-insensitively.
    pub fn parse(input: &str) -> Result<Self, InviteError> {
        let normalized = input.trim().to_ascii_uppercase();
        let parts: Vec<&str> = normalized.split('-').collect();
        let [prefix, inviter, target, time, nonce] = parts.as_slice() else {
            return Err(InviteError::malformed(
                "expected CHM-<inviter>-<target>-<time>-<random>",
            ));
        };
        if *prefix != INVITE_PREFIX {
            return Err(InviteError::malformed(format!(
                "code must start with {INVITE_PREFIX}"
            )));
        }
        if inviter.len() != FRAGMENT_LEN || !inviter.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InviteError::malformed("inviter fragment must be 6 hex digits"));
        }
        let target = if *target == PLATFORM_TARGET {
            InviteTarget::Platform
        } else if target.len() == FRAGMENT_LEN && target.chars().all(|c| c.is_ascii_alphanumeric())
        {
            InviteTarget::Chama((*target).to_string())
        } else {
            return Err(InviteError::malformed(
                "target must be ALL or a 6 character chama fragment",
            ));
        };
        if time.is_empty()
            || time.len() > MAX_TIME_LEN
            || !time.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(InviteError::malformed("time component has invalid length"));
        }
        let issued_at = u64::from_str_radix(time, 36)
            .map_err(|_| InviteError::malformed("time component is not base36"))?;
        if nonce.len() != FRAGMENT_LEN || !nonce.bytes().all(|b| CROCKFORD.contains(&b)) {
            return Err(InviteError::malformed(
                "random component must be 6 Crockford base32 characters",
            ));
        }
        Ok(Self {
            inviter_fragment: (*inviter).to_string(),
            target,
            issued_at,
            nonce: (*nonce).to_string(),
        })
    }

    #[must_use]
    pub fn targets_chama(&self, id: &ChamaId) -> bool {
        matches!(&self.target, InviteTarget::Chama(fragment) if *fragment == chama_fragment(id))
    }

    #[must_use]
    pub fn issued_by(&self, address: &EvmAddress) -> bool {
        let hex = address.hex_digits();
        hex[hex.len() - FRAGMENT_LEN..].eq_ignore_ascii_case(&self.inviter_fragment)
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.target {
            InviteTarget::Platform => PLATFORM_TARGET,
            InviteTarget::Chama(fragment) => fragment.as_str(),
        };
        write!(
            f,
            "{INVITE_PREFIX}-{}-{target}-{}-{}",
            self.inviter_fragment,
            to_base36(self.issued_at),
            self.nonce
        )
    }
}

fn chama_fragment(id: &ChamaId) -> String {
    let mut fragment: String = id
        .as_str()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(FRAGMENT_LEN)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    while fragment.len() < FRAGMENT_LEN {
        fragment.push('0');
    }
    fragment
}

fn crockford_nonce(mut random: u64) -> String {
    let mut out = String::with_capacity(FRAGMENT_LEN);
    for _ in 0..FRAGMENT_LEN {
        out.push(char::from(CROCKFORD[(random & 0x1f) as usize]));
        random >>= 5;
    }
    out
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(MAX_TIME_LEN);
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

pub struct InviteIssuer<'a> {
    clock: &'a dyn ClockPort,
    random: &'a dyn RandomPort,
}

impl<'a> InviteIssuer<'a> {
    #[must_use]
    pub fn new(clock: &'a dyn ClockPort, random: &'a dyn RandomPort) -> Self {
        Self { clock, random }
    }

    pub fn issue(
        &self,
        inviter: &EvmAddress,
        chama: Option<&ChamaId>,
        max_uses: Option<u32>,
    ) -> Result<Invite, ValidationError> {
        let max_uses = max_uses.unwrap_or(DEFAULT_MAX_USES);
        if max_uses == 0 {
            return Err(ValidationError("invite max_uses must be >= 1".to_string()));
        }
        let now = self.clock.now_unix();
        let code = InviteCode::compose(inviter, chama, now, self.random.next_u64());
        let invite = Invite {
            code: code.to_string(),
            inviter: inviter.clone(),
            chama_id: chama.cloned(),
            created_at: now,
            expires_at: now.saturating_add(INVITE_TTL_SECS),
            max_uses,
            current_uses: 0,
            is_active: true,
        };
        invite.validate()?;
        Ok(invite)
    }
}

/// Checks every redemption rule without mutating the invite.
pub fn check_redeemable(invite: &Invite, redeemer: &EvmAddress, now: u64) -> Result<(), InviteError> {
    if &invite.inviter == redeemer {
        return Err(InviteError::SelfInvite);
    }
    if !invite.is_active {
        return Err(InviteError::Inactive);
    }
    if invite.is_expired(now) {
        return Err(InviteError::Expired {
            expired_at: invite.expires_at,
        });
    }
    if invite.is_exhausted() {
        return Err(InviteError::Exhausted {
            max_uses: invite.max_uses,
        });
    }
    Ok(())
}

/// Check-and-increment; callers must hold exclusive access to `invite`
/// for the duration of the call.
pub fn redeem_in_place(invite: &mut Invite, redeemer: &EvmAddress, now: u64) -> Result<(), InviteError> {
    check_redeemable(invite, redeemer, now)?;
    invite.current_uses += 1;
    Ok(())
}
