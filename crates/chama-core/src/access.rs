// SPDX-License-Identifier: Apache-2.0

use chama_model::{Chama, ChamaStatus, EvmAddress};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    Guest,
    Creator,
    Member,
    CanJoin,
    Viewer,
}

impl AccessLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "GUEST",
            Self::Creator => "CREATOR",
            Self::Member => "MEMBER",
            Self::CanJoin => "CAN_JOIN",
            Self::Viewer => "VIEWER",
        }
    }

    #[must_use]
    pub const fn can_manage(self) -> bool {
        matches!(self, Self::Creator)
    }

    #[must_use]
    pub const fn can_contribute(self) -> bool {
        matches!(self, Self::Creator | Self::Member)
    }

    #[must_use]
    pub const fn can_join(self) -> bool {
        matches!(self, Self::CanJoin)
    }
}

/// Everything the resolver looks at, captured at one instant.
///
/// Occupancy is always counted from `members`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessSnapshot {
    pub creator: EvmAddress,
    pub status: ChamaStatus,
    pub max_members: u32,
    pub members: Vec<EvmAddress>,
}

impl AccessSnapshot {
    #[must_use]
    pub fn from_chama(chama: &Chama, members: Vec<EvmAddress>) -> Self {
        Self {
            creator: chama.creator.clone(),
            status: chama.status,
            max_members: chama.max_members,
            members,
        }
    }

    #[must_use]
    pub fn member_count(&self) -> u32 {
        u32::try_from(self.members.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn has_open_slot(&self) -> bool {
        self.status.accepts_members() && self.member_count() < self.max_members
    }
}

/// Priority: guest, creator, member, can-join, viewer.
#[must_use]
pub fn resolve_access(viewer: Option<&EvmAddress>, snapshot: &AccessSnapshot) -> AccessLevel {
    let Some(viewer) = viewer else {
        return AccessLevel::Guest;
    };
    if viewer == &snapshot.creator {
        return AccessLevel::Creator;
    }
    if snapshot.members.iter().any(|m| m == viewer) {
        return AccessLevel::Member;
    }
    if snapshot.has_open_slot() {
        return AccessLevel::CanJoin;
    }
    AccessLevel::Viewer
}
