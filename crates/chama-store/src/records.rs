// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chama_core::canonical::{decode_page_token, encode_page_token};
use chama_model::{Chama, ChamaId, ChamaStatus, EvmAddress, Invite, Member};
use serde::{Deserialize, Serialize};

use crate::error::{RedeemError, StoreError, StoreErrorCode};

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChamaQuery {
    pub status: Option<ChamaStatus>,
    /// Only chamas this address belongs to.
    pub member: Option<EvmAddress>,
    /// Case-insensitive substring match on the name.
    pub text: Option<String>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

impl ChamaQuery {
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    /// Id after which the page starts.
    pub fn resume_after(&self) -> Result<Option<ChamaId>, StoreError> {
        let Some(token) = &self.cursor else {
            return Ok(None);
        };
        let cursor: PageCursor = decode_page_token(token)
            .map_err(|e| StoreError::new(StoreErrorCode::Validation, e.to_string()))?;
        Ok(Some(cursor.after))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PageCursor {
    after: ChamaId,
}

pub fn encode_page_cursor(after: &ChamaId) -> Result<String, StoreError> {
    encode_page_token(&PageCursor {
        after: after.clone(),
    })
    .map_err(|e| StoreError::new(StoreErrorCode::Internal, e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChamaPage {
    pub items: Vec<Chama>,
    pub next_cursor: Option<String>,
}

/// Off-chain record store: chama metadata, membership rows and invites.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_chamas(&self, query: &ChamaQuery) -> Result<ChamaPage, StoreError>;
    async fn get_chama(&self, id: &ChamaId) -> Result<Chama, StoreError>;
    async fn insert_chama(&self, chama: Chama) -> Result<(), StoreError>;
    /// Replaces the record only if its stored status still equals `expected`.
    async fn update_chama(&self, chama: Chama, expected: ChamaStatus) -> Result<(), StoreError>;

    async fn list_members(&self, id: &ChamaId) -> Result<Vec<Member>, StoreError>;
    /// Adds a new member if fewer than `capacity` rows exist; returns the new count.
    async fn insert_member(&self, member: Member, capacity: u32) -> Result<u32, StoreError>;
    async fn upsert_member(&self, member: Member) -> Result<(), StoreError>;
    async fn remove_member(&self, id: &ChamaId, address: &EvmAddress) -> Result<(), StoreError>;

    async fn insert_invite(&self, invite: Invite) -> Result<(), StoreError>;
    async fn get_invite(&self, code: &str) -> Result<Invite, StoreError>;
    /// Atomic check-and-increment of `current_uses`.
    async fn redeem_invite(
        &self,
        code: &str,
        redeemer: &EvmAddress,
        now: u64,
    ) -> Result<Invite, RedeemError>;
    /// Returns one use taken by `redeem_invite`; fails if none was taken.
    async fn release_invite_use(&self, code: &str) -> Result<Invite, StoreError>;
    async fn deactivate_invite(&self, code: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(ChamaQuery::default().effective_limit(), DEFAULT_PAGE_LIMIT);
        let big = ChamaQuery {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(big.effective_limit(), MAX_PAGE_LIMIT);
    }

    #[test]
    fn cursor_round_trips_and_rejects_garbage() {
        let id = ChamaId::new("c7").expect("id");
        let query = ChamaQuery {
            cursor: Some(encode_page_cursor(&id).expect("cursor")),
            ..Default::default()
        };
        assert_eq!(query.resume_after().expect("decode"), Some(id));

        let bad = ChamaQuery {
            cursor: Some("%%%".to_string()),
            ..Default::default()
        };
        assert_eq!(
            bad.resume_after().expect_err("garbage").code,
            StoreErrorCode::Validation
        );
    }
}
