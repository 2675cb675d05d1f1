// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use chama_core::{redeem_in_place, InviteError};
use chama_model::{Chama, ChamaId, ChamaStatus, EvmAddress, Invite, Member};
use tokio::sync::Mutex;

use crate::error::{RedeemError, StoreError, StoreErrorCode};
use crate::records::{encode_page_cursor, ChamaPage, ChamaQuery, RecordStore};

#[derive(Default)]
struct Tables {
    chamas: BTreeMap<ChamaId, Chama>,
    members: BTreeMap<ChamaId, BTreeMap<EvmAddress, Member>>,
    invites: BTreeMap<String, Invite>,
}

/// Record store held in process memory.
///
/// One lock guards every table, so each trait call is atomic.
#[derive(Default)]
pub struct InMemoryRecordStore {
    tables: Mutex<Tables>,
    fail_next: AtomicU32,
    calls: AtomicU64,
}

fn invite_key(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn not_found(what: &str, key: &str) -> StoreError {
    StoreError::new(StoreErrorCode::NotFound, format!("{what} {key} not found"))
}

impl InMemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` calls fail with `Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::new(
                StoreErrorCode::Unavailable,
                "injected backend failure",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_chamas(&self, query: &ChamaQuery) -> Result<ChamaPage, StoreError> {
        self.enter()?;
        let after = query.resume_after()?;
        let limit = query.effective_limit();
        let needle = query.text.as_ref().map(|t| t.to_lowercase());
        let tables = self.tables.lock().await;

        let mut matched = tables
            .chamas
            .values()
            .filter(|c| after.as_ref().map_or(true, |a| &c.id > a))
            .filter(|c| query.status.map_or(true, |s| c.status == s))
            .filter(|c| {
                needle
                    .as_ref()
                    .map_or(true, |n| c.name.to_lowercase().contains(n.as_str()))
            })
            .filter(|c| {
                query.member.as_ref().map_or(true, |m| {
                    &c.creator == m
                        || tables
                            .members
                            .get(&c.id)
                            .is_some_and(|rows| rows.contains_key(m))
                })
            });

        let items: Vec<Chama> = matched.by_ref().take(limit).cloned().collect();
        let next_cursor = match (matched.next(), items.last()) {
            (Some(_), Some(last)) => Some(encode_page_cursor(&last.id)?),
            _ => None,
        };
        Ok(ChamaPage { items, next_cursor })
    }

    async fn get_chama(&self, id: &ChamaId) -> Result<Chama, StoreError> {
        self.enter()?;
        let tables = self.tables.lock().await;
        tables
            .chamas
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("chama", id.as_str()))
    }

    async fn insert_chama(&self, chama: Chama) -> Result<(), StoreError> {
        self.enter()?;
        chama
            .validate()
            .map_err(|e| StoreError::new(StoreErrorCode::Validation, e.to_string()))?;
        let mut tables = self.tables.lock().await;
        if tables.chamas.contains_key(&chama.id) {
            return Err(StoreError::new(
                StoreErrorCode::AlreadyExists,
                format!("chama {} already exists", chama.id),
            ));
        }
        tables.chamas.insert(chama.id.clone(), chama);
        Ok(())
    }

    async fn update_chama(&self, chama: Chama, expected: ChamaStatus) -> Result<(), StoreError> {
        self.enter()?;
        chama
            .validate()
            .map_err(|e| StoreError::new(StoreErrorCode::Validation, e.to_string()))?;
        let mut tables = self.tables.lock().await;
        let current = tables
            .chamas
            .get_mut(&chama.id)
            .ok_or_else(|| not_found("chama", chama.id.as_str()))?;
        if current.status != expected {
            tracing::debug!(
                chama = %chama.id,
                expected = %expected,
                actual = %current.status,
                "conditional update lost"
            );
            return Err(StoreError::new(
                StoreErrorCode::Conflict,
                format!(
                    "chama {} is {}, expected {}",
                    chama.id, current.status, expected
                ),
            ));
        }
        *current = chama;
        Ok(())
    }

    async fn list_members(&self, id: &ChamaId) -> Result<Vec<Member>, StoreError> {
        self.enter()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .members
            .get(id)
            .map(|rows| {
                let mut out: Vec<Member> = rows.values().cloned().collect();
                out.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.address.cmp(&b.address)));
                out
            })
            .unwrap_or_default())
    }

    async fn insert_member(&self, member: Member, capacity: u32) -> Result<u32, StoreError> {
        self.enter()?;
        let mut tables = self.tables.lock().await;
        if !tables.chamas.contains_key(&member.chama_id) {
            return Err(not_found("chama", member.chama_id.as_str()));
        }
        let rows = tables.members.entry(member.chama_id.clone()).or_default();
        if rows.contains_key(&member.address) {
            return Err(StoreError::new(
                StoreErrorCode::AlreadyExists,
                format!("{} already belongs to {}", member.address, member.chama_id),
            ));
        }
        let count = u32::try_from(rows.len()).unwrap_or(u32::MAX);
        if count >= capacity {
            return Err(StoreError::new(
                StoreErrorCode::CapacityReached,
                format!("chama {} already has {count} members", member.chama_id),
            ));
        }
        rows.insert(member.address.clone(), member);
        Ok(count + 1)
    }

    async fn upsert_member(&self, member: Member) -> Result<(), StoreError> {
        self.enter()?;
        let mut tables = self.tables.lock().await;
        if !tables.chamas.contains_key(&member.chama_id) {
            return Err(not_found("chama", member.chama_id.as_str()));
        }
        tables
            .members
            .entry(member.chama_id.clone())
            .or_default()
            .insert(member.address.clone(), member);
        Ok(())
    }

    async fn remove_member(&self, id: &ChamaId, address: &EvmAddress) -> Result<(), StoreError> {
        self.enter()?;
        let mut tables = self.tables.lock().await;
        tables
            .members
            .get_mut(id)
            .and_then(|rows| rows.remove(address))
            .map(|_| ())
            .ok_or_else(|| not_found("member", address.as_str()))
    }

    async fn insert_invite(&self, invite: Invite) -> Result<(), StoreError> {
        self.enter()?;
        invite
            .validate()
            .map_err(|e| StoreError::new(StoreErrorCode::Validation, e.to_string()))?;
        let key = invite_key(&invite.code);
        let mut tables = self.tables.lock().await;
        if tables.invites.contains_key(&key) {
            return Err(StoreError::new(
                StoreErrorCode::AlreadyExists,
                format!("invite {key} already exists"),
            ));
        }
        tables.invites.insert(key, invite);
        Ok(())
    }

    async fn get_invite(&self, code: &str) -> Result<Invite, StoreError> {
        self.enter()?;
        let key = invite_key(code);
        let tables = self.tables.lock().await;
        tables
            .invites
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found("invite", &key))
    }

    async fn redeem_invite(
        &self,
        code: &str,
        redeemer: &EvmAddress,
        now: u64,
    ) -> Result<Invite, RedeemError> {
        self.enter()?;
        let mut tables = self.tables.lock().await;
        let invite = tables
            .invites
            .get_mut(&invite_key(code))
            .ok_or(RedeemError::Rejected(InviteError::NotFound))?;
        redeem_in_place(invite, redeemer, now)?;
        Ok(invite.clone())
    }

    async fn release_invite_use(&self, code: &str) -> Result<Invite, StoreError> {
        self.enter()?;
        let key = invite_key(code);
        let mut tables = self.tables.lock().await;
        let invite = tables
            .invites
            .get_mut(&key)
            .ok_or_else(|| not_found("invite", &key))?;
        invite.current_uses = invite.current_uses.checked_sub(1).ok_or_else(|| {
            StoreError::new(
                StoreErrorCode::Conflict,
                format!("invite {key} has no recorded use to release"),
            )
        })?;
        Ok(invite.clone())
    }

    async fn deactivate_invite(&self, code: &str) -> Result<(), StoreError> {
        self.enter()?;
        let key = invite_key(code);
        let mut tables = self.tables.lock().await;
        let invite = tables
            .invites
            .get_mut(&key)
            .ok_or_else(|| not_found("invite", &key))?;
        invite.is_active = false;
        Ok(())
    }
}
