// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use chama_core::ReconciledStatus;
use chama_model::ChamaId;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

impl RefreshTicket {
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Orders status writes per chama so an older response never overwrites a
/// newer one.
#[derive(Debug, Default)]
pub struct RefreshGate {
    issued: u64,
    applied: HashMap<ChamaId, RefreshTicket>,
}

impl RefreshGate {
    pub fn issue(&mut self) -> RefreshTicket {
        self.issued += 1;
        RefreshTicket(self.issued)
    }

    /// Records `ticket` as applied if it is newer than the last one applied
    /// for `id`. Returns the ticket that blocks it otherwise.
    pub fn admit(&mut self, id: &ChamaId, ticket: RefreshTicket) -> Result<(), RefreshTicket> {
        match self.applied.get(id) {
            Some(latest) if *latest >= ticket => Err(*latest),
            _ => {
                self.applied.insert(id.clone(), ticket);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn last_applied(&self, id: &ChamaId) -> Option<RefreshTicket> {
        self.applied.get(id).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied(ReconciledStatus),
    /// A newer write for the same chama landed first.
    Discarded {
        ticket: RefreshTicket,
        superseded_by: RefreshTicket,
    },
}

/// Per-chama async lock so only one refresh for a chama runs at a time.
#[derive(Default)]
pub struct RefreshCoalescer {
    inflight: Mutex<HashMap<ChamaId, Arc<Mutex<()>>>>,
}

impl RefreshCoalescer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: &ChamaId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(id.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn id(raw: &str) -> ChamaId {
        ChamaId::new(raw).expect("id")
    }

    #[test]
    fn older_ticket_is_rejected_after_newer_applies() {
        let mut gate = RefreshGate::default();
        let first = gate.issue();
        let second = gate.issue();
        assert!(second > first);

        gate.admit(&id("c1"), second).expect("newer applies");
        assert_eq!(gate.admit(&id("c1"), first), Err(second));
        assert_eq!(gate.last_applied(&id("c1")), Some(second));
    }

    #[test]
    fn tickets_are_tracked_per_chama() {
        let mut gate = RefreshGate::default();
        let a = gate.issue();
        let b = gate.issue();
        gate.admit(&id("c2"), b).expect("c2");
        gate.admit(&id("c1"), a).expect("c1 unaffected by c2");
    }

    #[tokio::test]
    async fn coalescer_serializes_same_key() {
        let coalescer = Arc::new(RefreshCoalescer::new());
        let guard = coalescer.acquire(&id("c1")).await;

        let other = Arc::clone(&coalescer);
        let waiter = tokio::spawn(async move {
            let _g = other.acquire(&id("c1")).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let _unrelated = coalescer.acquire(&id("c2")).await;
        drop(guard);
        waiter.await.expect("waiter completes");
    }
}
