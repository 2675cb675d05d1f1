// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::OsRng;
use rand::RngCore;

pub trait ClockPort: Send + Sync {
    /// Unix time in seconds.
    fn now_unix(&self) -> u64;
}

pub trait RandomPort: Send + Sync {
    fn next_u64(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now_unix(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRandom;

impl RandomPort for SystemRandom {
    fn next_u64(&self) -> u64 {
        OsRng.next_u64()
    }
}

/// Settable clock for deterministic flows.
#[derive(Debug, Default)]
pub struct FixedClock(AtomicU64);

impl FixedClock {
    #[must_use]
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl ClockPort for FixedClock {
    fn now_unix(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counter-backed randomness; every call yields the next integer.
#[derive(Debug)]
pub struct SequenceRandom(AtomicU64);

impl SequenceRandom {
    #[must_use]
    pub fn starting_at(seed: u64) -> Self {
        Self(AtomicU64::new(seed))
    }
}

impl Default for SequenceRandom {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl RandomPort for SequenceRandom {
    fn next_u64(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}
