// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Client-side chama lifecycle service.
//!
//! Drives lifecycle operations against the record store and the chain,
//! reconciles the two views, and persists what the client remembers
//! between sessions.

pub mod config;
mod error;
pub mod refresh;
mod service;
pub mod state;
pub mod telemetry;

pub use config::{validate_startup_config_contract, SyncConfig};
pub use error::SyncError;
pub use refresh::{RefreshCoalescer, RefreshGate, RefreshOutcome, RefreshTicket};
pub use service::{ChamaService, NewChama, Redemption};
pub use state::{
    load_state, migrate_file, save_state, CachedStatus, ClientState, MigrationReport,
    StateError, CURRENT_SCHEMA_VERSION,
};

pub const CRATE_NAME: &str = "chama-sync";
