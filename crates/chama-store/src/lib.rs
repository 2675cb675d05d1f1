// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Seams to the two external collaborators, the off-chain record store and
//! the chain RPC, plus in-memory backends for both.

mod chain;
mod error;
mod memory;
mod memory_chain;
mod records;
mod retry;

pub use chain::{ChainClient, RegistrationRequest, TxReceipt};
pub use error::{ChainError, ChainErrorCode, RedeemError, StoreError, StoreErrorCode};
pub use memory::InMemoryRecordStore;
pub use memory_chain::InMemoryChain;
pub use records::{
    encode_page_cursor, ChamaPage, ChamaQuery, RecordStore, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};
pub use retry::RetryPolicy;

pub const CRATE_NAME: &str = "chama-store";
