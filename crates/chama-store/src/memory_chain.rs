// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chama_core::OnChainSnapshot;
use chama_model::{EvmAddress, Round, TxHash};
use tokio::sync::Mutex;

use crate::chain::{ChainClient, RegistrationRequest, TxReceipt};
use crate::error::{ChainError, ChainErrorCode};

struct Contract {
    snapshot: OnChainSnapshot,
    rounds: Vec<Round>,
}

struct PendingTx {
    contract: EvmAddress,
    reverted: bool,
    block_number: u64,
}

#[derive(Default)]
struct Ledger {
    contracts: BTreeMap<EvmAddress, Contract>,
    balances: BTreeMap<EvmAddress, u128>,
    pending: BTreeMap<TxHash, PendingTx>,
}

/// Chain simulator with knobs for RPC failures, reverts and slow receipts.
#[derive(Default)]
pub struct InMemoryChain {
    ledger: Mutex<Ledger>,
    nonce: AtomicU64,
    fail_reads: AtomicU32,
    fail_balance: AtomicBool,
    revert_next: AtomicBool,
    receipt_delay_ms: AtomicU64,
    read_delay_ms: AtomicU64,
    read_calls: AtomicU64,
}

fn unavailable() -> ChainError {
    ChainError::new(ChainErrorCode::Unavailable, "injected rpc failure")
}

impl InMemoryChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_balance(&self, account: &EvmAddress, amount: u128) {
        self.ledger
            .lock()
            .await
            .balances
            .insert(account.clone(), amount);
    }

    /// Installs or replaces a contract as if it had been deployed earlier.
    pub async fn put_contract(&self, address: &EvmAddress, snapshot: OnChainSnapshot, rounds: Vec<Round>) {
        self.ledger
            .lock()
            .await
            .contracts
            .insert(address.clone(), Contract { snapshot, rounds });
    }

    pub fn fail_next_reads(&self, n: u32) {
        self.fail_reads.store(n, Ordering::SeqCst);
    }

    pub fn fail_balance_checks(&self, fail: bool) {
        self.fail_balance.store(fail, Ordering::SeqCst);
    }

    pub fn revert_next_submission(&self) {
        self.revert_next.store(true, Ordering::SeqCst);
    }

    pub fn set_receipt_delay(&self, delay: Duration) {
        self.receipt_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_read_delay(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    #[must_use]
    pub fn read_calls(&self) -> u64 {
        self.read_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn submissions(&self) -> u64 {
        self.nonce.load(Ordering::SeqCst)
    }

    async fn enter_read(&self) -> Result<(), ChainError> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let injected = self
            .fail_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(unavailable());
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for InMemoryChain {
    async fn read_chama(&self, contract: &EvmAddress) -> Result<OnChainSnapshot, ChainError> {
        self.enter_read().await?;
        let ledger = self.ledger.lock().await;
        ledger
            .contracts
            .get(contract)
            .map(|c| c.snapshot)
            .ok_or_else(|| {
                ChainError::new(
                    ChainErrorCode::NotDeployed,
                    format!("no contract at {contract}"),
                )
            })
    }

    async fn read_rounds(&self, contract: &EvmAddress) -> Result<Vec<Round>, ChainError> {
        self.enter_read().await?;
        let ledger = self.ledger.lock().await;
        ledger
            .contracts
            .get(contract)
            .map(|c| c.rounds.clone())
            .ok_or_else(|| {
                ChainError::new(
                    ChainErrorCode::NotDeployed,
                    format!("no contract at {contract}"),
                )
            })
    }

    async fn balance_of(&self, account: &EvmAddress) -> Result<u128, ChainError> {
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let ledger = self.ledger.lock().await;
        Ok(ledger.balances.get(account).copied().unwrap_or(0))
    }

    async fn submit_registration(
        &self,
        request: &RegistrationRequest,
    ) -> Result<TxHash, ChainError> {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst) + 1;
        let tx = TxHash::new(format!("0x{nonce:064x}"))
            .map_err(|e| ChainError::new(ChainErrorCode::InvalidResponse, e.to_string()))?;
        let contract = EvmAddress::new(format!("0xc0{nonce:038x}"))
            .map_err(|e| ChainError::new(ChainErrorCode::InvalidResponse, e.to_string()))?;
        let reverted = self.revert_next.swap(false, Ordering::SeqCst);
        let members = u32::try_from(request.members.len()).unwrap_or(u32::MAX);

        let mut ledger = self.ledger.lock().await;
        if !reverted {
            ledger.contracts.insert(
                contract.clone(),
                Contract {
                    snapshot: OnChainSnapshot {
                        member_count: members,
                        member_target: members,
                        current_round: 0,
                        total_rounds: members,
                        completed: false,
                    },
                    rounds: Vec::new(),
                },
            );
        }
        ledger.pending.insert(
            tx.clone(),
            PendingTx {
                contract,
                reverted,
                block_number: 1_000 + nonce,
            },
        );
        Ok(tx)
    }

    async fn wait_for_receipt(
        &self,
        tx: &TxHash,
        timeout: Duration,
    ) -> Result<TxReceipt, ChainError> {
        let delay = Duration::from_millis(self.receipt_delay_ms.load(Ordering::SeqCst));
        if tokio::time::timeout(timeout, tokio::time::sleep(delay))
            .await
            .is_err()
        {
            return Err(ChainError::new(
                ChainErrorCode::Timeout,
                format!("no receipt for {tx} within {}ms", timeout.as_millis()),
            ));
        }
        let ledger = self.ledger.lock().await;
        let pending = ledger.pending.get(tx).ok_or_else(|| {
            ChainError::new(ChainErrorCode::InvalidResponse, format!("unknown tx {tx}"))
        })?;
        Ok(TxReceipt {
            tx: tx.clone(),
            success: !pending.reverted,
            block_number: pending.block_number,
            contract_address: (!pending.reverted).then(|| pending.contract.clone()),
        })
    }
}
