// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use async_trait::async_trait;
use chama_core::OnChainSnapshot;
use chama_model::{Chama, ChamaId, EvmAddress, Round, TxHash};
use serde::{Deserialize, Serialize};

use crate::error::ChainError;

/// Parameters of the contract deployment that registers a chama on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub chama_id: ChamaId,
    pub creator: EvmAddress,
    pub members: Vec<EvmAddress>,
    pub contribution_amount: u128,
    pub deposit_amount: u128,
    pub cycle_duration_secs: u64,
    pub grace_period_secs: u64,
}

impl RegistrationRequest {
    #[must_use]
    pub fn for_chama(chama: &Chama, members: Vec<EvmAddress>) -> Self {
        Self {
            chama_id: chama.id.clone(),
            creator: chama.creator.clone(),
            members,
            contribution_amount: chama.contribution_amount,
            deposit_amount: chama.deposit_amount,
            cycle_duration_secs: chama.cycle_duration_secs,
            grace_period_secs: chama.grace_period_secs,
        }
    }

    /// What the creator must hold to fund the first round and the deposit.
    #[must_use]
    pub fn required_balance(&self) -> u128 {
        self.contribution_amount.saturating_add(self.deposit_amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx: TxHash,
    pub success: bool,
    pub block_number: u64,
    #[serde(default)]
    pub contract_address: Option<EvmAddress>,
}

/// Read and write access to the savings-circle contracts.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn read_chama(&self, contract: &EvmAddress) -> Result<OnChainSnapshot, ChainError>;
    async fn read_rounds(&self, contract: &EvmAddress) -> Result<Vec<Round>, ChainError>;
    async fn balance_of(&self, account: &EvmAddress) -> Result<u128, ChainError>;
    async fn submit_registration(
        &self,
        request: &RegistrationRequest,
    ) -> Result<TxHash, ChainError>;
    async fn wait_for_receipt(
        &self,
        tx: &TxHash,
        timeout: Duration,
    ) -> Result<TxReceipt, ChainError>;
}
