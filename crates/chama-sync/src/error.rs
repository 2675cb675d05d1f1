// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

use chama_core::{ErrorClass, ErrorCode, InviteError, MachineError};
use chama_model::ValidationError;
use chama_store::{ChainError, RedeemError, StoreError};

use crate::state::StateError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncError {
    pub code: ErrorCode,
    pub message: String,
}

impl SyncError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        self.code.class()
    }

    #[must_use]
    pub fn to_machine(&self) -> MachineError {
        MachineError::from_code(self.code, &self.message)
    }

    pub(crate) fn transaction_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransactionFailed, message)
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for SyncError {}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::new(value.code.error_code(), value.message)
    }
}

impl From<ChainError> for SyncError {
    fn from(value: ChainError) -> Self {
        Self::new(value.code.error_code(), value.message)
    }
}

impl From<RedeemError> for SyncError {
    fn from(value: RedeemError) -> Self {
        Self::new(value.error_code(), value.to_string())
    }
}

impl From<InviteError> for SyncError {
    fn from(value: InviteError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}

impl From<ValidationError> for SyncError {
    fn from(value: ValidationError) -> Self {
        Self::new(ErrorCode::ValidationError, value.0)
    }
}

impl From<StateError> for SyncError {
    fn from(value: StateError) -> Self {
        Self::new(value.error_code(), value.to_string())
    }
}
