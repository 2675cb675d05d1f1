// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

use chama_core::{ErrorCode, InviteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreErrorCode {
    NotFound,
    AlreadyExists,
    /// Conditional write lost against a concurrent update.
    Conflict,
    CapacityReached,
    Validation,
    Unavailable,
    Internal,
}

impl StoreErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::Conflict => "conflict",
            Self::CapacityReached => "capacity_reached",
            Self::Validation => "validation_error",
            Self::Unavailable => "backend_unavailable",
            Self::Internal => "internal_error",
        }
    }

    #[must_use]
    pub const fn error_code(self) -> ErrorCode {
        match self {
            Self::NotFound => ErrorCode::NotFound,
            Self::AlreadyExists => ErrorCode::Conflict,
            Self::Conflict => ErrorCode::Conflict,
            Self::CapacityReached => ErrorCode::ChamaFull,
            Self::Validation => ErrorCode::ValidationError,
            Self::Unavailable => ErrorCode::BackendUnavailable,
            Self::Internal => ErrorCode::InternalError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub code: StoreErrorCode,
    pub message: String,
}

impl StoreError {
    #[must_use]
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.code == StoreErrorCode::Unavailable
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for StoreError {}

/// Outcome of a failed redemption: either a rule rejected the code or the
/// backend itself failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemError {
    Rejected(InviteError),
    Store(StoreError),
}

impl RedeemError {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Rejected(err) => err.code(),
            Self::Store(err) => err.code.error_code(),
        }
    }
}

impl Display for RedeemError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RedeemError {}

impl From<StoreError> for RedeemError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<InviteError> for RedeemError {
    fn from(value: InviteError) -> Self {
        Self::Rejected(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChainErrorCode {
    /// RPC endpoint unreachable or returned a transport error.
    Unavailable,
    Timeout,
    Reverted,
    NotDeployed,
    InvalidResponse,
}

impl ChainErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "rpc_unavailable",
            Self::Timeout => "rpc_timeout",
            Self::Reverted => "reverted",
            Self::NotDeployed => "not_deployed",
            Self::InvalidResponse => "invalid_response",
        }
    }

    #[must_use]
    pub const fn error_code(self) -> ErrorCode {
        match self {
            Self::Unavailable | Self::Timeout => ErrorCode::RpcUnavailable,
            Self::Reverted => ErrorCode::TransactionFailed,
            Self::NotDeployed => ErrorCode::NeedsResync,
            Self::InvalidResponse => ErrorCode::InternalError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainError {
    pub code: ChainErrorCode,
    pub message: String,
}

impl ChainError {
    #[must_use]
    pub fn new(code: ChainErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.code, ChainErrorCode::Unavailable | ChainErrorCode::Timeout)
    }
}

impl Display for ChainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ChainError {}
