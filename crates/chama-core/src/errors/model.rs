// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt;

use chama_model::ValidationError;

pub type Result<T> = std::result::Result<T, Error>;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExitCode {
    Success = 0,
    Usage = 2,
    Validation = 3,
    DependencyFailure = 4,
    Internal = 10,
}

impl ExitCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Usage => "usage",
            Self::Validation => "validation",
            Self::DependencyFailure => "dependency_failure",
            Self::Internal => "internal",
        }
    }
}

/// How a failure is surfaced and whether the caller may retry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Network or RPC trouble; shown as a non-blocking warning.
    Retryable,
    /// Bad input; reported inline and never retried.
    Validation,
    /// The on-chain attempt failed; the user must start over.
    TransactionFailed,
    /// Off-chain and on-chain views disagree.
    NeedsResync,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum ErrorCode {
    InviteMalformed,
    InviteNotFound,
    InviteSelfRedeem,
    InviteInactive,
    InviteExpired,
    InviteExhausted,
    InvalidTransition,
    InsufficientMembers,
    DepositPending,
    InsufficientBalance,
    ChamaFull,
    AlreadyMember,
    NotMember,
    Unauthorized,
    NotFound,
    Conflict,
    ValidationError,
    RpcUnavailable,
    BackendUnavailable,
    TransactionFailed,
    NeedsResync,
    InternalError,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InviteMalformed => "invite_malformed",
            Self::InviteNotFound => "invite_not_found",
            Self::InviteSelfRedeem => "invite_self_redeem",
            Self::InviteInactive => "invite_inactive",
            Self::InviteExpired => "invite_expired",
            Self::InviteExhausted => "invite_exhausted",
            Self::InvalidTransition => "invalid_transition",
            Self::InsufficientMembers => "insufficient_members",
            Self::DepositPending => "deposit_pending",
            Self::InsufficientBalance => "insufficient_balance",
            Self::ChamaFull => "chama_full",
            Self::AlreadyMember => "already_member",
            Self::NotMember => "not_member",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::ValidationError => "validation_error",
            Self::RpcUnavailable => "rpc_unavailable",
            Self::BackendUnavailable => "backend_unavailable",
            Self::TransactionFailed => "transaction_failed",
            Self::NeedsResync => "needs_resync",
            Self::InternalError => "internal_error",
        }
    }

    #[must_use]
    pub const fn class(self) -> ErrorClass {
        match self {
            Self::RpcUnavailable | Self::BackendUnavailable => ErrorClass::Retryable,
            Self::TransactionFailed => ErrorClass::TransactionFailed,
            Self::NeedsResync => ErrorClass::NeedsResync,
            Self::InternalError => ErrorClass::Internal,
            _ => ErrorClass::Validation,
        }
    }

    #[must_use]
    pub const fn exit_code(self) -> ExitCode {
        match self.class() {
            ErrorClass::Validation => ExitCode::Validation,
            ErrorClass::Retryable | ErrorClass::TransactionFailed | ErrorClass::NeedsResync => {
                ExitCode::DependencyFailure
            }
            ErrorClass::Internal => ExitCode::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    SerdeJson(serde_json::Error),
    DecodeCursorBase64(String),
    DecodeCursorJson(String),
    Validation(ValidationError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SerdeJson(err) => write!(f, "serde json error: {err}"),
            Self::DecodeCursorBase64(message) => write!(f, "cursor base64 decode failed: {message}"),
            Self::DecodeCursorJson(message) => write!(f, "cursor json decode failed: {message}"),
            Self::Validation(err) => write!(f, "validation failed: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SerdeJson(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::DecodeCursorBase64(_) | Self::DecodeCursorJson(_) => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::SerdeJson(value)
    }
}

impl From<ValidationError> for Error {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl MachineError {
    #[must_use]
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn from_code(code: ErrorCode, message: &str) -> Self {
        Self::new(code.as_str(), message).with_detail("class", error_class_str(code.class()))
    }

    #[must_use]
    pub fn with_detail(mut self, key: &str, value: &str) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }
}

const fn error_class_str(class: ErrorClass) -> &'static str {
    match class {
        ErrorClass::Retryable => "retryable",
        ErrorClass::Validation => "validation",
        ErrorClass::TransactionFailed => "transaction_failed",
        ErrorClass::NeedsResync => "needs_resync",
        ErrorClass::Internal => "internal",
    }
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for MachineError {}
