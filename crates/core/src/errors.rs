use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::transaction::TransactionStatus;
use crate::ledger::RecordKind;
use crate::permissions::Permission;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid transaction transition from {from:?} to {to:?}")]
    InvalidTransactionTransition { from: TransactionStatus, to: TransactionStatus },
    #[error("pin must be exactly 4 digits")]
    InvalidPin,
    #[error("unknown {kind} `{value}`")]
    UnknownVariant { kind: &'static str, value: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{kind} `{id}` not found")]
    NotFound { kind: RecordKind, id: String },
    #[error("{kind} `{id}` already exists")]
    DuplicateId { kind: RecordKind, id: String },
}

/// Errors surfaced to the agent at the call boundary. Every variant is
/// recoverable; none is retried automatically.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("{message}")]
    NotFound { message: String },
    #[error("role lacks permission `{}` required by `{action}`", .permission.as_str())]
    PermissionDenied { action: String, permission: Permission },
    #[error("invalid argument `{field}`: {message}")]
    Validation { field: String, message: String },
    #[error("{message}")]
    InvalidState { message: String },
    #[error("{message}")]
    Unauthorized { message: String },
    #[error("{message}")]
    BusinessRuleViolation { message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    ValidationError,
    InvalidState,
    Unauthorized,
    BusinessRuleViolation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::ValidationError => "validation_error",
            Self::InvalidState => "invalid_state",
            Self::Unauthorized => "unauthorized",
            Self::BusinessRuleViolation => "business_rule_violation",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ActionError {
    pub fn not_found(kind: RecordKind, id: impl AsRef<str>) -> Self {
        Self::NotFound { message: format!("{kind} `{}` not found", id.as_ref()) }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    pub fn business_rule(message: impl Into<String>) -> Self {
        Self::BusinessRuleViolation { message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::Validation { .. } => ErrorKind::ValidationError,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::BusinessRuleViolation { .. } => ErrorKind::BusinessRuleViolation,
        }
    }

    /// Message the agent may relay verbatim. Permission refusals never hint
    /// at page structure.
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied { .. } => {
                "You do not have permission to perform this operation.".to_string()
            }
            Self::InvalidState { message } => format!("Already decided: {message}"),
            other => other.to_string(),
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        let field = match self {
            Self::Validation { field, .. } => Some(field.clone()),
            _ => None,
        };
        ErrorPayload { kind: self.kind(), message: self.user_message(), field }
    }
}

impl From<LedgerError> for ActionError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::NotFound { .. } => Self::NotFound { message: value.to_string() },
            LedgerError::DuplicateId { .. } => {
                Self::BusinessRuleViolation { message: value.to_string() }
            }
        }
    }
}

impl From<DomainError> for ActionError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidTransactionTransition { from, .. } => {
                Self::InvalidState { message: format!("transaction is already {}", from.as_str()) }
            }
            DomainError::InvalidPin => Self::validation("pin", value.to_string()),
            DomainError::UnknownVariant { kind, .. } => {
                Self::validation(kind.replace(' ', "_"), value.to_string())
            }
        }
    }
}
