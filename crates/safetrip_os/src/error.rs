#![forbid(unsafe_code)]

use safetrip_kernel_contracts::ContractViolation;
use safetrip_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Access token required")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Invalid email or password")]
    InvalidCredentials,
}

/// Service-level outcome taxonomy. Display strings of every variant except
/// `Internal` are safe to hand to clients.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ContractViolation),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("internal failure: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::ContractViolation(v) => ServiceError::Validation(v),
            StorageError::NotFound { .. } => ServiceError::NotFound("Resource not found"),
            StorageError::DuplicateKey { .. } => ServiceError::Conflict("Resource already exists"),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}
