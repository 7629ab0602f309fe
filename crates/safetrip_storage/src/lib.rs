#![forbid(unsafe_code)]

use safetrip_kernel_contracts::ContractViolation;
use thiserror::Error;

pub mod document;
pub mod memory;
pub mod repo;

pub use document::DocumentStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("duplicate key in {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("no row in {table} for {key}")]
    NotFound { table: &'static str, key: String },
    #[error("lock poisoned for {table}")]
    LockPoisoned { table: &'static str },
    #[error("document store backend: {0}")]
    Backend(String),
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Backend(format!("document codec: {e}"))
    }
}
