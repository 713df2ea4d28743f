//! Error types for the store module.

use proof_registry_core::ProofId;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Event encoding/decoding error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store has no registry yet.
    #[error("store is not initialized")]
    NotInitialized,

    /// The store already holds a registry.
    #[error("store is already initialized")]
    AlreadyInitialized,

    /// A commit does not line up with the stored state.
    #[error("commit conflict: expected proof id {expected}, got {got}")]
    Conflict { expected: ProofId, got: ProofId },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding store state was poisoned.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// A blocking task failed to complete.
    #[error("blocking task failed: {0}")]
    Task(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
