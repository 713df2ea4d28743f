//! Error types for the registry service.

use proof_registry_core::{CoreError, RegistryError};
use proof_registry_store::StoreError;
use thiserror::Error;

/// Errors that can occur during service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The registry rejected the operation. Nothing was changed.
    #[error("rejected: {0}")]
    Rejected(#[from] RegistryError),

    /// Signature, encoding or invariant failure.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error. Nothing was changed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A signed call was made against an older log position.
    #[error("stale call: signed at seq {base_seq}, log is at {head}")]
    StaleCall { base_seq: u64, head: u64 },

    /// The commit task panicked or was cancelled by runtime shutdown.
    #[error("commit task failed: {0}")]
    Task(String),
}

impl ServiceError {
    /// The registry rejection, if this is one.
    pub fn rejection(&self) -> Option<&RegistryError> {
        match self {
            Self::Rejected(e) | Self::Core(CoreError::Registry(e)) => Some(e),
            _ => None,
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
