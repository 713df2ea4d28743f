//! Error types for the proof registry core.

use thiserror::Error;

use crate::crypto::Identity;
use crate::types::{DataHash, ProofId};

/// Rejections of a registry operation.
///
/// A rejected operation never changes registry state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("invalid hash: the zero hash cannot be registered")]
    InvalidHash,

    #[error("hash already registered: {0}")]
    HashAlreadyRegistered(DataHash),

    #[error("proof not found: {0}")]
    NotFound(ProofId),

    #[error("caller {caller} is not authorized")]
    Unauthorized { caller: Identity },

    #[error("proof {0} is already inactive")]
    AlreadyInactive(ProofId),

    #[error("invalid address: the zero identity is not allowed")]
    InvalidAddress,

    #[error("{field} is {len} bytes, exceeding the limit of {max}")]
    LabelTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

/// Core errors outside the registry rejection taxonomy.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// A broken structural invariant found while checking registry state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("next_id {next_id} does not match record count {count}")]
    CounterMismatch { next_id: u64, count: u64 },

    #[error("hash {hash} is indexed to {indexed:?}, expected {expected}")]
    HashIndexMismatch {
        hash: DataHash,
        indexed: Option<ProofId>,
        expected: ProofId,
    },

    #[error("hash index has {indexed} entries for {count} records")]
    HashIndexSize { indexed: usize, count: usize },

    #[error("owner index for {owner} is inconsistent")]
    OwnerIndexMismatch { owner: Identity },

    #[error("proof {0} has a zero submitter")]
    ZeroSubmitter(ProofId),

    #[error("proof {0} has a zero hash")]
    ZeroHash(ProofId),
}
