//! Registry events: the public audit trail.
//!
//! Every successful mutation produces exactly one event. Events are never
//! read back by the registry itself; they exist for external consumers.

use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::crypto::Identity;
use crate::error::CoreError;
use crate::types::{DataHash, ProofId, Timestamp};

/// Discriminator for event interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum EventKind {
    ProofRegistered = 1,
    ProofDeactivated = 2,
    AdminTransferred = 3,
}

impl EventKind {
    /// Wire code.
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Parse a wire code.
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::ProofRegistered),
            2 => Some(Self::ProofDeactivated),
            3 => Some(Self::AdminTransferred),
            _ => None,
        }
    }

    /// Stable name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProofRegistered => "proof_registered",
            Self::ProofDeactivated => "proof_deactivated",
            Self::AdminTransferred => "admin_transferred",
        }
    }
}

/// A structured record of one committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryEvent {
    ProofRegistered {
        id: ProofId,
        submitter: Identity,
        data_hash: DataHash,
        subject: String,
        context: String,
        timestamp: Timestamp,
    },
    ProofDeactivated {
        id: ProofId,
        caller: Identity,
        timestamp: Timestamp,
    },
    AdminTransferred {
        previous: Identity,
        new_admin: Identity,
        timestamp: Timestamp,
    },
}

impl RegistryEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ProofRegistered { .. } => EventKind::ProofRegistered,
            Self::ProofDeactivated { .. } => EventKind::ProofDeactivated,
            Self::AdminTransferred { .. } => EventKind::AdminTransferred,
        }
    }

    /// The proof this event concerns, if any.
    pub fn proof_id(&self) -> Option<ProofId> {
        match self {
            Self::ProofRegistered { id, .. } | Self::ProofDeactivated { id, .. } => Some(*id),
            Self::AdminTransferred { .. } => None,
        }
    }

    /// The identity that performed the operation.
    pub fn actor(&self) -> Identity {
        match self {
            Self::ProofRegistered { submitter, .. } => *submitter,
            Self::ProofDeactivated { caller, .. } => *caller,
            Self::AdminTransferred { previous, .. } => *previous,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::ProofRegistered { timestamp, .. }
            | Self::ProofDeactivated { timestamp, .. }
            | Self::AdminTransferred { timestamp, .. } => *timestamp,
        }
    }

    /// Deterministic CBOR encoding of this event.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical::event_bytes(self)
    }

    /// Parse an event from its canonical encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        canonical::decode_event(bytes)
    }

    /// Blake3 digest of the canonical encoding.
    pub fn digest(&self) -> DataHash {
        DataHash::of(&self.canonical_bytes())
    }
}

/// An event together with its position in the event log.
///
/// Sequence numbers start at 1 and have no gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub event: RegistryEvent,
}
