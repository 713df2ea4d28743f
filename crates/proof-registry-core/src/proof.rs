//! The proof record.

use serde::{Deserialize, Serialize};

use crate::crypto::Identity;
use crate::types::{DataHash, Timestamp};

/// A stored attestation that some content hash existed at a point in time.
///
/// Every field except `is_active` is fixed at registration. `is_active`
/// can only go from `true` to `false`, and only through
/// [`Registry::deactivate`](crate::Registry::deactivate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Identity that registered this proof.
    pub submitter: Identity,
    /// Hash of the off-chain content.
    pub data_hash: DataHash,
    /// Short human-readable label.
    pub subject: String,
    /// Optional free-text label, empty when not given.
    pub context: String,
    /// Registration time (Unix ms).
    pub created_at: Timestamp,
    /// Soft-delete flag.
    pub is_active: bool,
}

impl Proof {
    /// Whether `identity` registered this proof.
    pub fn is_submitted_by(&self, identity: &Identity) -> bool {
        &self.submitter == identity
    }

    /// The immutable part of the record, for comparing across time.
    pub fn fingerprint(&self) -> (Identity, DataHash, &str, &str, Timestamp) {
        (
            self.submitter,
            self.data_hash,
            &self.subject,
            &self.context,
            self.created_at,
        )
    }
}
