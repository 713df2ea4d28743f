//! Input limits and structural invariant checks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::crypto::Identity;
use crate::error::{InvariantViolation, RegistryError};
use crate::proof::Proof;
use crate::types::{DataHash, ProofId};

/// Maximum label sizes accepted by `register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelLimits {
    pub max_subject_bytes: usize,
    pub max_context_bytes: usize,
}

impl Default for LabelLimits {
    fn default() -> Self {
        Self {
            max_subject_bytes: 256,
            max_context_bytes: 1024,
        }
    }
}

impl LabelLimits {
    /// No limits at all.
    pub const UNLIMITED: Self = Self {
        max_subject_bytes: usize::MAX,
        max_context_bytes: usize::MAX,
    };

    /// Check subject and context lengths.
    pub fn check(&self, subject: &str, context: &str) -> Result<(), RegistryError> {
        check_len("subject", subject, self.max_subject_bytes)?;
        check_len("context", context, self.max_context_bytes)
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), RegistryError> {
    if value.len() > max {
        return Err(RegistryError::LabelTooLong {
            field,
            len: value.len(),
            max,
        });
    }
    Ok(())
}

/// Check invariants I1, I2 and I5 over the raw registry tables.
pub(crate) fn check_tables(
    records: &[Proof],
    next_id: u64,
    hash_index: &HashMap<DataHash, ProofId>,
    by_owner: &HashMap<Identity, Vec<ProofId>>,
) -> Result<(), InvariantViolation> {
    let count = records.len() as u64;
    if next_id != count {
        return Err(InvariantViolation::CounterMismatch { next_id, count });
    }

    if hash_index.len() != records.len() {
        return Err(InvariantViolation::HashIndexSize {
            indexed: hash_index.len(),
            count: records.len(),
        });
    }

    let mut expected_owners: HashMap<Identity, Vec<ProofId>> = HashMap::new();
    for (i, proof) in records.iter().enumerate() {
        let id = ProofId(i as u64);
        if proof.submitter.is_zero() {
            return Err(InvariantViolation::ZeroSubmitter(id));
        }
        if proof.data_hash.is_zero() {
            return Err(InvariantViolation::ZeroHash(id));
        }

        let indexed = hash_index.get(&proof.data_hash).copied();
        if indexed != Some(id) {
            return Err(InvariantViolation::HashIndexMismatch {
                hash: proof.data_hash,
                indexed,
                expected: id,
            });
        }

        expected_owners.entry(proof.submitter).or_default().push(id);
    }

    if expected_owners.len() != by_owner.len() {
        let owner = by_owner
            .keys()
            .find(|k| !expected_owners.contains_key(k))
            .or_else(|| expected_owners.keys().find(|k| !by_owner.contains_key(k)))
            .copied()
            .unwrap_or(Identity::ZERO);
        return Err(InvariantViolation::OwnerIndexMismatch { owner });
    }
    for (owner, ids) in &expected_owners {
        if by_owner.get(owner) != Some(ids) {
            return Err(InvariantViolation::OwnerIndexMismatch { owner: *owner });
        }
    }

    Ok(())
}
