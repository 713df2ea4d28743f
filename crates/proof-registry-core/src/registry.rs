//! The registry state machine.
//!
//! [`Registry`] owns the record table and the three structures derived from
//! it (hash index, owner index, id counter) plus the admin identity. It does
//! no I/O: every operation is a terminating transition over memory.
//!
//! ## Planning and applying
//!
//! Each mutation is split in two:
//!
//! - `plan_*` validates against the current state and returns a
//!   [`Transition`] describing the full effect. It never mutates.
//! - [`Registry::apply`] performs a planned transition. It cannot fail.
//!
//! A host that persists state can therefore commit the transition to storage
//! first and only then apply it, so a storage failure leaves the in-memory
//! registry untouched. [`Registry::register`], [`Registry::deactivate`] and
//! [`Registry::transfer_admin`] do both steps at once.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::crypto::Identity;
use crate::error::{CoreError, InvariantViolation, RegistryError};
use crate::event::RegistryEvent;
use crate::proof::Proof;
use crate::types::{DataHash, ProofId, Timestamp};
use crate::validation::{check_tables, LabelLimits};

/// Who is calling and when, as supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub caller: Identity,
    pub now: Timestamp,
}

impl Context {
    pub fn new(caller: Identity, now: Timestamp) -> Self {
        Self { caller, now }
    }
}

/// Result of looking a hash up in the index.
///
/// Identifier 0 is a real proof, so "absent" is its own variant rather than
/// a default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashLookup {
    Found(ProofId),
    NotFound,
}

impl HashLookup {
    pub fn id(self) -> Option<ProofId> {
        match self {
            Self::Found(id) => Some(id),
            Self::NotFound => None,
        }
    }

    pub fn is_found(self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Answer to "has this hash been registered, and is it still active?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub exists: bool,
    pub active: bool,
    /// The proof id, or 0 when `exists` is false.
    pub id: ProofId,
}

impl Verification {
    pub const NOT_FOUND: Self = Self {
        exists: false,
        active: false,
        id: ProofId(0),
    };

    /// The id, only when the hash was found.
    pub fn found_id(&self) -> Option<ProofId> {
        self.exists.then_some(self.id)
    }
}

/// The effect of a validated mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append `proof` at `id`.
    Register { id: ProofId, proof: Proof },
    /// Clear the active flag of `id`.
    Deactivate {
        id: ProofId,
        caller: Identity,
        timestamp: Timestamp,
    },
    /// Replace the admin.
    TransferAdmin {
        previous: Identity,
        new_admin: Identity,
        timestamp: Timestamp,
    },
}

/// A validated, not yet applied mutation.
///
/// Only the `plan_*` methods of [`Registry`] construct transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    effect: Effect,
    /// `next_id` of the registry the transition was planned against.
    planned_at: u64,
}

impl Transition {
    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    /// The event this transition emits once applied.
    pub fn event(&self) -> RegistryEvent {
        match &self.effect {
            Effect::Register { id, proof } => RegistryEvent::ProofRegistered {
                id: *id,
                submitter: proof.submitter,
                data_hash: proof.data_hash,
                subject: proof.subject.clone(),
                context: proof.context.clone(),
                timestamp: proof.created_at,
            },
            Effect::Deactivate {
                id,
                caller,
                timestamp,
            } => RegistryEvent::ProofDeactivated {
                id: *id,
                caller: *caller,
                timestamp: *timestamp,
            },
            Effect::TransferAdmin {
                previous,
                new_admin,
                timestamp,
            } => RegistryEvent::AdminTransferred {
                previous: *previous,
                new_admin: *new_admin,
                timestamp: *timestamp,
            },
        }
    }
}

/// Persisted form of the registry: everything else is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub admin: Identity,
    /// Proofs in id order.
    pub proofs: Vec<Proof>,
}

/// The proof registry.
#[derive(Debug, Clone)]
pub struct Registry {
    records: Vec<Proof>,
    hash_index: HashMap<DataHash, ProofId>,
    by_owner: HashMap<Identity, Vec<ProofId>>,
    next_id: u64,
    admin: Identity,
    limits: LabelLimits,
}

impl Registry {
    /// Create an empty registry administered by `admin`.
    pub fn new(admin: Identity) -> Result<Self, RegistryError> {
        Self::with_limits(admin, LabelLimits::default())
    }

    /// Create an empty registry with explicit label limits.
    pub fn with_limits(admin: Identity, limits: LabelLimits) -> Result<Self, RegistryError> {
        if admin.is_zero() {
            return Err(RegistryError::InvalidAddress);
        }
        Ok(Self {
            records: Vec::new(),
            hash_index: HashMap::new(),
            by_owner: HashMap::new(),
            next_id: 0,
            admin,
            limits,
        })
    }

    /// Rebuild a registry from a stored snapshot.
    ///
    /// Both indexes are recomputed from the records and the result is
    /// checked against the structural invariants.
    pub fn restore(snapshot: RegistrySnapshot, limits: LabelLimits) -> Result<Self, CoreError> {
        let mut registry = Self::with_limits(snapshot.admin, limits)?;

        for proof in snapshot.proofs {
            let id = ProofId(registry.next_id);
            if let Some(&existing) = registry.hash_index.get(&proof.data_hash) {
                return Err(InvariantViolation::HashIndexMismatch {
                    hash: proof.data_hash,
                    indexed: Some(existing),
                    expected: id,
                }
                .into());
            }
            registry.insert_record(id, proof);
        }

        registry.check_invariants()?;
        Ok(registry)
    }

    /// The persisted form of the current state.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            admin: self.admin,
            proofs: self.records.clone(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register `data_hash` on behalf of `ctx.caller`.
    pub fn register(
        &mut self,
        data_hash: DataHash,
        subject: &str,
        context: &str,
        ctx: &Context,
    ) -> Result<(ProofId, RegistryEvent), RegistryError> {
        let transition = self.plan_register(data_hash, subject, context, ctx)?;
        let id = ProofId(self.next_id);
        Ok((id, self.apply(transition)))
    }

    /// Soft-delete proof `id`. Only its submitter may do this.
    pub fn deactivate(&mut self, id: ProofId, ctx: &Context) -> Result<RegistryEvent, RegistryError> {
        let transition = self.plan_deactivate(id, ctx)?;
        Ok(self.apply(transition))
    }

    /// Hand the admin role to `new_admin`. Only the current admin may do this.
    pub fn transfer_admin(
        &mut self,
        new_admin: Identity,
        ctx: &Context,
    ) -> Result<RegistryEvent, RegistryError> {
        let transition = self.plan_transfer_admin(new_admin, ctx)?;
        Ok(self.apply(transition))
    }

    pub fn plan_register(
        &self,
        data_hash: DataHash,
        subject: &str,
        context: &str,
        ctx: &Context,
    ) -> Result<Transition, RegistryError> {
        if data_hash.is_zero() {
            return Err(RegistryError::InvalidHash);
        }
        if ctx.caller.is_zero() {
            return Err(RegistryError::InvalidAddress);
        }
        self.limits.check(subject, context)?;
        if self.lookup_hash(&data_hash).is_found() {
            return Err(RegistryError::HashAlreadyRegistered(data_hash));
        }

        Ok(self.transition(Effect::Register {
            id: ProofId(self.next_id),
            proof: Proof {
                submitter: ctx.caller,
                data_hash,
                subject: subject.to_owned(),
                context: context.to_owned(),
                created_at: ctx.now,
                is_active: true,
            },
        }))
    }

    pub fn plan_deactivate(&self, id: ProofId, ctx: &Context) -> Result<Transition, RegistryError> {
        let proof = self.get_proof(id).ok_or(RegistryError::NotFound(id))?;
        if !proof.is_submitted_by(&ctx.caller) {
            return Err(RegistryError::Unauthorized { caller: ctx.caller });
        }
        if !proof.is_active {
            return Err(RegistryError::AlreadyInactive(id));
        }

        Ok(self.transition(Effect::Deactivate {
            id,
            caller: ctx.caller,
            timestamp: ctx.now,
        }))
    }

    pub fn plan_transfer_admin(
        &self,
        new_admin: Identity,
        ctx: &Context,
    ) -> Result<Transition, RegistryError> {
        if ctx.caller != self.admin {
            return Err(RegistryError::Unauthorized { caller: ctx.caller });
        }
        if new_admin.is_zero() {
            return Err(RegistryError::InvalidAddress);
        }

        Ok(self.transition(Effect::TransferAdmin {
            previous: self.admin,
            new_admin,
            timestamp: ctx.now,
        }))
    }

    /// Apply a transition planned against this registry's current state.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the registry changed since the transition
    /// was planned.
    pub fn apply(&mut self, transition: Transition) -> RegistryEvent {
        debug_assert_eq!(
            transition.planned_at, self.next_id,
            "transition applied to a registry that changed since planning"
        );

        let event = transition.event();
        match transition.effect {
            Effect::Register { id, proof } => self.insert_record(id, proof),
            Effect::Deactivate { id, .. } => {
                if let Some(proof) = id.index().and_then(|i| self.records.get_mut(i)) {
                    proof.is_active = false;
                }
            }
            Effect::TransferAdmin { new_admin, .. } => self.admin = new_admin,
        }
        event
    }

    fn transition(&self, effect: Effect) -> Transition {
        Transition {
            effect,
            planned_at: self.next_id,
        }
    }

    fn insert_record(&mut self, id: ProofId, proof: Proof) {
        debug_assert_eq!(id.0, self.next_id);
        self.hash_index.insert(proof.data_hash, id);
        self.by_owner.entry(proof.submitter).or_default().push(id);
        self.records.push(proof);
        self.next_id += 1;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up which proof, if any, registered `data_hash`.
    pub fn lookup_hash(&self, data_hash: &DataHash) -> HashLookup {
        match self.hash_index.get(data_hash) {
            Some(&id) => HashLookup::Found(id),
            None => HashLookup::NotFound,
        }
    }

    /// Check whether `data_hash` is registered and still active.
    pub fn verify_hash(&self, data_hash: &DataHash) -> Verification {
        let id = match self.lookup_hash(data_hash) {
            HashLookup::Found(id) => id,
            HashLookup::NotFound => return Verification::NOT_FOUND,
        };

        match self.get_proof(id) {
            Some(proof) if proof.data_hash == *data_hash => Verification {
                exists: true,
                active: proof.is_active,
                id,
            },
            Some(proof) => Verification {
                exists: false,
                active: proof.is_active,
                id,
            },
            None => Verification::NOT_FOUND,
        }
    }

    /// Ids of every proof registered by `submitter`, oldest first.
    pub fn list_by_submitter(&self, submitter: &Identity) -> Vec<ProofId> {
        self.by_owner.get(submitter).cloned().unwrap_or_default()
    }

    /// Proofs registered by `submitter`, oldest first.
    pub fn proofs_by_submitter(&self, submitter: &Identity) -> Vec<(ProofId, Proof)> {
        self.by_owner
            .get(submitter)
            .into_iter()
            .flatten()
            .filter_map(|&id| self.get_proof(id).map(|p| (id, p.clone())))
            .collect()
    }

    pub fn get_proof(&self, id: ProofId) -> Option<&Proof> {
        id.index().and_then(|i| self.records.get(i))
    }

    /// Number of proofs ever registered.
    pub fn total_records(&self) -> u64 {
        self.next_id
    }

    pub fn admin(&self) -> Identity {
        self.admin
    }

    pub fn limits(&self) -> &LabelLimits {
        &self.limits
    }

    /// Verify the structural invariants over the current state.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        check_tables(&self.records, self.next_id, &self.hash_index, &self.by_owner)
    }
}
