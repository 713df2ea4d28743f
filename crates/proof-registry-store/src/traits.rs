//! Store trait: the abstract interface for registry persistence.
//!
//! This trait allows the registry service to be storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use proof_registry_core::{EventRecord, Identity, Proof, ProofId, RegistrySnapshot, Transition};

use crate::error::{Result, StoreError};

/// The Store trait: async interface for registry persistence.
///
/// The store holds the persisted form of a registry (admin plus proofs in id
/// order) and the append-only event log. It does not enforce registry rules;
/// the registry validates every transition before it reaches `commit`.
///
/// # Design Notes
///
/// - **Atomic commits**: `commit` persists the state change and its event
///   together, or neither.
/// - **Dense ids**: a registration commit must carry the next id in
///   sequence, otherwise it is rejected with `Conflict`.
/// - **Event sequence**: events are numbered from 1 without gaps.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Record the initial admin of a fresh store.
    ///
    /// Fails with `AlreadyInitialized` if the store already holds a registry.
    async fn initialize(&self, admin: &Identity) -> Result<()>;

    /// Load the persisted registry, or `None` for a fresh store.
    async fn load_snapshot(&self) -> Result<Option<RegistrySnapshot>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist a planned transition and append its event.
    ///
    /// Returns the sequence number assigned to the event.
    async fn commit(&self, transition: &Transition) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a persisted proof by id.
    async fn get_proof(&self, id: ProofId) -> Result<Option<Proof>>;

    /// Events with `seq > after_seq`, ordered by seq.
    async fn events_since(&self, after_seq: u64) -> Result<Vec<EventRecord>>;

    /// Number of events in the log.
    async fn event_count(&self) -> Result<u64>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Load the persisted registry, initializing the store with `admin` if
    /// it is fresh.
    fn load_or_initialize(
        &self,
        admin: &Identity,
    ) -> impl std::future::Future<Output = Result<RegistrySnapshot>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn load_or_initialize(&self, admin: &Identity) -> Result<RegistrySnapshot> {
        if let Some(snapshot) = self.load_snapshot().await? {
            return Ok(snapshot);
        }

        self.initialize(admin).await?;
        tracing::info!(admin = %admin, "initialized fresh registry store");

        self.load_snapshot().await?.ok_or(StoreError::NotInitialized)
    }
}
