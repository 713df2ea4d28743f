//! The registry service: hosts a [`Registry`] over a [`Store`].
//!
//! The service provides what the pure registry expects from its host:
//! serialized all-or-nothing execution, an execution context for signed
//! calls, and an append-only event log with live subscription.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use proof_registry_core::{
    Call, Context, DataHash, EventRecord, Identity, LabelLimits, Proof, ProofId, Registry,
    RegistryError, RegistrySnapshot, SignedCall, Transition, Verification,
};
use proof_registry_store::{Store, StoreExt};

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, ServiceError};

/// Configuration for the registry service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Admin written into a fresh store. Ignored when the store already
    /// holds a registry.
    pub initial_admin: Identity,
    /// Label size limits for new registrations.
    pub limits: LabelLimits,
    /// Capacity of the live event channel.
    pub event_buffer: usize,
}

impl RegistryConfig {
    pub fn new(initial_admin: Identity) -> Self {
        Self {
            initial_admin,
            limits: LabelLimits::default(),
            event_buffer: 256,
        }
    }
}

/// What a dispatched [`SignedCall`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Registered(ProofId),
    Deactivated(ProofId),
    AdminTransferred(Identity),
}

/// The registry together with the seq of the last event it reflects.
struct Ledger {
    registry: Registry,
    head: u64,
}

/// The main service struct.
///
/// Provides a unified API for:
/// - Registering, deactivating and verifying proofs
/// - Enumerating proofs by submitter
/// - Transferring the admin role
/// - Following the event log
///
/// # Execution model
///
/// A mutation takes the registry write lock and plans against the current
/// state. Persisting and applying the plan then runs on its own task that
/// owns the lock, so it finishes even if the calling future is dropped.
/// At most one mutation commits at a time and readers never see a partial
/// write. If the store rejects a commit the in-memory registry is left as
/// it was.
pub struct RegistryService<S: Store, C: Clock = SystemClock> {
    /// The storage backend.
    store: Arc<S>,
    /// In-memory registry, restored from the store.
    ledger: Arc<RwLock<Ledger>>,
    /// Time source for signed calls.
    clock: C,
    /// Live event feed.
    events: broadcast::Sender<EventRecord>,
}

impl<S: Store + 'static> RegistryService<S, SystemClock> {
    /// Open a service over `store` using wall-clock time.
    pub async fn open(store: S, config: RegistryConfig) -> Result<Self> {
        Self::open_with_clock(store, config, SystemClock).await
    }
}

impl<S: Store + 'static, C: Clock> RegistryService<S, C> {
    /// Open a service over `store` with an explicit clock.
    ///
    /// A fresh store is initialized with `config.initial_admin`. An existing
    /// one is restored and checked against the registry invariants.
    pub async fn open_with_clock(store: S, config: RegistryConfig, clock: C) -> Result<Self> {
        let snapshot = store.load_or_initialize(&config.initial_admin).await?;
        let registry = Registry::restore(snapshot, config.limits)?;
        let head = store.event_count().await?;

        tracing::info!(
            proofs = registry.total_records(),
            admin = %registry.admin(),
            head,
            "registry opened"
        );

        let (events, _) = broadcast::channel(config.event_buffer.max(1));

        Ok(Self {
            store: Arc::new(store),
            ledger: Arc::new(RwLock::new(Ledger { registry, head })),
            clock,
            events,
        })
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// A context for `caller` stamped with the service clock.
    pub fn context_for(&self, caller: Identity) -> Context {
        Context::new(caller, self.clock.now())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register `data_hash` with its labels on behalf of `ctx.caller`.
    pub async fn register(
        &self,
        data_hash: DataHash,
        subject: &str,
        context: &str,
        ctx: &Context,
    ) -> Result<ProofId> {
        self.register_at(None, data_hash, subject, context, ctx)
            .await
    }

    /// Soft-delete proof `id`. Only its submitter may do this.
    pub async fn deactivate(&self, id: ProofId, ctx: &Context) -> Result<()> {
        self.deactivate_at(None, id, ctx).await
    }

    /// Hand the admin role to `new_admin`. Only the current admin may do this.
    pub async fn transfer_admin(&self, new_admin: Identity, ctx: &Context) -> Result<()> {
        self.transfer_admin_at(None, new_admin, ctx).await
    }

    /// Authenticate a signed call and run it as its signer.
    ///
    /// The call must have been signed against the current log head; see
    /// [`head_seq`](Self::head_seq). Anything else is refused as stale.
    pub async fn dispatch(&self, signed: &SignedCall) -> Result<CallOutcome> {
        let caller = signed.verify().map_err(|e| {
            tracing::warn!(signer = %signed.signer, error = %e, "rejected signed call");
            e
        })?;
        let ctx = self.context_for(caller);
        let base = Some(signed.base_seq);

        match &signed.call {
            Call::Register {
                data_hash,
                subject,
                context,
            } => self
                .register_at(base, *data_hash, subject, context, &ctx)
                .await
                .map(CallOutcome::Registered),
            Call::Deactivate { id } => self
                .deactivate_at(base, *id, &ctx)
                .await
                .map(|()| CallOutcome::Deactivated(*id)),
            Call::TransferAdmin { new_admin } => self
                .transfer_admin_at(base, *new_admin, &ctx)
                .await
                .map(|()| CallOutcome::AdminTransferred(*new_admin)),
        }
    }

    async fn register_at(
        &self,
        base_seq: Option<u64>,
        data_hash: DataHash,
        subject: &str,
        context: &str,
        ctx: &Context,
    ) -> Result<ProofId> {
        let record = self
            .execute(base_seq, |reg| {
                reg.plan_register(data_hash, subject, context, ctx)
            })
            .await?;

        let id = record.event.proof_id().unwrap_or_default();
        tracing::info!(
            id = %id,
            submitter = %ctx.caller,
            hash = %data_hash,
            seq = record.seq,
            "proof registered"
        );
        Ok(id)
    }

    async fn deactivate_at(&self, base_seq: Option<u64>, id: ProofId, ctx: &Context) -> Result<()> {
        let record = self
            .execute(base_seq, |reg| reg.plan_deactivate(id, ctx))
            .await?;
        tracing::info!(id = %id, caller = %ctx.caller, seq = record.seq, "proof deactivated");
        Ok(())
    }

    async fn transfer_admin_at(
        &self,
        base_seq: Option<u64>,
        new_admin: Identity,
        ctx: &Context,
    ) -> Result<()> {
        let record = self
            .execute(base_seq, |reg| reg.plan_transfer_admin(new_admin, ctx))
            .await?;
        tracing::info!(
            previous = %ctx.caller,
            new_admin = %new_admin,
            seq = record.seq,
            "admin transferred"
        );
        Ok(())
    }

    /// Plan against the current state, then persist, apply and publish.
    ///
    /// Dropping the returned future after planning does not stop the commit.
    async fn execute<F>(&self, base_seq: Option<u64>, plan: F) -> Result<EventRecord>
    where
        F: FnOnce(&Registry) -> std::result::Result<Transition, RegistryError>,
    {
        let mut ledger = Arc::clone(&self.ledger).write_owned().await;

        if let Some(base_seq) = base_seq {
            if base_seq != ledger.head {
                tracing::warn!(base_seq, head = ledger.head, "stale signed call");
                return Err(ServiceError::StaleCall {
                    base_seq,
                    head: ledger.head,
                });
            }
        }

        let transition = plan(&ledger.registry).map_err(|e| {
            tracing::debug!(error = %e, "operation rejected");
            e
        })?;

        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        let commit = tokio::spawn(async move {
            let seq = store.commit(&transition).await?;
            let event = ledger.registry.apply(transition);
            ledger.head = seq;
            drop(ledger);

            let record = EventRecord { seq, event };
            // Sending only fails when nobody is subscribed.
            let _ = events.send(record.clone());
            Ok::<_, ServiceError>(record)
        });

        commit
            .await
            .map_err(|e| ServiceError::Task(e.to_string()))?
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Check whether `data_hash` is registered and still active.
    pub async fn verify_hash(&self, data_hash: &DataHash) -> Verification {
        self.ledger.read().await.registry.verify_hash(data_hash)
    }

    /// Ids of every proof registered by `submitter`, oldest first.
    pub async fn list_by_submitter(&self, submitter: &Identity) -> Vec<ProofId> {
        self.ledger.read().await.registry.list_by_submitter(submitter)
    }

    /// Proofs registered by `submitter`, oldest first.
    pub async fn proofs_by_submitter(&self, submitter: &Identity) -> Vec<(ProofId, Proof)> {
        self.ledger.read().await.registry.proofs_by_submitter(submitter)
    }

    pub async fn get_proof(&self, id: ProofId) -> Option<Proof> {
        self.ledger.read().await.registry.get_proof(id).cloned()
    }

    /// Number of proofs ever registered.
    pub async fn total_records(&self) -> u64 {
        self.ledger.read().await.registry.total_records()
    }

    pub async fn admin(&self) -> Identity {
        self.ledger.read().await.registry.admin()
    }

    /// A consistent copy of the whole registry state.
    pub async fn snapshot(&self) -> RegistrySnapshot {
        self.ledger.read().await.registry.snapshot()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────────

    /// Seq of the last committed event, 0 for an empty log.
    ///
    /// Signed calls are signed against this value.
    pub async fn head_seq(&self) -> u64 {
        self.ledger.read().await.head
    }

    /// Persisted events with `seq > after_seq`.
    pub async fn events_since(&self, after_seq: u64) -> Result<Vec<EventRecord>> {
        Ok(self.store.events_since(after_seq).await?)
    }

    /// Receive events as they are committed.
    ///
    /// Slow receivers may lag; use [`events_since`](Self::events_since) to
    /// catch up from the last seq they saw.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.events.subscribe()
    }
}
