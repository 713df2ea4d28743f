//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use proof_registry::{FixedClock, RegistryConfig, RegistryService};
use proof_registry_core::{
    Call, Context, DataHash, EventRecord, Identity, Keypair, Proof, ProofId, RegistrySnapshot,
    SignedCall, Timestamp, Transition,
};
use proof_registry_store::{MemoryStore, Store, StoreError};

/// Start time used by every fixture clock: 2025-01-14T16:00:00Z.
pub const T0: Timestamp = 1_736_870_400_000;

/// A deterministic keypair for party `n`.
pub fn party(n: u8) -> Keypair {
    let mut seed = [0u8; 32];
    seed[0] = n;
    seed[31] = 0x5a;
    Keypair::from_seed(&seed)
}

/// Create multiple keypairs for multi-party tests.
pub fn multi_party(count: u8) -> Vec<Keypair> {
    (1..=count).map(party).collect()
}

/// A non-zero hash with every byte set to `n`.
///
/// # Panics
///
/// Panics if `n` is zero.
pub fn hash(n: u8) -> DataHash {
    assert_ne!(n, 0, "the all-zero hash is reserved");
    DataHash::from_bytes([n; 32])
}

/// A registry service over a store, with a fixed clock and a known admin.
pub struct TestFixture<S: Store = MemoryStore> {
    pub admin: Keypair,
    pub service: RegistryService<S, FixedClock>,
}

impl TestFixture<MemoryStore> {
    /// A fresh in-memory registry administered by `party(0)`.
    pub async fn new() -> Self {
        Self::with_store(MemoryStore::new()).await
    }
}

impl<S: Store + 'static> TestFixture<S> {
    /// Open a service over `store` administered by `party(0)`.
    ///
    /// # Panics
    ///
    /// Panics if the store cannot be opened.
    pub async fn with_store(store: S) -> Self {
        let admin = party(0);
        let service = RegistryService::open_with_clock(
            store,
            RegistryConfig::new(admin.identity()),
            FixedClock::new(T0),
        )
        .await
        .expect("open registry service");

        Self { admin, service }
    }

    /// A context for `who` at the fixture's current time.
    pub fn ctx(&self, who: &Keypair) -> Context {
        self.service.context_for(who.identity())
    }

    /// Move the fixture clock forward.
    pub fn advance(&self, millis: i64) {
        self.service.clock().advance(millis);
    }

    /// Sign `call` as `who` against the service's current log head.
    pub async fn signed(&self, who: &Keypair, call: Call) -> SignedCall {
        SignedCall::sign(who, self.service.head_seq().await, call)
    }

    /// Register `hash(n)` as `who` with a subject derived from `n`.
    ///
    /// # Panics
    ///
    /// Panics if the registration is rejected.
    pub async fn register(&self, who: &Keypair, n: u8) -> ProofId {
        self.service
            .register(hash(n), &format!("doc-{n}"), "", &self.ctx(who))
            .await
            .expect("register")
    }
}

/// A store wrapper whose commits can be made to fail on demand.
pub struct FaultyStore<S> {
    inner: S,
    fail_commits: AtomicBool,
}

impl<S: Store> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_commits: AtomicBool::new(false),
        }
    }

    /// Make every following commit fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.fail_commits.store(failing, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: Store> Store for FaultyStore<S> {
    async fn initialize(&self, admin: &Identity) -> proof_registry_store::Result<()> {
        self.inner.initialize(admin).await
    }

    async fn load_snapshot(&self) -> proof_registry_store::Result<Option<RegistrySnapshot>> {
        self.inner.load_snapshot().await
    }

    async fn commit(&self, transition: &Transition) -> proof_registry_store::Result<u64> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("injected commit failure")));
        }
        self.inner.commit(transition).await
    }

    async fn get_proof(&self, id: ProofId) -> proof_registry_store::Result<Option<Proof>> {
        self.inner.get_proof(id).await
    }

    async fn events_since(&self, after_seq: u64) -> proof_registry_store::Result<Vec<EventRecord>> {
        self.inner.events_since(after_seq).await
    }

    async fn event_count(&self) -> proof_registry_store::Result<u64> {
        self.inner.event_count().await
    }
}
