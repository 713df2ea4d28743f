//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use proof_registry_core::{
    Effect, EventRecord, Identity, Proof, ProofId, RegistrySnapshot, Transition,
};

use crate::error::{Result, StoreError};
use crate::traits::Store;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Current admin; `None` until initialized.
    admin: Option<Identity>,

    /// Proofs in id order.
    proofs: Vec<Proof>,

    /// Event log; `events[i]` has seq `i + 1`.
    events: Vec<EventRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn initialize(&self, admin: &Identity) -> Result<()> {
        let mut inner = self.write()?;
        if inner.admin.is_some() {
            return Err(StoreError::AlreadyInitialized);
        }
        inner.admin = Some(*admin);
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<RegistrySnapshot>> {
        let inner = self.read()?;
        Ok(inner.admin.map(|admin| RegistrySnapshot {
            admin,
            proofs: inner.proofs.clone(),
        }))
    }

    async fn commit(&self, transition: &Transition) -> Result<u64> {
        let mut inner = self.write()?;
        if inner.admin.is_none() {
            return Err(StoreError::NotInitialized);
        }

        // Validate everything before touching state.
        match transition.effect() {
            Effect::Register { id, .. } => {
                let expected = ProofId(inner.proofs.len() as u64);
                if *id != expected {
                    return Err(StoreError::Conflict { expected, got: *id });
                }
            }
            Effect::Deactivate { id, .. } => {
                let active = inner.proofs.get(id.0 as usize).map(|p| p.is_active);
                if active != Some(true) {
                    return Err(StoreError::InvalidData(format!(
                        "cannot deactivate proof {}",
                        id
                    )));
                }
            }
            Effect::TransferAdmin { .. } => {}
        }

        match transition.effect() {
            Effect::Register { proof, .. } => inner.proofs.push(proof.clone()),
            Effect::Deactivate { id, .. } => {
                if let Some(proof) = inner.proofs.get_mut(id.0 as usize) {
                    proof.is_active = false;
                }
            }
            Effect::TransferAdmin { new_admin, .. } => inner.admin = Some(*new_admin),
        }

        let seq = inner.events.len() as u64 + 1;
        inner.events.push(EventRecord {
            seq,
            event: transition.event(),
        });

        Ok(seq)
    }

    async fn get_proof(&self, id: ProofId) -> Result<Option<Proof>> {
        let inner = self.read()?;
        Ok(usize::try_from(id.0)
            .ok()
            .and_then(|i| inner.proofs.get(i))
            .cloned())
    }

    async fn events_since(&self, after_seq: u64) -> Result<Vec<EventRecord>> {
        let inner = self.read()?;
        let start = usize::try_from(after_seq).unwrap_or(usize::MAX);
        Ok(inner.events.iter().skip(start).cloned().collect())
    }

    async fn event_count(&self) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.events.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;
    use proof_registry_core::{Context, DataHash, Registry, RegistryEvent};

    fn admin() -> Identity {
        Identity::from_bytes([0xad; 32])
    }

    fn ctx(b: u8) -> Context {
        Context::new(Identity::from_bytes([b; 32]), 1_000)
    }

    #[tokio::test]
    async fn test_memory_store_commit_and_load() {
        let store = MemoryStore::new();
        let snapshot = store.load_or_initialize(&admin()).await.unwrap();
        assert!(snapshot.proofs.is_empty());

        let mut registry = Registry::new(admin()).unwrap();
        let t = registry
            .plan_register(DataHash::from_bytes([0xaa; 32]), "doc1", "", &ctx(1))
            .unwrap();
        assert_eq!(store.commit(&t).await.unwrap(), 1);
        registry.apply(t);

        let t = registry.plan_deactivate(ProofId(0), &ctx(1)).unwrap();
        assert_eq!(store.commit(&t).await.unwrap(), 2);
        registry.apply(t);

        let loaded = store.load_snapshot().await.unwrap().unwrap();
        assert_eq!(loaded, registry.snapshot());
        assert_eq!(store.event_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_memory_store_rejects_out_of_order_register() {
        let store = MemoryStore::new();
        store.initialize(&admin()).await.unwrap();

        let mut registry = Registry::new(admin()).unwrap();
        registry
            .register(DataHash::from_bytes([0x01; 32]), "a", "", &ctx(1))
            .unwrap();
        // Planned against id 1, but the store holds nothing yet.
        let t = registry
            .plan_register(DataHash::from_bytes([0x02; 32]), "b", "", &ctx(1))
            .unwrap();

        assert!(matches!(
            store.commit(&t).await,
            Err(StoreError::Conflict { expected: ProofId(0), got: ProofId(1) })
        ));
        assert_eq!(store.event_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_store_initialize_twice() {
        let store = MemoryStore::new();
        store.initialize(&admin()).await.unwrap();
        assert!(matches!(
            store.initialize(&admin()).await,
            Err(StoreError::AlreadyInitialized)
        ));
    }

    #[tokio::test]
    async fn test_memory_store_events_since() {
        let store = MemoryStore::new();
        store.initialize(&admin()).await.unwrap();
        let mut registry = Registry::new(admin()).unwrap();

        for b in 1..=3u8 {
            let t = registry
                .plan_register(DataHash::from_bytes([b; 32]), "x", "", &ctx(b))
                .unwrap();
            store.commit(&t).await.unwrap();
            registry.apply(t);
        }

        let events = store.events_since(1).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].seq, 2);
        assert!(matches!(
            events[1].event,
            RegistryEvent::ProofRegistered { id: ProofId(2), .. }
        ));
        assert!(store.events_since(3).await.unwrap().is_empty());
    }
}
