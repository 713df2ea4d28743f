//! # Proof Registry
//!
//! A registry of content-hash attestations: callers register the hash of a
//! piece of data, anyone can check whether a hash is on record, and the
//! submitter can later deactivate it.
//!
//! ## Overview
//!
//! - **Proofs**: Immutable records of (submitter, hash, labels, time)
//! - **Soft delete**: Deactivation only flips `is_active`; records never go away
//! - **Admin**: A single role-holder that can only hand the role on
//! - **Events**: Every mutation appends one event to a sequenced log
//!
//! ## Usage
//!
//! ```rust,no_run
//! use proof_registry::{RegistryConfig, RegistryService};
//! use proof_registry::core::{DataHash, Keypair};
//! use proof_registry::store::SqliteStore;
//!
//! async fn example() {
//!     let admin = Keypair::generate();
//!     let alice = Keypair::generate();
//!
//!     let store = SqliteStore::open("registry.db").unwrap();
//!     let service = RegistryService::open(store, RegistryConfig::new(admin.identity()))
//!         .await
//!         .unwrap();
//!
//!     let ctx = service.context_for(alice.identity());
//!     let hash = DataHash::of(b"contract.pdf contents");
//!     let id = service.register(hash, "contract.pdf", "deal-42", &ctx).await.unwrap();
//!
//!     let v = service.verify_hash(&hash).await;
//!     assert!(v.exists && v.active && v.id == id);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `proof_registry::core` - Registry state machine and primitives
//! - `proof_registry::store` - Storage abstraction and SQLite

pub mod clock;
pub mod error;
pub mod service;

// Re-export component crates
pub use proof_registry_core as core;
pub use proof_registry_store as store;

// Re-export main types for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Result, ServiceError};
pub use service::{CallOutcome, RegistryConfig, RegistryService};

// Re-export commonly used core types
pub use proof_registry_core::{
    Call, Context, DataHash, EventRecord, Identity, Keypair, Proof, ProofId, RegistryError,
    RegistryEvent, SignedCall, Verification,
};
