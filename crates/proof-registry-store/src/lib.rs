//! # Proof Registry Store
//!
//! Storage abstraction for the proof registry. Provides a trait-based
//! interface for registry persistence with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The store abstracts persistence behind the [`Store`] trait, allowing the
//! registry service to be storage-agnostic. The primary implementation is
//! [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`StoreExt`] - Load-or-initialize helper
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use proof_registry_store::{SqliteStore, Store, StoreExt};
//! use proof_registry_core::Keypair;
//!
//! async fn example() {
//!     let store = SqliteStore::open("registry.db").unwrap();
//!     let admin = Keypair::generate().identity();
//!
//!     // Fresh stores get an admin; existing ones keep theirs.
//!     let snapshot = store.load_or_initialize(&admin).await.unwrap();
//!     println!("{} proofs on record", snapshot.proofs.len());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic commits**: a transition and its event are written in one
//!   transaction
//! - **Dense ids**: registrations must arrive in id order
//! - **Versioned schema**: see [`migration`]

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Store, StoreExt};
