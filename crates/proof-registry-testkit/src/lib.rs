//! # Proof Registry Testkit
//!
//! Testing utilities for the proof registry.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: Deterministic parties, hashes and a ready-made service
//! - **Fault injection**: [`FaultyStore`] fails commits on demand
//! - **Generators**: Proptest strategies and a workload runner
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use proof_registry_core::Registry;
//! use proof_registry_testkit::generators::{ops, run_op};
//! use proof_registry_testkit::party;
//!
//! proptest! {
//!     #[test]
//!     fn invariants_hold(workload in ops(64)) {
//!         let mut registry = Registry::new(party(0).identity()).unwrap();
//!         for op in &workload {
//!             let _ = run_op(&mut registry, op, 0);
//!             prop_assert!(registry.check_invariants().is_ok());
//!         }
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use proof_registry_testkit::{party, TestFixture};
//!
//! async fn example() {
//!     let fx = TestFixture::new().await;
//!     let id = fx.register(&party(1), 1).await;
//!     assert_eq!(fx.service.total_records().await, id.get() + 1);
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{hash, multi_party, party, FaultyStore, TestFixture, T0};
pub use generators::{ops, run_op, Op};
