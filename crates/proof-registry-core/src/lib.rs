//! # Proof Registry Core
//!
//! Pure primitives for the proof registry: proofs, events, signed calls and
//! the registry state machine.
//!
//! This crate contains no I/O, no storage, no networking. Every registry
//! operation is a terminating transition over in-memory tables.
//!
//! ## Key Types
//!
//! - [`Registry`] - The record store and its invariant-preserving operations
//! - [`Proof`] - One registered attestation
//! - [`ProofId`] - Dense sequential identifier
//! - [`DataHash`] - 32-byte content hash
//! - [`Identity`] - Caller identity (Ed25519 public key)
//! - [`RegistryEvent`] - Audit trail entry emitted by every mutation
//!
//! ## Canonicalization
//!
//! Events and calls are encoded using deterministic CBOR. See [`canonical`].

pub mod call;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod event;
pub mod proof;
pub mod registry;
pub mod types;
pub mod validation;

pub use call::{Call, SignedCall, CALL_DOMAIN};
pub use crypto::{Identity, Keypair, Signature};
pub use error::{CoreError, InvariantViolation, RegistryError};
pub use event::{EventKind, EventRecord, RegistryEvent};
pub use proof::Proof;
pub use registry::{
    Context, Effect, HashLookup, Registry, RegistrySnapshot, Transition, Verification,
};
pub use types::{DataHash, ProofId, Timestamp};
pub use validation::LabelLimits;
