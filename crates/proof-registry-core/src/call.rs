//! Signed calls: how a host authenticates the caller of a mutation.
//!
//! A [`SignedCall`] binds a [`Call`] to the identity that signed it and to
//! the event-log position it was signed against. The signed message is
//! `CALL_DOMAIN || base_seq (u64 big-endian) || canonical_bytes(call)`.
//!
//! Every committed call appends an event, so a signature is good for one
//! log position only and cannot be replayed once the log has moved on.

use crate::canonical;
use crate::crypto::{Identity, Keypair, Signature};
use crate::error::CoreError;
use crate::types::{DataHash, ProofId};

/// Domain separation prefix for call signatures.
pub const CALL_DOMAIN: &[u8] = b"proof-registry/call/v1\x00";

/// A mutating registry operation, without its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Register {
        data_hash: DataHash,
        subject: String,
        context: String,
    },
    Deactivate {
        id: ProofId,
    },
    TransferAdmin {
        new_admin: Identity,
    },
}

impl Call {
    /// Deterministic CBOR encoding.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical::call_bytes(self)
    }

    /// Parse a call from its canonical encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        canonical::decode_call(bytes)
    }

    /// The exact bytes a signer signs for this call at `base_seq`.
    pub fn signing_message(&self, base_seq: u64) -> Vec<u8> {
        let mut msg = CALL_DOMAIN.to_vec();
        msg.extend_from_slice(&base_seq.to_be_bytes());
        msg.extend_from_slice(&self.canonical_bytes());
        msg
    }
}

/// A call plus the signature of the identity making it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCall {
    pub signer: Identity,
    /// Seq of the last event the signer saw (0 for an empty log).
    pub base_seq: u64,
    pub call: Call,
    pub signature: Signature,
}

impl SignedCall {
    /// Sign `call` with `keypair` against log position `base_seq`.
    pub fn sign(keypair: &Keypair, base_seq: u64, call: Call) -> Self {
        let signature = keypair.sign(&call.signing_message(base_seq));
        Self {
            signer: keypair.identity(),
            base_seq,
            call,
            signature,
        }
    }

    /// Check the signature and return the authenticated caller.
    ///
    /// This does not check `base_seq` against any log; the host does that.
    pub fn verify(&self) -> Result<Identity, CoreError> {
        self.signer
            .verify(&self.call.signing_message(self.base_seq), &self.signature)?;
        Ok(self.signer)
    }
}
