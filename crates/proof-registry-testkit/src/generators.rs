//! Proptest generators for property-based testing.

use proptest::prelude::*;

use proof_registry_core::{
    Context, DataHash, ProofId, Registry, RegistryError, RegistryEvent, Timestamp,
};

use crate::fixtures::party;

/// Generate a hash that is never all zeros.
pub fn data_hash() -> impl Strategy<Value = DataHash> {
    any::<[u8; 32]>()
        .prop_filter("zero hash", |b| b.iter().any(|&x| x != 0))
        .prop_map(DataHash::from_bytes)
}

/// Generate a short label.
pub fn label() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ._-]{0,24}".prop_map(String::from)
}

/// One step of a generated workload.
///
/// Callers and hashes are drawn from small pools so that duplicates,
/// foreign deactivations and repeated deactivations actually occur.
#[derive(Debug, Clone)]
pub enum Op {
    Register { caller: u8, hash: u8, subject: String },
    /// Deactivate the proof at `slot % total_records`.
    Deactivate { caller: u8, slot: u16 },
    TransferAdmin { caller: u8, new_admin: u8 },
    RegisterZeroHash { caller: u8 },
}

/// Number of parties in the caller pool; party 0 is the initial admin.
pub const PARTIES: u8 = 4;

/// Number of distinct hashes in the hash pool.
pub const HASHES: u8 = 12;

impl Arbitrary for Op {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            6 => (0..PARTIES, 1..=HASHES, label())
                .prop_map(|(caller, hash, subject)| Op::Register { caller, hash, subject }),
            3 => (0..PARTIES, any::<u16>())
                .prop_map(|(caller, slot)| Op::Deactivate { caller, slot }),
            1 => (0..PARTIES, 0..PARTIES)
                .prop_map(|(caller, new_admin)| Op::TransferAdmin { caller, new_admin }),
            1 => (0..PARTIES).prop_map(|caller| Op::RegisterZeroHash { caller }),
        ]
        .boxed()
    }
}

/// Generate a workload of up to `max_len` operations.
pub fn ops(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(any::<Op>(), 0..=max_len)
}

/// Run one generated operation against `registry` at time `now`.
pub fn run_op(
    registry: &mut Registry,
    op: &Op,
    now: Timestamp,
) -> Result<RegistryEvent, RegistryError> {
    match op {
        Op::Register {
            caller,
            hash,
            subject,
        } => {
            let ctx = Context::new(party(*caller).identity(), now);
            registry
                .register(DataHash::from_bytes([*hash; 32]), subject, "", &ctx)
                .map(|(_, event)| event)
        }
        Op::Deactivate { caller, slot } => {
            let ctx = Context::new(party(*caller).identity(), now);
            let total = registry.total_records().max(1);
            registry.deactivate(ProofId(u64::from(*slot) % total), &ctx)
        }
        Op::TransferAdmin { caller, new_admin } => {
            let ctx = Context::new(party(*caller).identity(), now);
            registry.transfer_admin(party(*new_admin).identity(), &ctx)
        }
        Op::RegisterZeroHash { caller } => {
            let ctx = Context::new(party(*caller).identity(), now);
            registry
                .register(DataHash::ZERO, "zero", "", &ctx)
                .map(|(_, event)| event)
        }
    }
}
