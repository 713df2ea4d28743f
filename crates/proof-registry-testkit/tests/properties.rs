//! Property tests: the registry against a reference model.
//!
//! Each workload is run against a [`Registry`] and a plain list model. After
//! every step the two must agree and the registry's own invariant check
//! must pass.

use proptest::prelude::*;

use proof_registry_core::{
    DataHash, Identity, LabelLimits, Proof, ProofId, Registry, RegistryError, RegistryEvent,
};
use proof_registry_testkit::generators::{ops, run_op, Op, PARTIES};
use proof_registry_testkit::{party, T0};

#[derive(Debug, Clone, PartialEq)]
struct ModelProof {
    submitter: Identity,
    hash: DataHash,
    subject: String,
    created_at: i64,
    active: bool,
}

#[derive(Debug)]
struct Model {
    admin: Identity,
    proofs: Vec<ModelProof>,
}

impl Model {
    fn new() -> Self {
        Self {
            admin: party(0).identity(),
            proofs: Vec::new(),
        }
    }

    /// The outcome the model predicts for `op`, applying it if it succeeds.
    fn step(&mut self, op: &Op, now: i64) -> Result<(), RegistryError> {
        match op {
            Op::Register {
                caller,
                hash,
                subject,
            } => {
                let hash = DataHash::from_bytes([*hash; 32]);
                if self.proofs.iter().any(|p| p.hash == hash) {
                    return Err(RegistryError::HashAlreadyRegistered(hash));
                }
                self.proofs.push(ModelProof {
                    submitter: party(*caller).identity(),
                    hash,
                    subject: subject.clone(),
                    created_at: now,
                    active: true,
                });
                Ok(())
            }
            Op::Deactivate { caller, slot } => {
                let total = (self.proofs.len() as u64).max(1);
                let id = u64::from(*slot) % total;
                let caller = party(*caller).identity();
                let Some(proof) = self.proofs.get_mut(id as usize) else {
                    return Err(RegistryError::NotFound(ProofId(id)));
                };
                if proof.submitter != caller {
                    return Err(RegistryError::Unauthorized { caller });
                }
                if !proof.active {
                    return Err(RegistryError::AlreadyInactive(ProofId(id)));
                }
                proof.active = false;
                Ok(())
            }
            Op::TransferAdmin { caller, new_admin } => {
                let caller = party(*caller).identity();
                if caller != self.admin {
                    return Err(RegistryError::Unauthorized { caller });
                }
                self.admin = party(*new_admin).identity();
                Ok(())
            }
            Op::RegisterZeroHash { .. } => Err(RegistryError::InvalidHash),
        }
    }
}

fn assert_agrees(registry: &Registry, model: &Model) -> Result<(), TestCaseError> {
    prop_assert!(registry.check_invariants().is_ok());
    prop_assert_eq!(registry.total_records(), model.proofs.len() as u64);
    prop_assert_eq!(registry.admin(), model.admin);

    for (i, expected) in model.proofs.iter().enumerate() {
        let id = ProofId(i as u64);
        let proof = registry.get_proof(id).ok_or_else(|| {
            TestCaseError::fail(format!("proof {id} missing"))
        })?;
        prop_assert_eq!(proof.submitter, expected.submitter);
        prop_assert_eq!(proof.data_hash, expected.hash);
        prop_assert_eq!(&proof.subject, &expected.subject);
        prop_assert_eq!(proof.created_at, expected.created_at);
        prop_assert_eq!(proof.is_active, expected.active);

        let v = registry.verify_hash(&expected.hash);
        prop_assert!(v.exists);
        prop_assert_eq!(v.active, expected.active);
        prop_assert_eq!(v.id, id);
    }

    for n in 0..PARTIES {
        let who = party(n).identity();
        let expected: Vec<ProofId> = model
            .proofs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.submitter == who)
            .map(|(i, _)| ProofId(i as u64))
            .collect();
        prop_assert_eq!(registry.list_by_submitter(&who), expected);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn registry_matches_model(workload in ops(64)) {
        let mut registry = Registry::new(party(0).identity()).unwrap();
        let mut model = Model::new();

        for (step, op) in workload.iter().enumerate() {
            let now = T0 + step as i64;
            let expected = model.step(op, now);
            let actual = run_op(&mut registry, op, now).map(|_| ());
            prop_assert_eq!(actual, expected, "op {:?}", op);
            assert_agrees(&registry, &model)?;
        }
    }

    #[test]
    fn registered_fields_never_change(workload in ops(64)) {
        let mut registry = Registry::new(party(0).identity()).unwrap();
        let mut seen: Vec<Proof> = Vec::new();

        for (step, op) in workload.iter().enumerate() {
            let _ = run_op(&mut registry, op, T0 + step as i64);

            for (i, before) in seen.iter().enumerate() {
                let now = registry.get_proof(ProofId(i as u64)).unwrap();
                prop_assert_eq!(now.fingerprint(), before.fingerprint());
                // Once inactive, never active again.
                prop_assert!(before.is_active || !now.is_active);
            }
            seen = (0..registry.total_records())
                .filter_map(|i| registry.get_proof(ProofId(i)).cloned())
                .collect();
        }
    }

    #[test]
    fn rejected_ops_change_nothing(workload in ops(48)) {
        let mut registry = Registry::new(party(0).identity()).unwrap();

        for (step, op) in workload.iter().enumerate() {
            let before = registry.snapshot();
            if run_op(&mut registry, op, T0 + step as i64).is_err() {
                prop_assert_eq!(registry.snapshot(), before);
            }
        }
    }

    #[test]
    fn events_describe_their_operation(workload in ops(48)) {
        let mut registry = Registry::new(party(0).identity()).unwrap();

        for (step, op) in workload.iter().enumerate() {
            let now = T0 + step as i64;
            let total_before = registry.total_records();
            let Ok(event) = run_op(&mut registry, op, now) else { continue };

            prop_assert_eq!(event.timestamp(), now);
            match (op, &event) {
                (Op::Register { caller, .. }, RegistryEvent::ProofRegistered { id, submitter, .. }) => {
                    prop_assert_eq!(*id, ProofId(total_before));
                    prop_assert_eq!(*submitter, party(*caller).identity());
                }
                (Op::Deactivate { caller, .. }, RegistryEvent::ProofDeactivated { caller: who, .. }) => {
                    prop_assert_eq!(*who, party(*caller).identity());
                }
                (Op::TransferAdmin { caller, new_admin }, RegistryEvent::AdminTransferred { previous, new_admin: next, .. }) => {
                    prop_assert_eq!(*previous, party(*caller).identity());
                    prop_assert_eq!(*next, party(*new_admin).identity());
                }
                _ => prop_assert!(false, "event {:?} does not match op {:?}", event, op),
            }

            let decoded = RegistryEvent::decode(&event.canonical_bytes()).unwrap();
            prop_assert_eq!(decoded, event);
        }
    }

    #[test]
    fn restore_reproduces_state(workload in ops(48)) {
        let mut registry = Registry::new(party(0).identity()).unwrap();
        for (step, op) in workload.iter().enumerate() {
            let _ = run_op(&mut registry, op, T0 + step as i64);
        }

        let restored = Registry::restore(registry.snapshot(), LabelLimits::default()).unwrap();
        prop_assert_eq!(restored.snapshot(), registry.snapshot());
        prop_assert!(restored.check_invariants().is_ok());
        for n in 0..PARTIES {
            let who = party(n).identity();
            prop_assert_eq!(restored.list_by_submitter(&who), registry.list_by_submitter(&who));
        }
    }
}
