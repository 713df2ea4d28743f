//! End-to-end scenarios against the registry service.

use std::sync::Arc;
use std::time::Duration;

use proof_registry::core::{CoreError, Signature};
use proof_registry::store::{MemoryStore, SqliteStore, Store};
use proof_registry::{
    Call, CallOutcome, DataHash, ProofId, RegistryConfig, RegistryError, RegistryEvent,
    RegistryService, ServiceError,
};
use proof_registry_testkit::{hash, party, FaultyStore, TestFixture, T0};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// ─────────────────────────────────────────────────────────────────────────────
// Basic flows
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_then_verify() {
    let fx = TestFixture::new().await;
    let alice = party(1);

    let id = fx
        .service
        .register(hash(0xaa), "doc1", "", &fx.ctx(&alice))
        .await
        .unwrap();
    assert_eq!(id, ProofId(0));

    let v = fx.service.verify_hash(&hash(0xaa)).await;
    assert_eq!((v.exists, v.active, v.id), (true, true, ProofId(0)));

    assert_eq!(v.found_id(), Some(ProofId(0)));

    let v = fx.service.verify_hash(&hash(0xbb)).await;
    assert_eq!((v.exists, v.active, v.id), (false, false, ProofId(0)));
    assert_eq!(v.found_id(), None);
}

#[tokio::test]
async fn owner_deactivates_own_proof() {
    let fx = TestFixture::new().await;
    let (alice, bob) = (party(1), party(2));

    assert_eq!(fx.register(&alice, 0xaa).await, ProofId(0));
    assert_eq!(fx.register(&bob, 0xcc).await, ProofId(1));

    fx.service
        .deactivate(ProofId(1), &fx.ctx(&bob))
        .await
        .unwrap();

    let v = fx.service.verify_hash(&hash(0xcc)).await;
    assert_eq!((v.exists, v.active, v.id), (true, false, ProofId(1)));
    assert!(fx.service.verify_hash(&hash(0xaa)).await.active);
}

#[tokio::test]
async fn duplicate_hash_is_rejected() {
    let fx = TestFixture::new().await;
    let (alice, bob) = (party(1), party(2));
    fx.register(&alice, 0xaa).await;
    fx.register(&alice, 0xcc).await;

    let err = fx
        .service
        .register(hash(0xaa), "again", "", &fx.ctx(&bob))
        .await
        .unwrap_err();
    assert_eq!(
        err.rejection(),
        Some(&RegistryError::HashAlreadyRegistered(hash(0xaa)))
    );
    assert_eq!(fx.service.total_records().await, 2);
    assert!(fx.service.list_by_submitter(&bob.identity()).await.is_empty());
}

#[tokio::test]
async fn non_submitter_cannot_deactivate() {
    let fx = TestFixture::new().await;
    let (alice, mallory) = (party(1), party(3));
    fx.register(&alice, 0xaa).await;

    let err = fx
        .service
        .deactivate(ProofId(0), &fx.ctx(&mallory))
        .await
        .unwrap_err();
    assert_eq!(
        err.rejection(),
        Some(&RegistryError::Unauthorized {
            caller: mallory.identity()
        })
    );
    assert!(fx.service.get_proof(ProofId(0)).await.unwrap().is_active);

    // The admin has no override either.
    let err = fx
        .service
        .deactivate(ProofId(0), &fx.ctx(&fx.admin))
        .await
        .unwrap_err();
    assert!(matches!(
        err.rejection(),
        Some(RegistryError::Unauthorized { .. })
    ));
}

#[tokio::test]
async fn deactivation_is_one_way() {
    let fx = TestFixture::new().await;
    let alice = party(1);
    fx.register(&alice, 0xaa).await;

    fx.service
        .deactivate(ProofId(0), &fx.ctx(&alice))
        .await
        .unwrap();
    let err = fx
        .service
        .deactivate(ProofId(0), &fx.ctx(&alice))
        .await
        .unwrap_err();
    assert_eq!(
        err.rejection(),
        Some(&RegistryError::AlreadyInactive(ProofId(0)))
    );

    // A deactivated hash still blocks re-registration.
    let err = fx
        .service
        .register(hash(0xaa), "doc1", "", &fx.ctx(&alice))
        .await
        .unwrap_err();
    assert!(matches!(
        err.rejection(),
        Some(RegistryError::HashAlreadyRegistered(_))
    ));
}

#[tokio::test]
async fn listing_follows_registration_order() {
    let fx = TestFixture::new().await;
    let (alice, bob) = (party(1), party(2));

    fx.register(&alice, 1).await;
    fx.register(&bob, 2).await;
    fx.register(&alice, 3).await;
    fx.service
        .deactivate(ProofId(2), &fx.ctx(&alice))
        .await
        .unwrap();

    assert_eq!(
        fx.service.list_by_submitter(&alice.identity()).await,
        vec![ProofId(0), ProofId(2)]
    );
    assert_eq!(
        fx.service.list_by_submitter(&bob.identity()).await,
        vec![ProofId(1)]
    );

    let proofs = fx.service.proofs_by_submitter(&alice.identity()).await;
    assert_eq!(proofs.len(), 2);
    assert!(proofs[0].1.is_active);
    assert!(!proofs[1].1.is_active);
}

#[tokio::test]
async fn admin_role_moves_on() {
    let fx = TestFixture::new().await;
    let (alice, bob) = (party(1), party(2));

    let err = fx
        .service
        .transfer_admin(bob.identity(), &fx.ctx(&alice))
        .await
        .unwrap_err();
    assert!(matches!(
        err.rejection(),
        Some(RegistryError::Unauthorized { .. })
    ));

    fx.service
        .transfer_admin(alice.identity(), &fx.ctx(&fx.admin))
        .await
        .unwrap();
    assert_eq!(fx.service.admin().await, alice.identity());

    // The old admin is now an ordinary caller.
    let err = fx
        .service
        .transfer_admin(fx.admin.identity(), &fx.ctx(&fx.admin))
        .await
        .unwrap_err();
    assert!(err.rejection().is_some());
}

#[tokio::test]
async fn oversized_labels_are_rejected() {
    let fx = TestFixture::new().await;
    let subject = "x".repeat(257);

    let err = fx
        .service
        .register(hash(1), &subject, "", &fx.ctx(&party(1)))
        .await
        .unwrap_err();
    assert!(matches!(
        err.rejection(),
        Some(RegistryError::LabelTooLong { field: "subject", .. })
    ));
    assert_eq!(fx.service.total_records().await, 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn event_log_is_sequenced() {
    let fx = TestFixture::new().await;
    let alice = party(1);

    fx.register(&alice, 0xaa).await;
    fx.advance(5_000);
    fx.service
        .deactivate(ProofId(0), &fx.ctx(&alice))
        .await
        .unwrap();
    // Rejections leave no trace in the log.
    let _ = fx.service.deactivate(ProofId(0), &fx.ctx(&alice)).await;

    let events = fx.service.events_since(0).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].seq, 1);
    assert_eq!(events[1].seq, 2);
    assert_eq!(
        events[1].event,
        RegistryEvent::ProofDeactivated {
            id: ProofId(0),
            caller: alice.identity(),
            timestamp: T0 + 5_000,
        }
    );

    assert_eq!(fx.service.events_since(1).await.unwrap().len(), 1);
    assert!(fx.service.events_since(2).await.unwrap().is_empty());
}

#[tokio::test]
async fn subscribers_receive_committed_events() {
    let fx = TestFixture::new().await;
    let mut rx = fx.service.subscribe();
    let alice = party(1);

    fx.service
        .register(hash(0xaa), "doc1", "case-9", &fx.ctx(&alice))
        .await
        .unwrap();
    let _ = fx
        .service
        .register(DataHash::ZERO, "nope", "", &fx.ctx(&alice))
        .await;

    let record = rx.recv().await.unwrap();
    assert_eq!(record.seq, 1);
    assert_eq!(
        record.event,
        RegistryEvent::ProofRegistered {
            id: ProofId(0),
            submitter: alice.identity(),
            data_hash: hash(0xaa),
            subject: "doc1".into(),
            context: "case-9".into(),
            timestamp: T0,
        }
    );
    assert!(rx.try_recv().is_err());
}

// ─────────────────────────────────────────────────────────────────────────────
// Signed calls
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn signed_calls_run_as_signer() {
    let fx = TestFixture::new().await;
    let alice = party(1);

    let register = fx
        .signed(
            &alice,
            Call::Register {
                data_hash: hash(0xaa),
                subject: "doc1".into(),
                context: String::new(),
            },
        )
        .await;
    assert_eq!(
        fx.service.dispatch(&register).await.unwrap(),
        CallOutcome::Registered(ProofId(0))
    );
    assert_eq!(
        fx.service.get_proof(ProofId(0)).await.unwrap().submitter,
        alice.identity()
    );

    let transfer = fx
        .signed(
            &fx.admin,
            Call::TransferAdmin {
                new_admin: alice.identity(),
            },
        )
        .await;
    assert_eq!(
        fx.service.dispatch(&transfer).await.unwrap(),
        CallOutcome::AdminTransferred(alice.identity())
    );
    assert_eq!(fx.service.head_seq().await, 2);
}

#[tokio::test]
async fn forged_calls_are_refused() {
    let fx = TestFixture::new().await;
    let (alice, mallory) = (party(1), party(3));
    fx.register(&alice, 0xaa).await;

    // Mallory signs, but claims to be Alice.
    let mut forged = fx.signed(&mallory, Call::Deactivate { id: ProofId(0) }).await;
    forged.signer = alice.identity();
    let err = fx.service.dispatch(&forged).await.unwrap_err();
    assert!(matches!(err, ServiceError::Core(CoreError::InvalidSignature)));

    // A valid signature over a different call does not carry over.
    let mut tampered = fx.signed(&alice, Call::Deactivate { id: ProofId(1) }).await;
    tampered.call = Call::Deactivate { id: ProofId(0) };
    assert!(fx.service.dispatch(&tampered).await.is_err());

    let mut blank = fx.signed(&alice, Call::Deactivate { id: ProofId(0) }).await;
    blank.signature = Signature([0u8; 64]);
    assert!(fx.service.dispatch(&blank).await.is_err());

    assert!(fx.service.verify_hash(&hash(0xaa)).await.active);
    assert_eq!(fx.service.store().event_count().await.unwrap(), 1);
}

#[tokio::test]
async fn replayed_admin_transfer_is_refused() {
    let fx = TestFixture::new().await;
    let (a, b) = (fx.admin.clone(), party(2));

    let a_to_b = fx
        .signed(&a, Call::TransferAdmin { new_admin: b.identity() })
        .await;
    fx.service.dispatch(&a_to_b).await.unwrap();

    let b_to_a = fx
        .signed(&b, Call::TransferAdmin { new_admin: a.identity() })
        .await;
    fx.service.dispatch(&b_to_a).await.unwrap();
    assert_eq!(fx.service.admin().await, a.identity());

    // Someone holding A's old signature submits it again.
    let err = fx.service.dispatch(&a_to_b).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::StaleCall { base_seq: 0, head: 2 }
    ));
    assert_eq!(fx.service.admin().await, a.identity());
    assert_eq!(fx.service.head_seq().await, 2);
}

#[tokio::test]
async fn signed_call_is_good_for_one_log_position() {
    let fx = TestFixture::new().await;
    let alice = party(1);
    let call = Call::Register {
        data_hash: hash(0xaa),
        subject: "doc1".into(),
        context: String::new(),
    };

    // Signed before anything happened, submitted after the log moved on.
    let early = fx.signed(&alice, call.clone()).await;
    fx.register(&alice, 0xbb).await;
    assert!(matches!(
        fx.service.dispatch(&early).await,
        Err(ServiceError::StaleCall { base_seq: 0, head: 1 })
    ));
    assert!(!fx.service.verify_hash(&hash(0xaa)).await.exists);

    // Re-signing against the new head goes through.
    let fresh = fx.signed(&alice, call).await;
    assert_eq!(fresh.base_seq, 1);
    assert_eq!(
        fx.service.dispatch(&fresh).await.unwrap(),
        CallOutcome::Registered(ProofId(1))
    );

    // And cannot be submitted twice.
    assert!(matches!(
        fx.service.dispatch(&fresh).await,
        Err(ServiceError::StaleCall { .. })
    ));
    assert_eq!(fx.service.total_records().await, 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_commit_leaves_state_untouched() {
    init_tracing();
    let fx = TestFixture::with_store(FaultyStore::new(MemoryStore::new())).await;
    let alice = party(1);
    fx.register(&alice, 0xaa).await;

    let before = fx.service.snapshot().await;
    fx.service.store().set_failing(true);

    let err = fx
        .service
        .register(hash(0xbb), "doc2", "", &fx.ctx(&alice))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Store(_)));
    assert!(err.rejection().is_none());

    let err = fx
        .service
        .deactivate(ProofId(0), &fx.ctx(&alice))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Store(_)));

    assert_eq!(fx.service.snapshot().await, before);
    assert!(!fx.service.verify_hash(&hash(0xbb)).await.exists);

    // Once the store recovers the next id is still dense.
    fx.service.store().set_failing(false);
    assert_eq!(fx.register(&alice, 0xbb).await, ProofId(1));
    assert_eq!(fx.service.store().inner().event_count().await.unwrap(), 2);
}

#[tokio::test]
async fn dropped_mutation_still_lands() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("registry.db")).unwrap();
    let fx = TestFixture::with_store(store).await;
    let alice = party(1);

    // Poll the registration once, then give up on it while the store works.
    let ctx = fx.ctx(&alice);
    let attempt = fx.service.register(hash(1), "doc-1", "", &ctx);
    let _ = tokio::time::timeout(Duration::ZERO, attempt).await;

    // Reads wait for the commit to finish, then memory matches the store.
    assert_eq!(fx.service.total_records().await, 1);
    assert_eq!(fx.service.store().event_count().await.unwrap(), 1);
    assert_eq!(fx.service.head_seq().await, 1);
    assert_eq!(fx.service.verify_hash(&hash(1)).await.found_id(), Some(ProofId(0)));

    // Later calls see no id conflict.
    assert_eq!(fx.register(&alice, 2).await, ProofId(1));
    let err = fx
        .service
        .register(hash(1), "doc-1", "", &fx.ctx(&alice))
        .await
        .unwrap_err();
    assert!(matches!(
        err.rejection(),
        Some(RegistryError::HashAlreadyRegistered(_))
    ));
    assert_eq!(fx.service.store().event_count().await.unwrap(), 2);
}

#[tokio::test]
async fn sqlite_state_survives_reopen() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");
    let (admin, alice, bob) = (party(0), party(1), party(2));

    {
        let service = RegistryService::open(
            SqliteStore::open(&path).unwrap(),
            RegistryConfig::new(admin.identity()),
        )
        .await
        .unwrap();

        let ctx = service.context_for(alice.identity());
        service.register(hash(1), "a", "x", &ctx).await.unwrap();
        service.register(hash(2), "b", "", &ctx).await.unwrap();
        service.deactivate(ProofId(0), &ctx).await.unwrap();
        service
            .transfer_admin(bob.identity(), &service.context_for(admin.identity()))
            .await
            .unwrap();
    }

    // The configured admin only applies to fresh stores.
    let service = RegistryService::open(
        SqliteStore::open(&path).unwrap(),
        RegistryConfig::new(party(9).identity()),
    )
    .await
    .unwrap();

    assert_eq!(service.admin().await, bob.identity());
    assert_eq!(service.total_records().await, 2);
    assert!(!service.verify_hash(&hash(1)).await.active);
    assert!(service.verify_hash(&hash(2)).await.active);
    assert_eq!(
        service.list_by_submitter(&alice.identity()).await,
        vec![ProofId(0), ProofId(1)]
    );
    assert_eq!(service.events_since(0).await.unwrap().len(), 4);

    let id = service
        .register(hash(3), "c", "", &service.context_for(bob.identity()))
        .await
        .unwrap();
    assert_eq!(id, ProofId(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_get_dense_ids() {
    let fx = Arc::new(TestFixture::new().await);

    let mut handles = Vec::new();
    for n in 1..=32u8 {
        let fx = Arc::clone(&fx);
        handles.push(tokio::spawn(async move {
            let who = party(n % 4 + 1);
            // Every hash is submitted twice; exactly one of each pair wins.
            let first = fx
                .service
                .register(hash(n), "race", "", &fx.ctx(&who))
                .await;
            let second = fx
                .service
                .register(hash(n), "race", "", &fx.ctx(&who))
                .await;
            (first.is_ok() as u8) + (second.is_ok() as u8)
        }));
    }

    let mut wins = 0u32;
    for handle in handles {
        wins += u32::from(handle.await.unwrap());
    }
    assert_eq!(wins, 32);
    assert_eq!(fx.service.total_records().await, 32);

    let mut hashes: Vec<_> = fx.service.snapshot().await.proofs.iter().map(|p| p.data_hash).collect();
    hashes.sort();
    hashes.dedup();
    assert_eq!(hashes.len(), 32);

    let events = fx.service.events_since(0).await.unwrap();
    let seqs: Vec<u64> = events.iter().map(|r| r.seq).collect();
    assert_eq!(seqs, (1..=32).collect::<Vec<_>>());
}
