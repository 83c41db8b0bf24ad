use blobgate_common::types::{BlobMeta, BlobReceipt, CompletionIntent, IntentState, JobOutcome};
use blobgate_storage::{EngineType, Store};
use ethereum_types::H256;

fn job_id(byte: u8) -> H256 {
    H256::repeat_byte(byte)
}

fn receipt(byte: u8) -> JobOutcome {
    JobOutcome::Completed(Box::new(BlobReceipt {
        job_id: job_id(byte),
        blob_tx_hash: H256::repeat_byte(0xaa),
        block_number: 1,
        blob_versioned_hash: H256::repeat_byte(0x01),
        commitment: [0u8; 48],
        proofs: vec![[0u8; 48]],
        blob_index: 0,
        meta: BlobMeta {
            app_id: "test".to_string(),
            ..Default::default()
        },
    }))
}

fn stores() -> Vec<(&'static str, Store, Option<tempfile::TempDir>)> {
    let mut stores = vec![(
        "in-memory",
        Store::new("", EngineType::InMemory).unwrap(),
        None,
    )];

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.redb");
    stores.push((
        "redb",
        Store::new(path.to_str().unwrap(), EngineType::RedB).unwrap(),
        Some(dir),
    ));

    stores
}

#[tokio::test]
async fn lock_is_exclusive_until_released() {
    for (name, store, _guard) in stores() {
        let id = job_id(1);
        assert!(store.try_lock_job(id, 60, 1000).await.unwrap(), "{name}");
        assert!(!store.try_lock_job(id, 60, 1010).await.unwrap(), "{name}");

        store.unlock_job(id).await.unwrap();
        assert!(store.try_lock_job(id, 60, 1020).await.unwrap(), "{name}");
    }
}

#[tokio::test]
async fn lock_expires_by_ttl() {
    for (name, store, _guard) in stores() {
        let id = job_id(2);
        assert!(store.try_lock_job(id, 60, 1000).await.unwrap(), "{name}");
        // within ttl: held
        assert!(!store.try_lock_job(id, 60, 1059).await.unwrap(), "{name}");
        // past ttl: reclaimable
        assert!(store.try_lock_job(id, 60, 1061).await.unwrap(), "{name}");
    }
}

#[tokio::test]
async fn outcome_cache_honors_ttl() {
    for (name, store, _guard) in stores() {
        let id = job_id(3);
        assert!(store.get_cached_outcome(id, 1000).await.unwrap().is_none());

        store
            .cache_outcome(id, receipt(3), 3600, 1000)
            .await
            .unwrap();
        assert!(
            store.get_cached_outcome(id, 2000).await.unwrap().is_some(),
            "{name}"
        );
        assert!(
            store.get_cached_outcome(id, 1000 + 3601).await.unwrap().is_none(),
            "{name}"
        );
    }
}

#[tokio::test]
async fn intent_set_if_absent_guards_duplicates() {
    for (name, store, _guard) in stores() {
        let id = job_id(4);
        let intent = CompletionIntent::new(id, H256::repeat_byte(0xbb), 1000);

        assert!(store.put_intent_if_absent(intent.clone()).await.unwrap());
        assert!(
            !store.put_intent_if_absent(intent.clone()).await.unwrap(),
            "{name}: duplicate non-terminal intent accepted"
        );

        // once terminal, a fresh intent may be recorded again
        store.mark_intent_succeeded(id).await.unwrap();
        assert!(store.put_intent_if_absent(intent).await.unwrap(), "{name}");
    }
}

#[tokio::test]
async fn claim_transitions_due_intents_to_in_flight() {
    for (name, store, _guard) in stores() {
        let due = CompletionIntent::new(job_id(5), H256::zero(), 1000);
        let later = CompletionIntent {
            next_attempt_at: 5000,
            ..CompletionIntent::new(job_id(6), H256::zero(), 1000)
        };
        store.put_intent_if_absent(due).await.unwrap();
        store.put_intent_if_absent(later).await.unwrap();

        let claimed = store.claim_due_intents(2000, 30).await.unwrap();
        assert_eq!(claimed.len(), 1, "{name}");
        assert_eq!(claimed[0].job_id, job_id(5));
        assert_eq!(claimed[0].state, IntentState::InFlight);
        assert_eq!(claimed[0].next_attempt_at, 2030);

        // in-flight within the lease is not reclaimed
        assert!(store.claim_due_intents(2010, 30).await.unwrap().is_empty());
        // but a crashed worker's lease runs out eventually
        let reclaimed = store.claim_due_intents(2031, 30).await.unwrap();
        assert_eq!(reclaimed.len(), 1, "{name}: expired lease not reclaimed");
    }
}

#[tokio::test]
async fn intent_lifecycle_reaches_terminal_states() {
    for (name, store, _guard) in stores() {
        let id = job_id(7);
        store
            .put_intent_if_absent(CompletionIntent::new(id, H256::zero(), 1000))
            .await
            .unwrap();

        let claimed = store.claim_due_intents(1000, 30).await.unwrap();
        assert_eq!(claimed.len(), 1);

        store.reschedule_intent(id, 1, 1010).await.unwrap();
        let intent = store.get_intent(id).await.unwrap().unwrap();
        assert_eq!(intent.state, IntentState::Pending);
        assert_eq!(intent.attempts, 1);
        assert_eq!(intent.next_attempt_at, 1010);

        store.mark_intent_failed(id).await.unwrap();
        let intent = store.get_intent(id).await.unwrap().unwrap();
        assert_eq!(intent.state, IntentState::PermanentlyFailed, "{name}");
        assert!(store.claim_due_intents(9999, 30).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn redb_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.redb");
    let path = path.to_str().unwrap();

    {
        let store = Store::new(path, EngineType::RedB).unwrap();
        store
            .put_intent_if_absent(CompletionIntent::new(job_id(8), H256::zero(), 1000))
            .await
            .unwrap();
    }

    // a restarted process sees the persisted intent and can claim it
    let store = Store::new(path, EngineType::RedB).unwrap();
    let claimed = store.claim_due_intents(2000, 30).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].job_id, job_id(8));
}
