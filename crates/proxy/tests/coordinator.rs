use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

use blobgate_common::types::{BlobMeta, BlobReceipt, IntentState, Job, TxVersion};
use blobgate_proxy::completer::{CompletionWorker, MAX_ATTEMPTS};
use blobgate_proxy::coordinator::{Coordinator, SubmitJobRequest};
use blobgate_proxy::errors::ProxyError;
use blobgate_proxy::escrow::{EscrowApi, EscrowError};
use blobgate_proxy::submitter::BlobDispatch;
use blobgate_rpc::errors::EthClientError;
use blobgate_signer::{LocalSigner, Signer};
use blobgate_storage::{unix_now, EngineType, Store};
use secp256k1::{rand, Secp256k1};

const JOB_TIMEOUT: u64 = 300;

/// Escrow stub with a scripted job table.
#[derive(Default)]
struct MockEscrow {
    jobs: Mutex<std::collections::HashMap<H256, Job>>,
    complete_calls: AtomicU32,
    complete_fails_remaining: AtomicU32,
    already_completed: AtomicBool,
}

impl MockEscrow {
    fn with_job(self, job_id: H256, job: Job) -> Self {
        self.jobs.lock().unwrap().insert(job_id, job);
        self
    }

    fn failing_completions(self, failures: u32) -> Self {
        self.complete_fails_remaining
            .store(failures, Ordering::SeqCst);
        self
    }
}

#[async_trait::async_trait]
impl EscrowApi for MockEscrow {
    async fn get_job(&self, job_id: H256) -> Result<Job, EscrowError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn job_timeout(&self) -> Result<u64, EscrowError> {
        Ok(JOB_TIMEOUT)
    }

    async fn is_proxy_authorized(&self, _proxy: Address) -> Result<bool, EscrowError> {
        Ok(true)
    }

    async fn complete_job(&self, _job_id: H256, _tx: H256) -> Result<H256, EscrowError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);

        if self.already_completed.load(Ordering::SeqCst) {
            return Err(EscrowError::Client(EthClientError::Custom(
                "execution reverted: job already completed".to_owned(),
            )));
        }
        if self
            .complete_fails_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
        {
            return Err(EscrowError::Client(EthClientError::Custom(
                "connection refused".to_owned(),
            )));
        }
        Ok(H256::repeat_byte(0xcc))
    }
}

/// Dispatcher stub that counts broadcasts and can inject delays/failures.
struct StubDispatch {
    broadcasts: AtomicU32,
    delay: Duration,
    fail_with: Mutex<Option<ProxyError>>,
}

impl Default for StubDispatch {
    fn default() -> Self {
        Self {
            broadcasts: AtomicU32::new(0),
            delay: Duration::ZERO,
            fail_with: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl BlobDispatch for StubDispatch {
    async fn submit_blob(
        &self,
        job_id: H256,
        _payload: Bytes,
        meta: BlobMeta,
        _version: TxVersion,
    ) -> Result<BlobReceipt, ProxyError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = self.fail_with.lock().unwrap().take() {
            return Err(error);
        }

        self.broadcasts.fetch_add(1, Ordering::SeqCst);
        Ok(BlobReceipt {
            job_id,
            blob_tx_hash: H256::repeat_byte(0xbb),
            block_number: 100,
            blob_versioned_hash: H256::repeat_byte(0x01),
            commitment: [0u8; 48],
            proofs: vec![[0u8; 48]],
            blob_index: 0,
            meta,
        })
    }

    async fn estimated_cost(&self, _blob_count: u64) -> Result<U256, ProxyError> {
        Ok(U256::from(1_000_000u64))
    }
}

struct Harness {
    coordinator: Arc<Coordinator>,
    dispatch: Arc<StubDispatch>,
    store: Store,
    signer: Signer,
    job_id: H256,
}

async fn signed_request(signer: &Signer, job_id: H256, payload: &[u8]) -> SubmitJobRequest {
    let mut message = format!("\x19Ethereum Signed Message:\n{}", payload.len()).into_bytes();
    message.extend_from_slice(payload);
    let signature = signer.sign_raw(message.into()).await.unwrap();

    SubmitJobRequest {
        job_id,
        payment_tx_hash: H256::repeat_byte(0x77),
        payload: Bytes::copy_from_slice(payload),
        signature: Bytes::copy_from_slice(signature.as_bytes()),
        meta: BlobMeta {
            app_id: "test-app".to_owned(),
            ..Default::default()
        },
        version: TxVersion::Eip4844,
    }
}

fn harness_with(job: Job, dispatch: StubDispatch) -> Harness {
    let (secret_key, _) = Secp256k1::new().generate_keypair(&mut rand::thread_rng());
    let signer = Signer::from(LocalSigner::new(secret_key));

    let job_id = H256::repeat_byte(0x42);
    let job = Job {
        user: signer.address(),
        ..job
    };

    let escrow = Arc::new(MockEscrow::default().with_job(job_id, job));
    let dispatch = Arc::new(dispatch);
    let store = Store::new("", EngineType::InMemory).unwrap();

    let coordinator = Arc::new(Coordinator::new(
        escrow.clone(),
        dispatch.clone(),
        store.clone(),
        JOB_TIMEOUT,
    ));

    Harness {
        coordinator,
        dispatch,
        store,
        signer,
        job_id,
    }
}

fn open_job() -> Job {
    Job {
        user: Address::zero(), // overwritten by the harness
        amount: U256::from(10_000_000u64),
        completed: false,
        timestamp: unix_now(),
        blob_tx_hash: H256::zero(),
    }
}

#[tokio::test]
async fn happy_path_produces_receipt_and_intent() {
    let harness = harness_with(open_job(), StubDispatch::default());
    let request = signed_request(&harness.signer, harness.job_id, b"hello blob").await;

    let receipt = harness.coordinator.submit_job(request).await.unwrap();
    assert_eq!(receipt.job_id, harness.job_id);
    assert_eq!(receipt.blob_index, 0);
    assert_eq!(harness.dispatch.broadcasts.load(Ordering::SeqCst), 1);

    // a completion intent was persisted for the retry queue
    let intent = harness.store.get_intent(harness.job_id).await.unwrap().unwrap();
    assert_eq!(intent.state, IntentState::Pending);
    assert_eq!(intent.blob_tx_hash, receipt.blob_tx_hash);
}

#[tokio::test]
async fn unknown_job_is_rejected_before_any_blob_work() {
    let harness = harness_with(open_job(), StubDispatch::default());
    let request = signed_request(&harness.signer, H256::repeat_byte(0x99), b"data").await;

    assert!(matches!(
        harness.coordinator.submit_job(request).await,
        Err(ProxyError::JobNotFound)
    ));
    assert_eq!(harness.dispatch.broadcasts.load(Ordering::SeqCst), 0);
    // refund safety: nothing persisted for the rejected job
    assert!(harness
        .store
        .get_intent(H256::repeat_byte(0x99))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn wrong_signer_is_unauthorized() {
    let harness = harness_with(open_job(), StubDispatch::default());

    let (other_key, _) = Secp256k1::new().generate_keypair(&mut rand::thread_rng());
    let other = Signer::from(LocalSigner::new(other_key));
    let request = signed_request(&other, harness.job_id, b"data").await;

    assert!(matches!(
        harness.coordinator.submit_job(request).await,
        Err(ProxyError::SignatureMismatch)
    ));
    assert_eq!(harness.dispatch.broadcasts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn underfunded_job_is_rejected() {
    let job = Job {
        amount: U256::from(10u64),
        ..open_job()
    };
    let harness = harness_with(job, StubDispatch::default());
    let request = signed_request(&harness.signer, harness.job_id, b"data").await;

    assert!(matches!(
        harness.coordinator.submit_job(request).await,
        Err(ProxyError::InsufficientDeposit { .. })
    ));
}

#[tokio::test]
async fn expired_job_is_refusable() {
    let job = Job {
        timestamp: unix_now() - JOB_TIMEOUT - 1,
        ..open_job()
    };
    let harness = harness_with(job, StubDispatch::default());
    let request = signed_request(&harness.signer, harness.job_id, b"data").await;

    assert!(matches!(
        harness.coordinator.submit_job(request).await,
        Err(ProxyError::JobExpired)
    ));
    assert_eq!(harness.dispatch.broadcasts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn completed_job_returns_conflict_without_cache() {
    let job = Job {
        completed: true,
        ..open_job()
    };
    let harness = harness_with(job, StubDispatch::default());
    let request = signed_request(&harness.signer, harness.job_id, b"data").await;

    assert!(matches!(
        harness.coordinator.submit_job(request).await,
        Err(ProxyError::JobAlreadyCompleted)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_yields_one_broadcast() {
    let harness = harness_with(
        open_job(),
        StubDispatch {
            delay: Duration::from_millis(200),
            ..Default::default()
        },
    );
    let request = signed_request(&harness.signer, harness.job_id, b"hello blob").await;

    let first = {
        let coordinator = harness.coordinator.clone();
        let request = request.clone();
        tokio::spawn(async move { coordinator.submit_job(request).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = harness.coordinator.submit_job(request.clone()).await;

    // the racing call is refused immediately, not queued
    assert!(matches!(second, Err(ProxyError::JobInFlight)));

    let receipt = first.await.unwrap().unwrap();
    assert_eq!(harness.dispatch.broadcasts.load(Ordering::SeqCst), 1);

    // a later retry is served from the result cache with the same receipt
    let replay = harness.coordinator.submit_job(request).await.unwrap();
    assert_eq!(replay.blob_tx_hash, receipt.blob_tx_hash);
    assert_eq!(harness.dispatch.broadcasts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transient_dispatch_failure_leaves_job_retryable() {
    let dispatch = StubDispatch::default();
    *dispatch.fail_with.lock().unwrap() =
        Some(ProxyError::UpstreamUnavailable("rpc down".to_owned()));
    let harness = harness_with(open_job(), dispatch);
    let request = signed_request(&harness.signer, harness.job_id, b"data").await;

    assert!(matches!(
        harness.coordinator.submit_job(request.clone()).await,
        Err(ProxyError::UpstreamUnavailable(_))
    ));
    // no negative cache, no intent: the client may retry and succeed
    assert!(harness
        .store
        .get_intent(harness.job_id)
        .await
        .unwrap()
        .is_none());

    let receipt = harness.coordinator.submit_job(request).await.unwrap();
    assert_eq!(receipt.job_id, harness.job_id);
}

#[tokio::test]
async fn permanent_dispatch_failure_is_negative_cached() {
    let dispatch = StubDispatch::default();
    *dispatch.fail_with.lock().unwrap() =
        Some(ProxyError::ValidationFailed("payload is empty".to_owned()));
    let harness = harness_with(open_job(), dispatch);
    let request = signed_request(&harness.signer, harness.job_id, b"data").await;

    assert!(matches!(
        harness.coordinator.submit_job(request.clone()).await,
        Err(ProxyError::ValidationFailed(_))
    ));

    // the cached rejection short-circuits the repeat without dispatching
    assert!(matches!(
        harness.coordinator.submit_job(request).await,
        Err(ProxyError::ValidationFailed(_))
    ));
    assert_eq!(harness.dispatch.broadcasts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn completion_worker_retries_until_success() {
    let harness = harness_with(open_job(), StubDispatch::default());
    let request = signed_request(&harness.signer, harness.job_id, b"data").await;
    harness.coordinator.submit_job(request).await.unwrap();

    let escrow = Arc::new(MockEscrow::default().failing_completions(2));
    let worker = CompletionWorker::new(
        escrow.clone(),
        harness.store.clone(),
        Duration::from_millis(10),
    );

    // first tick: claim + failed attempt, rescheduled with backoff
    worker.tick().await.unwrap();
    let intent = harness.store.get_intent(harness.job_id).await.unwrap().unwrap();
    assert_eq!(intent.state, IntentState::Pending);
    assert_eq!(intent.attempts, 1);
    assert!(intent.next_attempt_at > unix_now());

    // force the schedule due and run until the call goes through
    harness
        .store
        .reschedule_intent(harness.job_id, intent.attempts, 0)
        .await
        .unwrap();
    worker.tick().await.unwrap();
    let intent = harness.store.get_intent(harness.job_id).await.unwrap().unwrap();
    assert_eq!(intent.attempts, 2);

    harness
        .store
        .reschedule_intent(harness.job_id, intent.attempts, 0)
        .await
        .unwrap();
    worker.tick().await.unwrap();

    let intent = harness.store.get_intent(harness.job_id).await.unwrap().unwrap();
    assert_eq!(intent.state, IntentState::Succeeded);
    assert_eq!(escrow.complete_calls.load(Ordering::SeqCst), 3);

    // a further tick does not double-claim
    worker.tick().await.unwrap();
    assert_eq!(escrow.complete_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn completion_worker_treats_replayed_claim_as_success() {
    let harness = harness_with(open_job(), StubDispatch::default());
    let request = signed_request(&harness.signer, harness.job_id, b"data").await;
    harness.coordinator.submit_job(request).await.unwrap();

    let escrow = Arc::new(MockEscrow::default());
    escrow.already_completed.store(true, Ordering::SeqCst);
    let worker =
        CompletionWorker::new(escrow, harness.store.clone(), Duration::from_millis(10));

    worker.tick().await.unwrap();
    let intent = harness.store.get_intent(harness.job_id).await.unwrap().unwrap();
    assert_eq!(intent.state, IntentState::Succeeded);
}

#[tokio::test]
async fn completion_worker_parks_intent_after_bounded_attempts() {
    let harness = harness_with(open_job(), StubDispatch::default());
    let request = signed_request(&harness.signer, harness.job_id, b"data").await;
    harness.coordinator.submit_job(request).await.unwrap();

    let escrow = Arc::new(MockEscrow::default().failing_completions(u32::MAX));
    let worker = CompletionWorker::new(
        escrow.clone(),
        harness.store.clone(),
        Duration::from_millis(10),
    );

    for _ in 0..MAX_ATTEMPTS {
        let intent = harness.store.get_intent(harness.job_id).await.unwrap().unwrap();
        harness
            .store
            .reschedule_intent(harness.job_id, intent.attempts, 0)
            .await
            .unwrap();
        worker.tick().await.unwrap();
    }

    let intent = harness.store.get_intent(harness.job_id).await.unwrap().unwrap();
    assert_eq!(intent.state, IntentState::PermanentlyFailed);
}

#[tokio::test]
async fn restart_recovers_persisted_intents() {
    // simulate the crash window between broadcast and completion by writing
    // the intent to a durable store, dropping everything, and re-attaching a
    // fresh worker to the same file
    let dir = tempfile_dir();
    let path = dir.path().join("proxy.redb");
    let path = path.to_str().unwrap();

    {
        let store = Store::new(path, EngineType::RedB).unwrap();
        store
            .put_intent_if_absent(blobgate_common::types::CompletionIntent::new(
                H256::repeat_byte(0x42),
                H256::repeat_byte(0xbb),
                unix_now(),
            ))
            .await
            .unwrap();
        // process "crashes" here
    }

    let store = Store::new(path, EngineType::RedB).unwrap();
    let escrow = Arc::new(MockEscrow::default());
    let worker = CompletionWorker::new(escrow.clone(), store.clone(), Duration::from_millis(10));

    worker.tick().await.unwrap();
    let intent = store
        .get_intent(H256::repeat_byte(0x42))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(intent.state, IntentState::Succeeded);
    assert_eq!(escrow.complete_calls.load(Ordering::SeqCst), 1);
}

fn tempfile_dir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}
