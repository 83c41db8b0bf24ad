use std::sync::Arc;

use bytes::Bytes;
use ethereum_types::{Address, H256};
use keccak_hash::keccak;
use tracing::{debug, info, warn};

use blobgate_common::constants::BYTES_PER_BLOB;
use blobgate_common::types::{BlobMeta, BlobReceipt, CompletionIntent, JobOutcome, TxVersion};
use blobgate_signer::recover_address;
use blobgate_storage::{unix_now, Store};

use crate::errors::ProxyError;
use crate::escrow::EscrowApi;
use crate::submitter::BlobDispatch;

/// Submission lock TTL. Bounds the proxy's exposure to a client that retries
/// while its first request is still being confirmed.
pub const JOB_LOCK_TTL_SECS: u64 = 60;

/// Result cache TTL, serving idempotent replies to retrying clients.
pub const JOB_RESULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct SubmitJobRequest {
    pub job_id: H256,
    pub payment_tx_hash: H256,
    pub payload: Bytes,
    pub signature: Bytes,
    pub meta: BlobMeta,
    pub version: TxVersion,
}

/// Validates incoming work against the on-chain escrow, guarantees
/// at-most-once blob submission per job and enqueues the durable completion
/// intent the retry queue drives afterwards.
pub struct Coordinator {
    escrow: Arc<dyn EscrowApi>,
    dispatch: Arc<dyn BlobDispatch>,
    store: Store,
    job_timeout: u64,
    lock_ttl: u64,
    cache_ttl: u64,
}

impl Coordinator {
    pub fn new(
        escrow: Arc<dyn EscrowApi>,
        dispatch: Arc<dyn BlobDispatch>,
        store: Store,
        job_timeout: u64,
    ) -> Self {
        Self {
            escrow,
            dispatch,
            store,
            job_timeout,
            lock_ttl: JOB_LOCK_TTL_SECS,
            cache_ttl: JOB_RESULT_CACHE_TTL_SECS,
        }
    }

    pub async fn submit_job(&self, request: SubmitJobRequest) -> Result<BlobReceipt, ProxyError> {
        let job_id = request.job_id;
        let now = unix_now();

        // Preconditions, cheapest first; all of them run before any blob
        // work so a rejected job's refund path stays unobstructed.
        validate_request(&request)?;

        let job = self.escrow.get_job(job_id).await?;
        if !job.exists() {
            return Err(ProxyError::JobNotFound);
        }

        verify_payload_signature(&request.payload, &request.signature, job.user)?;

        let required = self.dispatch.estimated_cost(1).await?;
        if job.amount < required {
            return Err(ProxyError::InsufficientDeposit {
                required,
                available: job.amount,
            });
        }

        if job.completed {
            // serve the receipt we produced earlier, if it is still cached
            if let Some(JobOutcome::Completed(receipt)) =
                self.store.get_cached_outcome(job_id, now).await?
            {
                return Ok(*receipt);
            }
            return Err(ProxyError::JobAlreadyCompleted);
        }

        if now.saturating_sub(job.timestamp) >= self.job_timeout {
            return Err(ProxyError::JobExpired);
        }

        if !self.store.try_lock_job(job_id, self.lock_ttl, now).await? {
            debug!(%job_id, "submission lock held elsewhere");
            return Err(ProxyError::JobInFlight);
        }

        // The critical section runs in its own task: once the blob may have
        // been broadcast, a client hanging up must not cancel the local
        // bookkeeping.
        let escrow_span = job_id;
        let store = self.store.clone();
        let dispatch = self.dispatch.clone();
        let cache_ttl = self.cache_ttl;
        tokio::spawn(async move {
            submit_locked(store, dispatch, request, cache_ttl).await
        })
        .await
        .map_err(|error| {
            warn!(job_id = %escrow_span, %error, "submission task aborted");
            ProxyError::Internal(error.to_string())
        })?
    }
}

/// Body of the submission critical section; the lock for `request.job_id` is
/// held on entry and released on every path.
async fn submit_locked(
    store: Store,
    dispatch: Arc<dyn BlobDispatch>,
    request: SubmitJobRequest,
    cache_ttl: u64,
) -> Result<BlobReceipt, ProxyError> {
    let job_id = request.job_id;
    let now = unix_now();

    // a retry that raced the previous attempt gets the recorded outcome
    if let Some(outcome) = store.get_cached_outcome(job_id, now).await? {
        store.unlock_job(job_id).await?;
        return match outcome {
            JobOutcome::Completed(receipt) => Ok(*receipt),
            JobOutcome::Rejected { error, message } => {
                Err(ProxyError::from_cached(&error, message))
            }
        };
    }

    let result = dispatch
        .submit_blob(job_id, request.payload, request.meta, request.version)
        .await;

    match &result {
        Ok(receipt) => {
            store
                .cache_outcome(
                    job_id,
                    JobOutcome::Completed(Box::new(receipt.clone())),
                    cache_ttl,
                    now,
                )
                .await?;

            let intent = CompletionIntent::new(job_id, receipt.blob_tx_hash, now);
            if !store.put_intent_if_absent(intent).await? {
                // cannot happen while the lock is honored
                warn!(%job_id, "completion intent already present");
            }
            info!(%job_id, blob_tx_hash = %receipt.blob_tx_hash, "submission recorded");
        }
        Err(error) if error.is_permanent() => {
            store
                .cache_outcome(
                    job_id,
                    JobOutcome::Rejected {
                        error: error.code().to_string(),
                        message: error.to_string(),
                    },
                    cache_ttl,
                    now,
                )
                .await?;
        }
        // transient failures leave no trace so the client can retry
        Err(_) => {}
    }

    store.unlock_job(job_id).await?;
    result
}

fn validate_request(request: &SubmitJobRequest) -> Result<(), ProxyError> {
    if request.payload.is_empty() {
        return Err(ProxyError::ValidationFailed("payload is empty".to_owned()));
    }
    if request.payload.len() > BYTES_PER_BLOB {
        return Err(ProxyError::ValidationFailed(format!(
            "payload of {} bytes exceeds the {BYTES_PER_BLOB} byte maximum",
            request.payload.len()
        )));
    }
    if request.signature.len() != 65 {
        return Err(ProxyError::ValidationFailed(
            "signature must be 65 bytes".to_owned(),
        ));
    }
    if request.job_id.is_zero() {
        return Err(ProxyError::ValidationFailed("jobId is zero".to_owned()));
    }
    if request.payment_tx_hash.is_zero() {
        return Err(ProxyError::ValidationFailed(
            "paymentTxHash is zero".to_owned(),
        ));
    }
    request
        .meta
        .validate()
        .map_err(|error| ProxyError::ValidationFailed(error.to_string()))?;
    Ok(())
}

/// Recovers the EIP-191 personal-message signer of the payload.
///
/// The signature covers only the payload bytes, not the job id, so the same
/// signed payload is accepted for any job owned by the same user.
fn verify_payload_signature(
    payload: &[u8],
    signature: &[u8],
    expected: Address,
) -> Result<(), ProxyError> {
    if signature.len() != 65 {
        return Err(ProxyError::SignatureMismatch);
    }
    let signature = ethereum_types::Signature::from_slice(signature);

    let mut message = format!("\x19Ethereum Signed Message:\n{}", payload.len()).into_bytes();
    message.extend_from_slice(payload);
    let digest = keccak(&message).0;

    let recovered = recover_address(&digest, &signature)
        .map_err(|_| ProxyError::SignatureMismatch)?;
    if recovered != expected {
        return Err(ProxyError::SignatureMismatch);
    }
    Ok(())
}
