use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use blobgate_common::types::CompletionIntent;
use blobgate_storage::{unix_now, Store};

use crate::escrow::EscrowApi;

/// First retry delay after a failed completion call.
pub const BASE_BACKOFF_SECS: u64 = 5;

/// Backoff ceiling. Also the in-flight lease: an intent claimed by a worker
/// that died becomes reclaimable after this long.
pub const MAX_BACKOFF_SECS: u64 = 5 * 60;

/// Attempts before an intent is parked as permanently failed.
pub const MAX_ATTEMPTS: u32 = 20;

/// `min(base · 2^attempts, max)` in seconds.
pub fn backoff_delay(attempts: u32) -> u64 {
    BASE_BACKOFF_SECS
        .saturating_mul(1u64 << attempts.min(10))
        .min(MAX_BACKOFF_SECS)
}

/// Drives persisted completion intents to their terminal state: for every
/// successfully submitted blob, `completeJob` is eventually executed on-chain
/// (or the intent is parked after bounded attempts).
#[derive(Clone)]
pub struct CompletionWorker {
    escrow: Arc<dyn EscrowApi>,
    store: Store,
    poll_interval: Duration,
}

impl CompletionWorker {
    pub fn new(escrow: Arc<dyn EscrowApi>, store: Store, poll_interval: Duration) -> Self {
        Self {
            escrow,
            store,
            poll_interval,
        }
    }

    /// Worker loop; runs until the token is cancelled. Pending intents
    /// persist across restarts, so stopping mid-queue is safe.
    pub async fn run(self, token: CancellationToken) {
        info!("completion worker started");
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            if let Err(error) = self.tick().await {
                error!(%error, "completion worker tick failed");
            }
        }
        info!("completion worker stopped");
    }

    /// Claims every due intent and attempts its completion call.
    pub async fn tick(&self) -> Result<(), blobgate_storage::error::StoreError> {
        let now = unix_now();
        let claimed = self.store.claim_due_intents(now, MAX_BACKOFF_SECS).await?;

        for intent in claimed {
            self.attempt(intent).await?;
        }
        Ok(())
    }

    async fn attempt(
        &self,
        intent: CompletionIntent,
    ) -> Result<(), blobgate_storage::error::StoreError> {
        let job_id = intent.job_id;
        debug!(%job_id, attempts = intent.attempts, "attempting completion call");

        match self
            .escrow
            .complete_job(job_id, intent.blob_tx_hash)
            .await
        {
            Ok(completion_tx_hash) => {
                info!(%job_id, %completion_tx_hash, "completion intent succeeded");
                self.store.mark_intent_succeeded(job_id).await
            }
            Err(error) if error.is_already_completed() => {
                // someone (or a previous attempt whose receipt we missed)
                // already claimed this job; the obligation is discharged
                info!(%job_id, "job already completed on-chain");
                self.store.mark_intent_succeeded(job_id).await
            }
            Err(error) => {
                let attempts = intent.attempts + 1;
                if attempts >= MAX_ATTEMPTS {
                    error!(
                        %job_id,
                        attempts,
                        %error,
                        "completion intent permanently failed, manual claim required"
                    );
                    self.store.mark_intent_failed(job_id).await
                } else {
                    let delay = backoff_delay(attempts);
                    warn!(%job_id, attempts, delay, %error, "completion call failed, rescheduling");
                    self.store
                        .reschedule_intent(job_id, attempts, unix_now() + delay)
                        .await
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_delay(0), 5);
        assert_eq!(backoff_delay(1), 10);
        assert_eq!(backoff_delay(2), 20);
        assert_eq!(backoff_delay(5), 160);
        assert_eq!(backoff_delay(6), 300);
        assert_eq!(backoff_delay(19), 300);
    }
}
