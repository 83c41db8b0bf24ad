// Durable storage API for job locks, completion intents and the result cache.

use std::fmt::Debug;

use blobgate_common::types::{CompletionIntent, JobOutcome};
use ethereum_types::H256;

use crate::error::StoreError;

// We need async_trait because the stabilized feature lacks support for object
// safety (i.e. dyn StoreEngine)
#[async_trait::async_trait]
pub trait StoreEngine: Debug + Send + Sync {
    /// Acquires the submission lock for a job (set-if-absent with TTL).
    /// Returns false when another holder owns a live lock.
    async fn try_lock_job(&self, job_id: H256, ttl: u64, now: u64) -> Result<bool, StoreError>;

    /// Releases the submission lock for a job.
    async fn unlock_job(&self, job_id: H256) -> Result<(), StoreError>;

    /// Returns the cached terminal outcome for a job, if still live.
    async fn get_cached_outcome(
        &self,
        job_id: H256,
        now: u64,
    ) -> Result<Option<JobOutcome>, StoreError>;

    /// Caches the terminal outcome for a job with the given TTL.
    async fn cache_outcome(
        &self,
        job_id: H256,
        outcome: JobOutcome,
        ttl: u64,
        now: u64,
    ) -> Result<(), StoreError>;

    /// Persists a completion intent if no non-terminal intent exists for the
    /// job (set-if-absent). Returns false when one already exists.
    async fn put_intent_if_absent(&self, intent: CompletionIntent) -> Result<bool, StoreError>;

    /// Returns the stored intent for a job.
    async fn get_intent(&self, job_id: H256) -> Result<Option<CompletionIntent>, StoreError>;

    /// Claims every intent due for an attempt: pending intents whose
    /// `next_attempt_at` has passed, plus in-flight intents whose lease
    /// expired (the worker that held them died). Claimed intents transition
    /// to in-flight with `next_attempt_at = now + lease` in the same store
    /// transaction (scan + compare-and-set).
    async fn claim_due_intents(
        &self,
        now: u64,
        lease: u64,
    ) -> Result<Vec<CompletionIntent>, StoreError>;

    /// Marks an intent as succeeded (terminal).
    async fn mark_intent_succeeded(&self, job_id: H256) -> Result<(), StoreError>;

    /// Reschedules a failed attempt: bumps `attempts` and sets the next
    /// attempt time, back in the pending state.
    async fn reschedule_intent(
        &self,
        job_id: H256,
        attempts: u32,
        next_attempt_at: u64,
    ) -> Result<(), StoreError>;

    /// Marks an intent as permanently failed (terminal).
    async fn mark_intent_failed(&self, job_id: H256) -> Result<(), StoreError>;
}
