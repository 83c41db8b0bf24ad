use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard},
};

use blobgate_common::types::{CompletionIntent, IntentState, JobOutcome};
use ethereum_types::H256;

use crate::api::StoreEngine;
use crate::error::StoreError;

#[derive(Default, Clone)]
pub struct Store(Arc<Mutex<StoreInner>>);

#[derive(Default, Debug)]
struct StoreInner {
    /// Submission locks: job id to lock expiry.
    locks: HashMap<H256, u64>,
    /// Result cache: job id to (outcome, expiry).
    outcomes: HashMap<H256, (JobOutcome, u64)>,
    /// Completion intents by job id.
    intents: HashMap<H256, CompletionIntent>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> Result<MutexGuard<'_, StoreInner>, StoreError> {
        self.0.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait::async_trait]
impl StoreEngine for Store {
    async fn try_lock_job(&self, job_id: H256, ttl: u64, now: u64) -> Result<bool, StoreError> {
        let mut inner = self.inner()?;
        match inner.locks.get(&job_id) {
            Some(expiry) if *expiry > now => Ok(false),
            _ => {
                inner.locks.insert(job_id, now + ttl);
                Ok(true)
            }
        }
    }

    async fn unlock_job(&self, job_id: H256) -> Result<(), StoreError> {
        self.inner()?.locks.remove(&job_id);
        Ok(())
    }

    async fn get_cached_outcome(
        &self,
        job_id: H256,
        now: u64,
    ) -> Result<Option<JobOutcome>, StoreError> {
        let mut inner = self.inner()?;
        match inner.outcomes.get(&job_id) {
            Some((outcome, expiry)) if *expiry > now => Ok(Some(outcome.clone())),
            Some(_) => {
                inner.outcomes.remove(&job_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn cache_outcome(
        &self,
        job_id: H256,
        outcome: JobOutcome,
        ttl: u64,
        now: u64,
    ) -> Result<(), StoreError> {
        self.inner()?.outcomes.insert(job_id, (outcome, now + ttl));
        Ok(())
    }

    async fn put_intent_if_absent(&self, intent: CompletionIntent) -> Result<bool, StoreError> {
        let mut inner = self.inner()?;
        match inner.intents.get(&intent.job_id) {
            Some(existing) if !existing.is_terminal() => Ok(false),
            _ => {
                inner.intents.insert(intent.job_id, intent);
                Ok(true)
            }
        }
    }

    async fn get_intent(&self, job_id: H256) -> Result<Option<CompletionIntent>, StoreError> {
        Ok(self.inner()?.intents.get(&job_id).cloned())
    }

    async fn claim_due_intents(
        &self,
        now: u64,
        lease: u64,
    ) -> Result<Vec<CompletionIntent>, StoreError> {
        let mut inner = self.inner()?;
        let mut claimed = Vec::new();

        for intent in inner.intents.values_mut() {
            let due = intent.next_attempt_at <= now;
            let claimable = match intent.state {
                IntentState::Pending => due,
                // an in-flight intent past its lease belongs to a dead worker
                IntentState::InFlight => due,
                IntentState::Succeeded | IntentState::PermanentlyFailed => false,
            };
            if claimable {
                intent.state = IntentState::InFlight;
                intent.next_attempt_at = now + lease;
                claimed.push(intent.clone());
            }
        }

        Ok(claimed)
    }

    async fn mark_intent_succeeded(&self, job_id: H256) -> Result<(), StoreError> {
        if let Some(intent) = self.inner()?.intents.get_mut(&job_id) {
            intent.state = IntentState::Succeeded;
        }
        Ok(())
    }

    async fn reschedule_intent(
        &self,
        job_id: H256,
        attempts: u32,
        next_attempt_at: u64,
    ) -> Result<(), StoreError> {
        if let Some(intent) = self.inner()?.intents.get_mut(&job_id) {
            intent.state = IntentState::Pending;
            intent.attempts = attempts;
            intent.next_attempt_at = next_attempt_at;
        }
        Ok(())
    }

    async fn mark_intent_failed(&self, job_id: H256) -> Result<(), StoreError> {
        if let Some(intent) = self.inner()?.intents.get_mut(&job_id) {
            intent.state = IntentState::PermanentlyFailed;
        }
        Ok(())
    }
}

impl Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("In Memory Store").finish()
    }
}
