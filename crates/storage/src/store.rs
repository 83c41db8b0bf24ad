use std::sync::Arc;

use blobgate_common::types::{CompletionIntent, JobOutcome};
use ethereum_types::H256;
use tracing::info;

use crate::api::StoreEngine;
use crate::error::StoreError;
use crate::store_db::in_memory::Store as InMemoryStore;
#[cfg(feature = "redb")]
use crate::store_db::redb::RedBStore;

#[derive(Debug, Clone)]
pub struct Store {
    engine: Arc<dyn StoreEngine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineType {
    InMemory,
    #[cfg(feature = "redb")]
    RedB,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            engine: Arc::new(InMemoryStore::new()),
        }
    }
}

impl Store {
    pub fn new(path: &str, engine_type: EngineType) -> Result<Self, StoreError> {
        info!("Starting storage engine ({engine_type:?})");
        let store = match engine_type {
            EngineType::InMemory => Self {
                engine: Arc::new(InMemoryStore::new()),
            },
            #[cfg(feature = "redb")]
            EngineType::RedB => Self {
                engine: Arc::new(RedBStore::new(path)?),
            },
        };
        info!("Started storage engine");
        Ok(store)
    }

    pub async fn try_lock_job(&self, job_id: H256, ttl: u64, now: u64) -> Result<bool, StoreError> {
        self.engine.try_lock_job(job_id, ttl, now).await
    }

    pub async fn unlock_job(&self, job_id: H256) -> Result<(), StoreError> {
        self.engine.unlock_job(job_id).await
    }

    pub async fn get_cached_outcome(
        &self,
        job_id: H256,
        now: u64,
    ) -> Result<Option<JobOutcome>, StoreError> {
        self.engine.get_cached_outcome(job_id, now).await
    }

    pub async fn cache_outcome(
        &self,
        job_id: H256,
        outcome: JobOutcome,
        ttl: u64,
        now: u64,
    ) -> Result<(), StoreError> {
        self.engine.cache_outcome(job_id, outcome, ttl, now).await
    }

    pub async fn put_intent_if_absent(&self, intent: CompletionIntent) -> Result<bool, StoreError> {
        self.engine.put_intent_if_absent(intent).await
    }

    pub async fn get_intent(&self, job_id: H256) -> Result<Option<CompletionIntent>, StoreError> {
        self.engine.get_intent(job_id).await
    }

    pub async fn claim_due_intents(
        &self,
        now: u64,
        lease: u64,
    ) -> Result<Vec<CompletionIntent>, StoreError> {
        self.engine.claim_due_intents(now, lease).await
    }

    pub async fn mark_intent_succeeded(&self, job_id: H256) -> Result<(), StoreError> {
        self.engine.mark_intent_succeeded(job_id).await
    }

    pub async fn reschedule_intent(
        &self,
        job_id: H256,
        attempts: u32,
        next_attempt_at: u64,
    ) -> Result<(), StoreError> {
        self.engine
            .reschedule_intent(job_id, attempts, next_attempt_at)
            .await
    }

    pub async fn mark_intent_failed(&self, job_id: H256) -> Result<(), StoreError> {
        self.engine.mark_intent_failed(job_id).await
    }
}
