use std::fmt::Debug;
use std::sync::Arc;

use blobgate_common::types::{CompletionIntent, IntentState, JobOutcome};
use ethereum_types::H256;
use redb::{Database, ReadableTable, TableDefinition};

use crate::api::StoreEngine;
use crate::error::StoreError;

/// Job id to lock expiry (unix seconds).
const LOCKS_TABLE: TableDefinition<&[u8], u64> = TableDefinition::new("job_locks");
/// Job id to bincode-encoded `(expiry, JobOutcome)`.
const OUTCOMES_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("job_outcomes");
/// Job id to bincode-encoded `CompletionIntent`.
const INTENTS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("completion_intents");

/// Embedded durable store. Every engine operation runs inside a single redb
/// transaction, which is what gives set-if-absent and claim their atomicity.
#[derive(Clone)]
pub struct RedBStore {
    db: Arc<Database>,
}

impl RedBStore {
    pub fn new(path: &str) -> Result<Self, StoreError> {
        let db = Database::create(path)?;

        // make sure every table exists so later reads don't race creation
        let txn = db.begin_write()?;
        txn.open_table(LOCKS_TABLE)?;
        txn.open_table(OUTCOMES_TABLE)?;
        txn.open_table(INTENTS_TABLE)?;
        txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    fn read_intent(&self, job_id: H256) -> Result<Option<CompletionIntent>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(INTENTS_TABLE)?;
        let Some(raw) = table.get(job_id.as_bytes())? else {
            return Ok(None);
        };
        Ok(Some(bincode::deserialize(raw.value())?))
    }

    fn update_intent(
        &self,
        job_id: H256,
        update: impl FnOnce(&mut CompletionIntent),
    ) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(INTENTS_TABLE)?;
            let current = match table.get(job_id.as_bytes())? {
                Some(raw) => Some(bincode::deserialize::<CompletionIntent>(raw.value())?),
                None => None,
            };
            if let Some(mut intent) = current {
                update(&mut intent);
                table.insert(job_id.as_bytes(), bincode::serialize(&intent)?.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StoreEngine for RedBStore {
    async fn try_lock_job(&self, job_id: H256, ttl: u64, now: u64) -> Result<bool, StoreError> {
        let txn = self.db.begin_write()?;
        let acquired;
        {
            let mut table = txn.open_table(LOCKS_TABLE)?;
            let held = match table.get(job_id.as_bytes())? {
                Some(expiry) => expiry.value() > now,
                None => false,
            };
            acquired = !held;
            if acquired {
                table.insert(job_id.as_bytes(), now + ttl)?;
            }
        }
        txn.commit()?;
        Ok(acquired)
    }

    async fn unlock_job(&self, job_id: H256) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(LOCKS_TABLE)?;
            table.remove(job_id.as_bytes())?;
        }
        txn.commit()?;
        Ok(())
    }

    async fn get_cached_outcome(
        &self,
        job_id: H256,
        now: u64,
    ) -> Result<Option<JobOutcome>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(OUTCOMES_TABLE)?;
        let Some(raw) = table.get(job_id.as_bytes())? else {
            return Ok(None);
        };
        let (expiry, outcome): (u64, JobOutcome) = bincode::deserialize(raw.value())?;
        if expiry > now {
            Ok(Some(outcome))
        } else {
            Ok(None)
        }
    }

    async fn cache_outcome(
        &self,
        job_id: H256,
        outcome: JobOutcome,
        ttl: u64,
        now: u64,
    ) -> Result<(), StoreError> {
        let encoded = bincode::serialize(&(now + ttl, outcome))?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(OUTCOMES_TABLE)?;
            table.insert(job_id.as_bytes(), encoded.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    async fn put_intent_if_absent(&self, intent: CompletionIntent) -> Result<bool, StoreError> {
        let txn = self.db.begin_write()?;
        let inserted;
        {
            let mut table = txn.open_table(INTENTS_TABLE)?;
            let existing = match table.get(intent.job_id.as_bytes())? {
                Some(raw) => Some(bincode::deserialize::<CompletionIntent>(raw.value())?),
                None => None,
            };
            inserted = match existing {
                Some(existing) if !existing.is_terminal() => false,
                _ => {
                    table.insert(
                        intent.job_id.as_bytes(),
                        bincode::serialize(&intent)?.as_slice(),
                    )?;
                    true
                }
            };
        }
        txn.commit()?;
        Ok(inserted)
    }

    async fn get_intent(&self, job_id: H256) -> Result<Option<CompletionIntent>, StoreError> {
        self.read_intent(job_id)
    }

    async fn claim_due_intents(
        &self,
        now: u64,
        lease: u64,
    ) -> Result<Vec<CompletionIntent>, StoreError> {
        let txn = self.db.begin_write()?;
        let mut claimed = Vec::new();
        {
            let mut table = txn.open_table(INTENTS_TABLE)?;

            let mut due = Vec::new();
            for entry in table.iter()? {
                let (_, raw) = entry?;
                let intent: CompletionIntent = bincode::deserialize(raw.value())?;
                let claimable = matches!(
                    intent.state,
                    IntentState::Pending | IntentState::InFlight
                ) && intent.next_attempt_at <= now;
                if claimable {
                    due.push(intent);
                }
            }

            for mut intent in due {
                intent.state = IntentState::InFlight;
                intent.next_attempt_at = now + lease;
                table.insert(
                    intent.job_id.as_bytes(),
                    bincode::serialize(&intent)?.as_slice(),
                )?;
                claimed.push(intent);
            }
        }
        txn.commit()?;
        Ok(claimed)
    }

    async fn mark_intent_succeeded(&self, job_id: H256) -> Result<(), StoreError> {
        self.update_intent(job_id, |intent| intent.state = IntentState::Succeeded)
    }

    async fn reschedule_intent(
        &self,
        job_id: H256,
        attempts: u32,
        next_attempt_at: u64,
    ) -> Result<(), StoreError> {
        self.update_intent(job_id, |intent| {
            intent.state = IntentState::Pending;
            intent.attempts = attempts;
            intent.next_attempt_at = next_attempt_at;
        })
    }

    async fn mark_intent_failed(&self, job_id: H256) -> Result<(), StoreError> {
        self.update_intent(job_id, |intent| {
            intent.state = IntentState::PermanentlyFailed
        })
    }
}

impl Debug for RedBStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedB Store").finish()
    }
}
