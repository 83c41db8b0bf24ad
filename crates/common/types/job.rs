use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::serde_utils;

/// On-chain escrow job record, as returned by `getJob(bytes32)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Job {
    pub user: Address,
    pub amount: U256,
    pub completed: bool,
    pub timestamp: u64,
    pub blob_tx_hash: H256,
}

impl Job {
    /// The escrow returns a zeroed record for unknown job ids.
    pub fn exists(&self) -> bool {
        !self.user.is_zero()
    }
}

pub const MAX_APP_ID_LENGTH: usize = 50;
pub const MAX_TAGS: usize = 10;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BlobMetaError {
    #[error("appId must be between 1 and {MAX_APP_ID_LENGTH} characters")]
    InvalidAppId,
    #[error("contentHash must be a 32-byte hex digest")]
    InvalidContentHash,
    #[error("at most {MAX_TAGS} tags are allowed")]
    TooManyTags,
}

/// Client-supplied metadata accompanying a payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMeta {
    pub app_id: String,
    #[serde(default)]
    pub codec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_blocks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl BlobMeta {
    pub fn validate(&self) -> Result<(), BlobMetaError> {
        if self.app_id.is_empty() || self.app_id.len() > MAX_APP_ID_LENGTH {
            return Err(BlobMetaError::InvalidAppId);
        }
        if let Some(content_hash) = &self.content_hash {
            let stripped = content_hash.strip_prefix("0x").unwrap_or(content_hash);
            if stripped.len() != 64 || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(BlobMetaError::InvalidContentHash);
            }
        }
        if self.tags.len() > MAX_TAGS {
            return Err(BlobMetaError::TooManyTags);
        }
        Ok(())
    }
}

/// Returned to the client after a successful blob submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobReceipt {
    pub job_id: H256,
    pub blob_tx_hash: H256,
    pub block_number: u64,
    pub blob_versioned_hash: H256,
    #[serde(with = "serde_utils::bytes48")]
    pub commitment: [u8; 48],
    #[serde(with = "serde_utils::bytes48_vec")]
    pub proofs: Vec<[u8; 48]>,
    pub blob_index: u64,
    pub meta: BlobMeta,
}

/// Cached terminal outcome of a job submission, served to retrying clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Completed(Box<BlobReceipt>),
    Rejected { error: String, message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentState {
    Pending,
    InFlight,
    Succeeded,
    PermanentlyFailed,
}

/// Durable record of the obligation to call `completeJob` on-chain after a
/// successful blob broadcast. At most one non-terminal intent exists per job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionIntent {
    pub job_id: H256,
    pub blob_tx_hash: H256,
    pub created_at: u64,
    pub attempts: u32,
    pub next_attempt_at: u64,
    pub state: IntentState,
}

impl CompletionIntent {
    pub fn new(job_id: H256, blob_tx_hash: H256, now: u64) -> Self {
        Self {
            job_id,
            blob_tx_hash,
            created_at: now,
            attempts: 0,
            next_attempt_at: now,
            state: IntentState::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            IntentState::Succeeded | IntentState::PermanentlyFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> BlobMeta {
        BlobMeta {
            app_id: "demo-app".to_string(),
            codec: "application/octet-stream".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn meta_validation() {
        assert!(meta().validate().is_ok());

        let mut invalid = meta();
        invalid.app_id = String::new();
        assert_eq!(invalid.validate(), Err(BlobMetaError::InvalidAppId));

        let mut invalid = meta();
        invalid.app_id = "x".repeat(MAX_APP_ID_LENGTH + 1);
        assert_eq!(invalid.validate(), Err(BlobMetaError::InvalidAppId));

        let mut invalid = meta();
        invalid.content_hash = Some("abcd".to_string());
        assert_eq!(invalid.validate(), Err(BlobMetaError::InvalidContentHash));

        let mut valid = meta();
        valid.content_hash = Some(format!("0x{}", "ab".repeat(32)));
        assert!(valid.validate().is_ok());

        let mut invalid = meta();
        invalid.tags = (0..=MAX_TAGS).map(|i| i.to_string()).collect();
        assert_eq!(invalid.validate(), Err(BlobMetaError::TooManyTags));
    }

    #[test]
    fn receipt_serializes_camel_case() {
        let receipt = BlobReceipt {
            job_id: H256::repeat_byte(1),
            blob_tx_hash: H256::repeat_byte(2),
            block_number: 10,
            blob_versioned_hash: H256::repeat_byte(3),
            commitment: [0u8; 48],
            proofs: vec![[0u8; 48]],
            blob_index: 0,
            meta: meta(),
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert!(json.get("blobTxHash").is_some());
        assert!(json.get("blobVersionedHash").is_some());
        assert!(json.get("blockNumber").is_some());

        let back: BlobReceipt = serde_json::from_value(json).unwrap();
        assert_eq!(back, receipt);
    }

    #[test]
    fn job_existence_tracks_user() {
        assert!(!Job::default().exists());
        let job = Job {
            user: Address::repeat_byte(9),
            ..Default::default()
        };
        assert!(job.exists());
    }
}
