mod blobs_bundle;
mod job;
mod transaction;

pub use blobs_bundle::{
    blob_from_bytes, payload_from_blob, Blob, BlobCodecError, BlobsBundle, BlobsBundleError,
    Commitment, Proof,
};
pub use job::{BlobMeta, BlobMetaError, BlobReceipt, CompletionIntent, IntentState, Job, JobOutcome};
pub use transaction::{BlobTransaction, Eip1559Transaction, TxType, TxVersion};
