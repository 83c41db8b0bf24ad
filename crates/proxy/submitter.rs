use std::time::Duration;

use bytes::Bytes;
use ethereum_types::{H256, U256};
use tracing::{debug, info};

use blobgate_common::kzg::KzgBackend;
use blobgate_common::types::{
    blob_from_bytes, BlobCodecError, BlobMeta, BlobReceipt, BlobsBundle, TxVersion,
};
use blobgate_rpc::eth_sender::Overrides;
use blobgate_rpc::{EthClient, FeeOracle};
use blobgate_signer::Signer;

use crate::errors::{truncate_rpc_error, ProxyError};

/// Submission backend the coordinator drives. A trait so tests can script
/// outcomes and count broadcasts.
#[async_trait::async_trait]
pub trait BlobDispatch: Send + Sync {
    async fn submit_blob(
        &self,
        job_id: H256,
        payload: Bytes,
        meta: BlobMeta,
        version: TxVersion,
    ) -> Result<BlobReceipt, ProxyError>;

    /// Worst-case wei cost of a submission with `blob_count` blobs, checked
    /// against the escrow deposit before any blob work starts.
    async fn estimated_cost(&self, blob_count: u64) -> Result<U256, ProxyError>;
}

/// Builds, signs, broadcasts and confirms Type-3 transactions.
#[derive(Debug, Clone)]
pub struct BlobTxEngine {
    client: EthClient,
    oracle: FeeOracle,
    signer: Signer,
    kzg: KzgBackend,
    chain_id: u64,
    tx_timeout: Duration,
}

impl BlobTxEngine {
    pub fn new(
        client: EthClient,
        oracle: FeeOracle,
        signer: Signer,
        kzg: KzgBackend,
        chain_id: u64,
        tx_timeout: Duration,
    ) -> Self {
        Self {
            client,
            oracle,
            signer,
            kzg,
            chain_id,
            tx_timeout,
        }
    }

    /// Blob packing and KZG proving are CPU-bound; keep them off the
    /// executor threads.
    async fn build_bundle(
        &self,
        payload: Bytes,
        version: TxVersion,
    ) -> Result<BlobsBundle, ProxyError> {
        let kzg = self.kzg;
        tokio::task::spawn_blocking(move || {
            let blob = blob_from_bytes(payload).map_err(codec_error)?;
            BlobsBundle::create_from_blobs(&kzg, &[blob], version)
                .map_err(|error| ProxyError::Internal(error.to_string()))
        })
        .await
        .map_err(|error| ProxyError::Internal(error.to_string()))?
    }
}

fn codec_error(error: BlobCodecError) -> ProxyError {
    ProxyError::ValidationFailed(error.to_string())
}

#[async_trait::async_trait]
impl BlobDispatch for BlobTxEngine {
    async fn submit_blob(
        &self,
        job_id: H256,
        payload: Bytes,
        meta: BlobMeta,
        version: TxVersion,
    ) -> Result<BlobReceipt, ProxyError> {
        let bundle = self.build_bundle(payload, version).await?;
        let blob_versioned_hash = bundle
            .generate_versioned_hashes()
            .first()
            .copied()
            .ok_or_else(|| ProxyError::Internal("bundle has no blobs".to_owned()))?;

        let fees = self.oracle.fee_params(1).await?;
        let mut tx = self
            .client
            .build_blob_transaction(
                self.signer.address(),
                self.chain_id,
                &bundle,
                &fees,
                Overrides::default(),
            )
            .await?;

        debug!(
            %job_id,
            nonce = tx.nonce,
            max_fee_per_blob_gas = %tx.max_fee_per_blob_gas,
            "broadcasting blob transaction"
        );

        // From here on the transaction may already be in the mempool, so
        // every failure is a submission failure rather than a retryable
        // upstream problem.
        let tx_hash = self
            .client
            .send_blob_transaction(&mut tx, &bundle, &self.signer)
            .await
            .map_err(|error| {
                ProxyError::BlobSubmissionFailed(truncate_rpc_error(&error.to_string()))
            })?;

        let receipt = self
            .client
            .wait_for_transaction_receipt(tx_hash, self.tx_timeout)
            .await
            .map_err(|error| {
                ProxyError::BlobSubmissionFailed(truncate_rpc_error(&error.to_string()))
            })?;
        if !receipt.succeeded() {
            return Err(ProxyError::BlobSubmissionFailed(format!(
                "transaction {tx_hash:#x} reverted"
            )));
        }

        info!(%job_id, %tx_hash, block = receipt.block_number, "blob included");

        Ok(BlobReceipt {
            job_id,
            blob_tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            blob_versioned_hash,
            commitment: bundle
                .commitments
                .first()
                .copied()
                .ok_or_else(|| ProxyError::Internal("bundle has no commitments".to_owned()))?,
            proofs: bundle.proofs.clone(),
            blob_index: 0,
            meta,
        })
    }

    async fn estimated_cost(&self, blob_count: u64) -> Result<U256, ProxyError> {
        Ok(self.oracle.estimated_cost(blob_count).await?)
    }
}
