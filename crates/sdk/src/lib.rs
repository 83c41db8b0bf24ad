//! Direct blob submission for senders that pay their own gas: the same
//! encode / commit / sign / broadcast pipeline the proxy drives, minus the
//! escrow bookkeeping.

use std::time::Duration;

use bytes::Bytes;
use ethereum_types::H256;
use tracing::info;

use blobgate_common::kzg::KzgBackend;
use blobgate_common::types::{
    blob_from_bytes, BlobCodecError, BlobMeta, BlobReceipt, BlobsBundle, BlobsBundleError,
    TxVersion,
};
use blobgate_rpc::errors::EthClientError;
use blobgate_rpc::eth_sender::Overrides;
use blobgate_rpc::{EthClient, FeeOracle};
use blobgate_signer::Signer;

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error(transparent)]
    Codec(#[from] BlobCodecError),
    #[error(transparent)]
    Bundle(#[from] BlobsBundleError),
    #[error(transparent)]
    Client(#[from] EthClientError),
    #[error("transaction {0:#x} reverted")]
    TransactionReverted(H256),
    #[error("{0}")]
    Internal(String),
}

/// Self-custodial blob writer.
pub struct BlobClient {
    client: EthClient,
    oracle: FeeOracle,
    signer: Signer,
    kzg: KzgBackend,
    chain_id: u64,
    tx_timeout: Duration,
}

impl BlobClient {
    pub fn new(
        client: EthClient,
        signer: Signer,
        chain_id: u64,
        eip7918: bool,
        tx_timeout: Duration,
    ) -> Self {
        let oracle = FeeOracle::new(client.clone(), eip7918);
        Self {
            client,
            oracle,
            signer,
            kzg: KzgBackend::initialize(),
            chain_id,
            tx_timeout,
        }
    }

    /// Packs the payload into a blob, broadcasts it and waits for inclusion.
    pub async fn submit_blob(
        &self,
        payload: Bytes,
        meta: BlobMeta,
        version: TxVersion,
    ) -> Result<BlobReceipt, SdkError> {
        let kzg = self.kzg;
        let bundle = tokio::task::spawn_blocking(move || -> Result<BlobsBundle, SdkError> {
            let blob = blob_from_bytes(payload)?;
            Ok(BlobsBundle::create_from_blobs(&kzg, &[blob], version)?)
        })
        .await
        .map_err(|error| SdkError::Internal(error.to_string()))??;

        let blob_versioned_hash = bundle
            .generate_versioned_hashes()
            .first()
            .copied()
            .ok_or_else(|| SdkError::Internal("bundle has no blobs".to_owned()))?;
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

        let tx_hash = self
            .client
            .send_blob_transaction(&mut tx, &bundle, &self.signer)
            .await?;

        let receipt = self
            .client
            .wait_for_transaction_receipt(tx_hash, self.tx_timeout)
            .await?;
        if !receipt.succeeded() {
            return Err(SdkError::TransactionReverted(tx_hash));
        }

        info!(%tx_hash, block = receipt.block_number, "blob included");

        Ok(BlobReceipt {
            job_id: H256::zero(),
            blob_tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            blob_versioned_hash,
            commitment: bundle
                .commitments
                .first()
                .copied()
                .ok_or_else(|| SdkError::Internal("bundle has no commitments".to_owned()))?,
            proofs: bundle.proofs.clone(),
            blob_index: 0,
            meta,
        })
    }
}
