use std::time::Duration;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use tracing::{debug, warn};

use blobgate_common::types::{BlobTransaction, BlobsBundle, Eip1559Transaction};
use blobgate_signer::Signer;

use crate::errors::{EthClientError, GetTransactionReceiptError};
use crate::fee_oracle::FeeParams;
use crate::types::{EstimateGasRequest, RpcReceipt};
use crate::EthClient;

/// Gas limit used when `eth_estimateGas` is unavailable.
pub const FALLBACK_GAS_LIMIT: u64 = 200_000;

/// Percent bump applied on top of the node's gas estimate.
pub const GAS_ESTIMATE_BUMP_PERCENT: u64 = 10;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Optional overrides for transaction building. Unset fields are resolved
/// from the network.
#[derive(Default, Clone, Debug)]
pub struct Overrides {
    pub nonce: Option<u64>,
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u64>,
    pub max_priority_fee_per_gas: Option<u64>,
}

impl EthClient {
    /// Assembles an unsigned Type-3 transaction for the given sidecar bundle.
    ///
    /// Blob transactions carry no calldata and no target: the payload is the
    /// sidecar itself, so `to` is the zero address and `value` is zero.
    pub async fn build_blob_transaction(
        &self,
        from: Address,
        chain_id: u64,
        bundle: &BlobsBundle,
        fees: &FeeParams,
        overrides: Overrides,
    ) -> Result<BlobTransaction, EthClientError> {
        let nonce = match overrides.nonce {
            Some(nonce) => nonce,
            None => self.get_nonce(from).await?,
        };

        let mut tx = BlobTransaction {
            chain_id,
            nonce,
            max_priority_fee_per_gas: overrides
                .max_priority_fee_per_gas
                .unwrap_or(fees.max_priority_fee_per_gas),
            max_fee_per_gas: overrides.max_fee_per_gas.unwrap_or(fees.max_fee_per_gas),
            gas_limit: 0,
            to: Address::zero(),
            value: U256::zero(),
            data: Bytes::new(),
            access_list: vec![],
            max_fee_per_blob_gas: fees.max_fee_per_blob_gas,
            blob_versioned_hashes: bundle.generate_versioned_hashes(),
            ..Default::default()
        };

        tx.gas_limit = match overrides.gas_limit {
            Some(gas) => gas,
            None => self.estimate_gas_for_blob_tx(from, &tx).await,
        };

        Ok(tx)
    }

    /// Estimates gas for a blob transaction, falling back to a fixed limit
    /// when the node cannot estimate (some providers reject estimation for
    /// type-3 payloads outright).
    async fn estimate_gas_for_blob_tx(&self, from: Address, tx: &BlobTransaction) -> u64 {
        let request = EstimateGasRequest {
            from,
            to: tx.to,
            value: tx.value,
            input: tx.data.clone(),
            nonce: Some(tx.nonce),
            blob_versioned_hashes: tx.blob_versioned_hashes.clone(),
            blobs: vec![],
        };
        match self.estimate_gas(request).await {
            Ok(estimated) => estimated * (100 + GAS_ESTIMATE_BUMP_PERCENT) / 100,
            Err(error) => {
                warn!(%error, "gas estimation failed, using the fallback limit");
                FALLBACK_GAS_LIMIT
            }
        }
    }

    /// Signs the transaction and broadcasts its network form (sidecar
    /// included). Returns the transaction hash reported by the node.
    pub async fn send_blob_transaction(
        &self,
        tx: &mut BlobTransaction,
        bundle: &BlobsBundle,
        signer: &Signer,
    ) -> Result<H256, EthClientError> {
        signer.sign_blob_transaction(tx).await?;

        let encoded = tx.encode_network_to_vec(bundle);
        let tx_hash = self.send_raw_transaction(&encoded).await?;
        debug!(%tx_hash, "blob transaction broadcast");

        Ok(tx_hash)
    }

    /// Assembles an unsigned EIP-1559 call transaction.
    pub async fn build_eip1559_transaction(
        &self,
        to: Address,
        from: Address,
        calldata: Bytes,
        chain_id: u64,
        overrides: Overrides,
    ) -> Result<Eip1559Transaction, EthClientError> {
        let nonce = match overrides.nonce {
            Some(nonce) => nonce,
            None => self.get_nonce(from).await?,
        };
        let max_priority_fee_per_gas = match overrides.max_priority_fee_per_gas {
            Some(fee) => fee,
            None => u256_to_u64(self.get_max_priority_fee().await?)?,
        };
        let max_fee_per_gas = match overrides.max_fee_per_gas {
            Some(fee) => fee,
            None => u256_to_u64(self.get_gas_price().await?)?,
        };

        let mut tx = Eip1559Transaction {
            chain_id,
            nonce,
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit: 0,
            to,
            value: U256::zero(),
            data: calldata,
            access_list: vec![],
            ..Default::default()
        };

        tx.gas_limit = match overrides.gas_limit {
            Some(gas) => gas,
            None => {
                let request = EstimateGasRequest {
                    from,
                    to,
                    value: tx.value,
                    input: tx.data.clone(),
                    nonce: Some(nonce),
                    ..Default::default()
                };
                match self.estimate_gas(request).await {
                    Ok(estimated) => estimated * (100 + GAS_ESTIMATE_BUMP_PERCENT) / 100,
                    Err(error) => {
                        warn!(%error, "gas estimation failed, using the fallback limit");
                        FALLBACK_GAS_LIMIT
                    }
                }
            }
        };

        Ok(tx)
    }

    pub async fn send_eip1559_transaction(
        &self,
        tx: &mut Eip1559Transaction,
        signer: &Signer,
    ) -> Result<H256, EthClientError> {
        signer.sign_eip1559_transaction(tx).await?;

        let encoded = tx.encode_canonical_to_vec();
        self.send_raw_transaction(&encoded).await
    }

    /// Polls for the transaction receipt until it appears or the timeout
    /// elapses.
    pub async fn wait_for_transaction_receipt(
        &self,
        tx_hash: H256,
        timeout: Duration,
    ) -> Result<RpcReceipt, EthClientError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(receipt) = self.get_transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            if tokio::time::Instant::now() + RECEIPT_POLL_INTERVAL > deadline {
                return Err(GetTransactionReceiptError::ConfirmationTimeout(tx_hash).into());
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}

fn u256_to_u64(value: U256) -> Result<u64, EthClientError> {
    value
        .try_into()
        .map_err(|_| EthClientError::Custom("fee does not fit into a u64".to_owned()))
}
