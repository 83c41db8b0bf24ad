use std::time::Duration;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use tracing::{debug, info};

use blobgate_common::calldata::{encode_calldata, Value};
use blobgate_common::types::Job;
use blobgate_rpc::errors::EthClientError;
use blobgate_rpc::eth_sender::Overrides;
use blobgate_rpc::EthClient;
use blobgate_signer::Signer;

use crate::errors::{truncate_rpc_error, ProxyError};

const GET_JOB_SIGNATURE: &str = "getJob(bytes32)";
const JOB_TIMEOUT_SIGNATURE: &str = "jobTimeout()";
const IS_PROXY_AUTHORIZED_SIGNATURE: &str = "isProxyAuthorized(address)";
const AUTHORIZED_PROXIES_SIGNATURE: &str = "authorizedProxies(address)";
const COMPLETE_JOB_SIGNATURE: &str = "completeJob(bytes32,bytes32,bytes)";

#[derive(Debug, thiserror::Error)]
pub enum EscrowError {
    #[error(transparent)]
    Client(#[from] EthClientError),
    #[error("failed to decode escrow response: {0}")]
    Decode(String),
    #[error("completion transaction {0:#x} reverted")]
    CompletionReverted(H256),
}

impl EscrowError {
    /// The escrow rejects replayed claims for a finished job; a second
    /// `completeJob` for it is a no-op, not a failure.
    pub fn is_already_completed(&self) -> bool {
        let message = self.to_string().to_lowercase();
        message.contains("already") && message.contains("complet")
    }
}

impl From<EscrowError> for ProxyError {
    fn from(value: EscrowError) -> Self {
        ProxyError::UpstreamUnavailable(truncate_rpc_error(&value.to_string()))
    }
}

/// Read and write access to the escrow contract.
///
/// A trait so the coordinator and the retry queue can be exercised against a
/// scripted escrow in tests.
#[async_trait::async_trait]
pub trait EscrowApi: Send + Sync {
    async fn get_job(&self, job_id: H256) -> Result<Job, EscrowError>;
    async fn job_timeout(&self) -> Result<u64, EscrowError>;
    async fn is_proxy_authorized(&self, proxy: Address) -> Result<bool, EscrowError>;
    /// Claims payment for a submitted blob. Returns the completion
    /// transaction hash once it is included with success status.
    async fn complete_job(&self, job_id: H256, blob_tx_hash: H256) -> Result<H256, EscrowError>;
}

/// Escrow contract binding over JSON-RPC.
#[derive(Debug, Clone)]
pub struct EscrowClient {
    client: EthClient,
    address: Address,
    signer: Signer,
    chain_id: u64,
    tx_timeout: Duration,
}

impl EscrowClient {
    pub fn new(
        client: EthClient,
        address: Address,
        signer: Signer,
        chain_id: u64,
        tx_timeout: Duration,
    ) -> Self {
        Self {
            client,
            address,
            signer,
            chain_id,
            tx_timeout,
        }
    }

    async fn call(&self, signature: &str, values: &[Value]) -> Result<Vec<u8>, EscrowError> {
        let calldata = encode_calldata(signature, values)
            .map_err(|error| EscrowError::Decode(error.to_string()))?;
        let response = self.client.call(self.address, &calldata).await?;
        decode_hex_response(&response)
    }
}

#[async_trait::async_trait]
impl EscrowApi for EscrowClient {
    async fn get_job(&self, job_id: H256) -> Result<Job, EscrowError> {
        let words = self
            .call(
                GET_JOB_SIGNATURE,
                &[Value::FixedBytes(Bytes::copy_from_slice(
                    job_id.as_bytes(),
                ))],
            )
            .await?;

        decode_job(&words)
    }

    async fn job_timeout(&self) -> Result<u64, EscrowError> {
        let words = self.call(JOB_TIMEOUT_SIGNATURE, &[]).await?;
        let value = decode_word(&words, 0)?;
        value
            .try_into()
            .map_err(|_| EscrowError::Decode("jobTimeout does not fit a u64".to_owned()))
    }

    async fn is_proxy_authorized(&self, proxy: Address) -> Result<bool, EscrowError> {
        // Legacy escrow deployments only expose the public mapping, so a
        // failing selector falls through to `authorizedProxies(address)`.
        let result = self
            .call(IS_PROXY_AUTHORIZED_SIGNATURE, &[Value::Address(proxy)])
            .await;

        let words = match result {
            Ok(words) => words,
            Err(EscrowError::Client(error)) => {
                debug!(%error, "isProxyAuthorized failed, falling back to authorizedProxies");
                self.call(AUTHORIZED_PROXIES_SIGNATURE, &[Value::Address(proxy)])
                    .await?
            }
            Err(error) => return Err(error),
        };

        Ok(!decode_word(&words, 0)?.is_zero())
    }

    async fn complete_job(&self, job_id: H256, blob_tx_hash: H256) -> Result<H256, EscrowError> {
        let calldata = encode_calldata(
            COMPLETE_JOB_SIGNATURE,
            &[
                Value::FixedBytes(Bytes::copy_from_slice(job_id.as_bytes())),
                Value::FixedBytes(Bytes::copy_from_slice(blob_tx_hash.as_bytes())),
                // the escrow validates the claim against its own record
                Value::Bytes(Bytes::new()),
            ],
        )
        .map_err(|error| EscrowError::Decode(error.to_string()))?;

        let mut tx = self
            .client
            .build_eip1559_transaction(
                self.address,
                self.signer.address(),
                calldata.into(),
                self.chain_id,
                Overrides::default(),
            )
            .await?;

        let tx_hash = self
            .client
            .send_eip1559_transaction(&mut tx, &self.signer)
            .await?;
        debug!(%tx_hash, %job_id, "completion call broadcast");

        let receipt = self
            .client
            .wait_for_transaction_receipt(tx_hash, self.tx_timeout)
            .await?;
        if !receipt.succeeded() {
            return Err(EscrowError::CompletionReverted(tx_hash));
        }

        info!(%job_id, %tx_hash, "job completion claimed");
        Ok(tx_hash)
    }
}

fn decode_hex_response(response: &str) -> Result<Vec<u8>, EscrowError> {
    let stripped = response.strip_prefix("0x").unwrap_or(response);
    hex::decode(stripped).map_err(|error| EscrowError::Decode(error.to_string()))
}

fn decode_word(words: &[u8], index: usize) -> Result<U256, EscrowError> {
    let start = index * 32;
    words
        .get(start..start + 32)
        .map(U256::from_big_endian)
        .ok_or_else(|| EscrowError::Decode(format!("response shorter than {} words", index + 1)))
}

/// Decodes the `(address user, uint256 amount, bool completed,
/// uint256 timestamp, bytes32 blobTxHash)` tuple.
fn decode_job(words: &[u8]) -> Result<Job, EscrowError> {
    let user = Address::from_slice(
        words
            .get(12..32)
            .ok_or_else(|| EscrowError::Decode("getJob response too short".to_owned()))?,
    );
    let amount = decode_word(words, 1)?;
    let completed = !decode_word(words, 2)?.is_zero();
    let timestamp = decode_word(words, 3)?
        .try_into()
        .map_err(|_| EscrowError::Decode("job timestamp does not fit a u64".to_owned()))?;
    let blob_tx_hash = H256::from_slice(
        words
            .get(128..160)
            .ok_or_else(|| EscrowError::Decode("getJob response too short".to_owned()))?,
    );

    Ok(Job {
        user,
        amount,
        completed,
        timestamp,
        blob_tx_hash,
    })
}
