use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace, warn};

use ethereum_types::{Address, H256, U256};

use crate::errors::{
    CallError, EstimateGasError, EthClientError, GetBlockByNumberError, GetChainIdError,
    GetFeeHistoryError, GetGasPriceError, GetMaxPriorityFeeError, GetNonceError,
    GetTransactionReceiptError, SendRawTransactionError,
};
use crate::types::{EstimateGasRequest, FeeHistory, RpcBlock, RpcReceipt};
use crate::utils::{RpcErrorResponse, RpcRequest, RpcRequestId, RpcSuccessResponse};

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum RpcResponse {
    Success(RpcSuccessResponse),
    Error(RpcErrorResponse),
}

/// JSON-RPC client over one or more execution-layer endpoints.
///
/// Requests are tried against each URL in order until one succeeds; servers
/// that answer with a JSON-RPC error are skipped the same way as unreachable
/// ones, since public endpoints routinely lack individual methods.
#[derive(Debug, Clone)]
pub struct EthClient {
    client: Client,
    pub urls: Vec<Url>,
}

impl EthClient {
    pub fn new(url: &str) -> Result<EthClient, EthClientError> {
        Self::new_with_urls(vec![url.to_string()])
    }

    pub fn new_with_urls(urls: Vec<String>) -> Result<EthClient, EthClientError> {
        let urls = urls
            .iter()
            .map(|url| {
                Url::parse(url)
                    .map_err(|_| EthClientError::ParseUrlError(format!("failed to parse {url}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            client: Client::new(),
            urls,
        })
    }

    /// Send a request to the RPC. Tries each URL until one succeeds.
    pub async fn send_request(&self, request: RpcRequest) -> Result<RpcResponse, EthClientError> {
        let mut response = Err(EthClientError::FailedAllRPC);

        for url in self.urls.iter() {
            response = self.send_request_to_url(url, &request).await;
            match &response {
                Ok(RpcResponse::Success(_)) => {
                    debug!(endpoint = %url, "RPC request successful");
                    return response;
                }
                Ok(RpcResponse::Error(err)) => {
                    debug!(endpoint = %url, error = ?err.error, "RPC server returned an error");
                }
                Err(error) => {
                    warn!(endpoint = %url, %error, "Could not request RPC server");
                }
            }
        }

        response
    }

    /// Send a request to **all** RPC URLs.
    ///
    /// Return the first successful response, or the last error if all fail.
    /// Used for broadcasts, where reaching more of the network is strictly
    /// better.
    async fn send_request_to_all(
        &self,
        request: RpcRequest,
    ) -> Result<RpcResponse, EthClientError> {
        let mut response = Err(EthClientError::FailedAllRPC);

        for url in self.urls.iter() {
            let maybe_response = self.send_request_to_url(url, &request).await;

            match &maybe_response {
                Ok(RpcResponse::Success(_)) => {
                    debug!(endpoint = %url, "RPC request successful");
                }
                Ok(RpcResponse::Error(err)) => {
                    debug!(endpoint = %url, error = ?err.error, "RPC server returned an error");
                }
                Err(error) => {
                    warn!(endpoint = %url, %error, "Could not request RPC server");
                }
            };

            response = response.or(maybe_response);
        }

        response
    }

    async fn send_request_to_url(
        &self,
        rpc_url: &Url,
        request: &RpcRequest,
    ) -> Result<RpcResponse, EthClientError> {
        let id = uuid::Uuid::new_v4();
        trace!(endpoint = %rpc_url, ?request, %id, "Sending RPC request");

        self.client
            .post(rpc_url.as_str())
            .header("content-type", "application/json")
            .body(serde_json::ser::to_string(&request).map_err(|error| {
                EthClientError::FailedToSerializeRequestBody(format!("{error}: {request:?}"))
            })?)
            .send()
            .await
            .inspect(|_| trace!(endpoint = %rpc_url, %id, "Request finished successfully"))?
            .json::<RpcResponse>()
            .await
            .inspect_err(|err| trace!(endpoint = %rpc_url, %id, %err, "Failed to deserialize response"))
            .map_err(EthClientError::from)
    }

    fn next_id() -> RpcRequestId {
        RpcRequestId::Number(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn send_raw_transaction(&self, data: &[u8]) -> Result<H256, EthClientError> {
        let params = Some(vec![json!("0x".to_string() + &hex::encode(data))]);
        let request = RpcRequest::new(Self::next_id(), "eth_sendRawTransaction", params);

        match self.send_request_to_all(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(SendRawTransactionError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(SendRawTransactionError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn estimate_gas(
        &self,
        transaction: EstimateGasRequest,
    ) -> Result<u64, EthClientError> {
        let mut data = json!({
            "to": format!("{:#x}", transaction.to),
            "input": format!("0x{}", hex::encode(&transaction.input)),
            "from": format!("{:#x}", transaction.from),
            "value": format!("{:#x}", transaction.value),
        });

        let map = data.as_object_mut().ok_or_else(|| {
            EthClientError::from(EstimateGasError::Custom(
                "failed to mutate data in estimate_gas".to_owned(),
            ))
        })?;

        if !transaction.blob_versioned_hashes.is_empty() {
            let hashes: Vec<_> = transaction
                .blob_versioned_hashes
                .iter()
                .map(|hash| format!("{hash:#x}"))
                .collect();
            map.insert("blobVersionedHashes".to_owned(), json!(hashes));
        }

        if !transaction.blobs.is_empty() {
            let blobs: Vec<_> = transaction
                .blobs
                .iter()
                .map(|blob| format!("0x{}", hex::encode(blob)))
                .collect();
            map.insert("blobs".to_owned(), json!(blobs));
        }

        // Add the nonce just if present, otherwise the RPC will use the latest nonce
        if let Some(nonce) = transaction.nonce {
            map.insert("nonce".to_owned(), json!(format!("{nonce:#x}")));
        }

        let request = RpcRequest::new(
            Self::next_id(),
            "eth_estimateGas",
            Some(vec![data, json!("latest")]),
        );

        match self.send_request(request).await? {
            RpcResponse::Success(result) => {
                let res = serde_json::from_value::<String>(result.result)
                    .map_err(EstimateGasError::SerdeJSONError)?;
                let res = res.get(2..).ok_or(EstimateGasError::Custom(
                    "failed to slice index response in estimate_gas".to_owned(),
                ))?;
                u64::from_str_radix(res, 16)
            }
            .map_err(EstimateGasError::ParseIntError)
            .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(EstimateGasError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn call(&self, to: Address, calldata: &[u8]) -> Result<String, EthClientError> {
        let params = Some(vec![
            json!({
                "to": format!("{to:#x}"),
                "input": format!("0x{}", hex::encode(calldata)),
            }),
            json!("latest"),
        ]);
        let request = RpcRequest::new(Self::next_id(), "eth_call", params);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(CallError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(CallError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn get_nonce(&self, address: Address) -> Result<u64, EthClientError> {
        let params = Some(vec![json!(format!("{address:#x}")), json!("latest")]);
        let request = RpcRequest::new(Self::next_id(), "eth_getTransactionCount", params);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => u64::from_str_radix(
                serde_json::from_value::<String>(result.result)
                    .map_err(GetNonceError::SerdeJSONError)?
                    .get(2..)
                    .ok_or(EthClientError::Custom(
                        "failed to deserialize get_nonce response".to_owned(),
                    ))?,
                16,
            )
            .map_err(GetNonceError::ParseIntError)
            .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(GetNonceError::RPCError(error_response.error.message).into())
            }
        }
    }

    /// Fetches the latest block header fields (transaction bodies omitted).
    pub async fn get_latest_block(&self) -> Result<RpcBlock, EthClientError> {
        let params = Some(vec![json!("latest"), json!(false)]);
        let request = RpcRequest::new(Self::next_id(), "eth_getBlockByNumber", params);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(GetBlockByNumberError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(GetBlockByNumberError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn get_chain_id(&self) -> Result<U256, EthClientError> {
        let request = RpcRequest::new(Self::next_id(), "eth_chainId", None);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(GetChainIdError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(GetChainIdError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn get_max_priority_fee(&self) -> Result<U256, EthClientError> {
        let request = RpcRequest::new(Self::next_id(), "eth_maxPriorityFeePerGas", None);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(GetMaxPriorityFeeError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(GetMaxPriorityFeeError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn get_gas_price(&self) -> Result<U256, EthClientError> {
        let request = RpcRequest::new(Self::next_id(), "eth_gasPrice", None);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(GetGasPriceError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(GetGasPriceError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn get_fee_history(
        &self,
        block_count: u64,
    ) -> Result<FeeHistory, EthClientError> {
        let params = Some(vec![
            json!(format!("{block_count:#x}")),
            json!("latest"),
            json!([]),
        ]);
        let request = RpcRequest::new(Self::next_id(), "eth_feeHistory", params);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(GetFeeHistoryError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(GetFeeHistoryError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<RpcReceipt>, EthClientError> {
        let params = Some(vec![json!(format!("{tx_hash:#x}"))]);
        let request = RpcRequest::new(Self::next_id(), "eth_getTransactionReceipt", params);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(GetTransactionReceiptError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(GetTransactionReceiptError::RPCError(error_response.error.message).into())
            }
        }
    }
}
