use blobgate_signer::SignerError;

#[derive(Debug, thiserror::Error)]
pub enum EthClientError {
    #[error("failed to parse RPC url")]
    ParseUrlError(String),
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("failed to serialize request body: {0}")]
    FailedToSerializeRequestBody(String),
    #[error("all RPC endpoints failed")]
    FailedAllRPC,
    #[error("eth_sendRawTransaction request error: {0}")]
    SendRawTransactionError(#[from] SendRawTransactionError),
    #[error("eth_estimateGas request error: {0}")]
    EstimateGasError(#[from] EstimateGasError),
    #[error("eth_call request error: {0}")]
    CallError(#[from] CallError),
    #[error("eth_getTransactionCount request error: {0}")]
    GetNonceError(#[from] GetNonceError),
    #[error("eth_getBlockByNumber request error: {0}")]
    GetBlockByNumberError(#[from] GetBlockByNumberError),
    #[error("eth_chainId request error: {0}")]
    GetChainIdError(#[from] GetChainIdError),
    #[error("eth_maxPriorityFeePerGas request error: {0}")]
    GetMaxPriorityFeeError(#[from] GetMaxPriorityFeeError),
    #[error("eth_gasPrice request error: {0}")]
    GetGasPriceError(#[from] GetGasPriceError),
    #[error("eth_feeHistory request error: {0}")]
    GetFeeHistoryError(#[from] GetFeeHistoryError),
    #[error("eth_getTransactionReceipt request error: {0}")]
    GetTransactionReceiptError(#[from] GetTransactionReceiptError),
    #[error("signer error: {0}")]
    SignerError(#[from] SignerError),
    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SendRawTransactionError {
    #[error("deserialization error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("RPC error: {0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EstimateGasError {
    #[error("deserialization error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("parse int error: {0}")]
    ParseIntError(#[from] std::num::ParseIntError),
    #[error("RPC error: {0}")]
    RPCError(String),
    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("deserialization error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("RPC error: {0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetNonceError {
    #[error("deserialization error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("parse int error: {0}")]
    ParseIntError(#[from] std::num::ParseIntError),
    #[error("RPC error: {0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetBlockByNumberError {
    #[error("deserialization error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("RPC error: {0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetChainIdError {
    #[error("deserialization error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("RPC error: {0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetMaxPriorityFeeError {
    #[error("deserialization error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("RPC error: {0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetGasPriceError {
    #[error("deserialization error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("RPC error: {0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetFeeHistoryError {
    #[error("deserialization error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("RPC error: {0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetTransactionReceiptError {
    #[error("deserialization error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("RPC error: {0}")]
    RPCError(String),
    #[error("transaction {0:#x} was not included within the confirmation window")]
    ConfirmationTimeout(ethereum_types::H256),
}
