use std::str::FromStr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use ethereum_types::{Address, H256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use blobgate_common::base64;
use blobgate_common::constants::BYTES_PER_BLOB;
use blobgate_common::serde_utils;
use blobgate_common::types::{BlobMeta, BlobReceipt, TxVersion};
use blobgate_rpc::EthClient;

use crate::coordinator::{Coordinator, SubmitJobRequest};
use crate::errors::ProxyError;

#[derive(Clone)]
pub struct ApiContext {
    pub coordinator: Arc<Coordinator>,
    pub eth_client: EthClient,
    pub chain_id: u64,
    pub escrow_contract: Address,
    pub proxy_fee_percent: u8,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub job_id: String,
    pub payment_tx_hash: String,
    /// base64-encoded payload bytes
    pub payload: String,
    /// base64-encoded 65-byte signature over the payload
    pub signature: String,
    pub meta: BlobMeta,
    #[serde(default)]
    pub version: TxVersion,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    pub success: bool,
    pub blob_tx_hash: H256,
    pub block_number: u64,
    pub blob_hash: H256,
    #[serde(with = "serde_utils::bytes48")]
    pub commitment: [u8; 48],
    #[serde(with = "serde_utils::bytes48_vec")]
    pub proofs: Vec<[u8; 48]>,
    pub blob_index: u64,
    /// Set once the completion retry queue lands the on-chain claim; the
    /// reply is produced before that happens.
    pub completion_tx_hash: Option<H256>,
}

impl From<BlobReceipt> for WriteResponse {
    fn from(receipt: BlobReceipt) -> Self {
        Self {
            success: true,
            blob_tx_hash: receipt.blob_tx_hash,
            block_number: receipt.block_number,
            blob_hash: receipt.blob_versioned_hash,
            commitment: receipt.commitment,
            proofs: receipt.proofs,
            blob_index: receipt.blob_index,
            completion_tx_hash: None,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

pub fn router(context: ApiContext) -> Router {
    // All request headers, methods and origins allowed.
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/v1/blob/write", post(handle_blob_write))
        .route("/api/v1/health", get(handle_health))
        .layer(cors)
        .with_state(context)
}

/// Binds the listener and serves until `shutdown` resolves. In-flight
/// submissions keep their connections during the drain window.
pub async fn start_api(
    http_addr: &str,
    context: ApiContext,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(http_addr).await?;
    info!("Starting HTTP server at {http_addr}");

    axum::serve(listener, router(context))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn handle_blob_write(
    State(context): State<ApiContext>,
    Json(request): Json<WriteRequest>,
) -> Result<Json<WriteResponse>, ProxyError> {
    let request = parse_write_request(request)?;
    let receipt = context.coordinator.submit_job(request).await?;
    Ok(Json(receipt.into()))
}

fn parse_write_request(request: WriteRequest) -> Result<SubmitJobRequest, ProxyError> {
    let job_id = parse_hash(&request.job_id, "jobId")?;
    let payment_tx_hash = parse_hash(&request.payment_tx_hash, "paymentTxHash")?;

    let payload = base64::decode(&request.payload)
        .map_err(|error| ProxyError::ValidationFailed(format!("payload: {error}")))?;
    let signature = base64::decode(&request.signature)
        .map_err(|error| ProxyError::ValidationFailed(format!("signature: {error}")))?;

    Ok(SubmitJobRequest {
        job_id,
        payment_tx_hash,
        payload: payload.into(),
        signature: signature.into(),
        meta: request.meta,
        version: request.version,
    })
}

fn parse_hash(value: &str, field: &str) -> Result<H256, ProxyError> {
    H256::from_str(value.strip_prefix("0x").unwrap_or(value))
        .map_err(|_| ProxyError::ValidationFailed(format!("{field} must be a 32-byte hex hash")))
}

async fn handle_health(State(context): State<ApiContext>) -> Json<Value> {
    let status = match context.eth_client.get_chain_id().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Json(json!({
        "status": status,
        "chainId": context.chain_id,
        "escrowContract": format!("{:#x}", context.escrow_contract),
        "proxyFeePercent": context.proxy_fee_percent,
        "maxBlobSize": BYTES_PER_BLOB,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn parses_hashes_with_and_without_prefix() {
        let hex = "11".repeat(32);
        assert!(parse_hash(&hex, "jobId").is_ok());
        assert!(parse_hash(&format!("0x{hex}"), "jobId").is_ok());
        assert!(matches!(
            parse_hash("0x1234", "jobId"),
            Err(ProxyError::ValidationFailed(_))
        ));
    }

    #[test]
    fn write_request_round_trips_through_parsing() {
        let request = WriteRequest {
            job_id: format!("0x{}", "22".repeat(32)),
            payment_tx_hash: "33".repeat(32),
            payload: base64::encode(b"hello blob"),
            signature: base64::encode(&[7u8; 65]),
            meta: BlobMeta {
                app_id: "demo".to_owned(),
                ..Default::default()
            },
            version: TxVersion::Eip4844,
        };

        let parsed = parse_write_request(request).unwrap();
        assert_eq!(parsed.job_id, H256::repeat_byte(0x22));
        assert_eq!(parsed.payload.as_ref(), b"hello blob");
        assert_eq!(parsed.signature.len(), 65);
    }

    #[test]
    fn bad_base64_is_a_validation_error() {
        let request = WriteRequest {
            job_id: "22".repeat(32),
            payment_tx_hash: "33".repeat(32),
            payload: "!!!".to_owned(),
            signature: base64::encode(&[7u8; 65]),
            meta: BlobMeta {
                app_id: "demo".to_owned(),
                ..Default::default()
            },
            version: TxVersion::Eip4844,
        };
        assert!(matches!(
            parse_write_request(request),
            Err(ProxyError::ValidationFailed(_))
        ));
    }

    #[test]
    fn error_body_carries_the_stable_code() {
        let response = ProxyError::JobInFlight.into_response();
        assert_eq!(response.status(), StatusCode::LOCKED);
    }
}
