use axum::http::StatusCode;
use ethereum_types::U256;

use blobgate_rpc::errors::EthClientError;
use blobgate_signer::SignerError;
use blobgate_storage::error::StoreError;

/// Stable error contract of the proxy. Every failure that crosses a
/// component boundary is one of these kinds; the HTTP layer maps them to
/// status codes without further interpretation.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("{0}")]
    ValidationFailed(String),
    #[error("job does not exist in the escrow")]
    JobNotFound,
    #[error("job was already completed")]
    JobAlreadyCompleted,
    #[error("job timed out and is refundable")]
    JobExpired,
    #[error("payload signature does not recover the job owner")]
    SignatureMismatch,
    #[error("deposit of {available} wei does not cover the estimated cost of {required} wei")]
    InsufficientDeposit { required: U256, available: U256 },
    #[error("a submission for this job is already in flight")]
    JobInFlight,
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("blob submission failed: {0}")]
    BlobSubmissionFailed(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) => "ValidationFailed",
            Self::JobNotFound => "JobNotFound",
            Self::JobAlreadyCompleted => "JobAlreadyCompleted",
            Self::JobExpired => "JobExpired",
            Self::SignatureMismatch => "SignatureMismatch",
            Self::InsufficientDeposit { .. } => "InsufficientDeposit",
            Self::JobInFlight => "JobInFlight",
            Self::UpstreamUnavailable(_) => "UpstreamUnavailable",
            Self::BlobSubmissionFailed(_) => "BlobSubmissionFailed",
            Self::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            Self::JobNotFound => StatusCode::NOT_FOUND,
            Self::JobAlreadyCompleted => StatusCode::CONFLICT,
            Self::JobExpired => StatusCode::GONE,
            Self::SignatureMismatch => StatusCode::UNAUTHORIZED,
            Self::InsufficientDeposit { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::JobInFlight => StatusCode::LOCKED,
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::BlobSubmissionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Permanent failures are cached so client retries short-circuit without
    /// repeating blob work.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailed(_)
                | Self::SignatureMismatch
                | Self::JobExpired
                | Self::JobAlreadyCompleted
                | Self::JobNotFound
        )
    }

    /// Rebuilds the error kind cached in a negative result-cache entry.
    pub fn from_cached(code: &str, message: String) -> Self {
        match code {
            "ValidationFailed" => Self::ValidationFailed(message),
            "JobNotFound" => Self::JobNotFound,
            "JobAlreadyCompleted" => Self::JobAlreadyCompleted,
            "JobExpired" => Self::JobExpired,
            "SignatureMismatch" => Self::SignatureMismatch,
            "JobInFlight" => Self::JobInFlight,
            "UpstreamUnavailable" => Self::UpstreamUnavailable(message),
            "BlobSubmissionFailed" => Self::BlobSubmissionFailed(message),
            _ => Self::Internal(message),
        }
    }
}

impl From<EthClientError> for ProxyError {
    fn from(value: EthClientError) -> Self {
        Self::UpstreamUnavailable(truncate_rpc_error(&value.to_string()))
    }
}

impl From<SignerError> for ProxyError {
    fn from(value: SignerError) -> Self {
        Self::UpstreamUnavailable(value.to_string())
    }
}

impl From<StoreError> for ProxyError {
    fn from(value: StoreError) -> Self {
        Self::Internal(value.to_string())
    }
}

const TRUNCATE_THRESHOLD: usize = 4000;
const TRUNCATE_KEEP: usize = 2000;

/// Bounds provider error messages before they reach logs or clients.
///
/// Some providers echo the entire request back in their error body, blob
/// payloads included. Keep the head (up to the echoed `params`, if it shows
/// up early) and the tail, drop the middle.
pub fn truncate_rpc_error(message: &str) -> String {
    if message.len() <= TRUNCATE_THRESHOLD {
        return message.to_string();
    }

    let head_end = message
        .find("params")
        .map_or(TRUNCATE_KEEP, |index| index.min(TRUNCATE_KEEP));
    let head_end = floor_char_boundary(message, head_end);
    let tail_start = floor_char_boundary(message, message.len() - TRUNCATE_KEEP);

    format!(
        "{} ... [{} bytes truncated] ... {}",
        &message[..head_end],
        message.len() - head_end - (message.len() - tail_start),
        &message[tail_start..]
    )
}

fn floor_char_boundary(message: &str, mut index: usize) -> usize {
    while index > 0 && !message.is_char_boundary(index) {
        index -= 1;
    }
    index
}
