use ethereum_types::Address;
use serde::Deserialize;

use blobgate_signer::{LocalSigner, Signer};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[from] envy::Error),
    #[error("exactly one signer must be configured (localPrivateKey, kmsKeyId+kmsRegion or kmsKeyName)")]
    InvalidSignerSelection,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("proxyFeePercent must be between 0 and 10, got {0}")]
    InvalidFeePercent(u8),
    #[error("signer backend not built in: {0}")]
    SignerBackendUnavailable(&'static str),
    #[error("signer error: {0}")]
    Signer(#[from] blobgate_signer::SignerError),
}

/// `ETH_*` options: the JSON-RPC endpoint(s).
#[derive(Deserialize, Debug)]
pub struct EthConfig {
    pub rpc_url: String,
}

impl EthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::prefixed("ETH_").from_env()?)
    }

    pub fn rpc_urls(&self) -> Vec<String> {
        self.rpc_url
            .split(',')
            .map(|url| url.trim().to_string())
            .collect()
    }
}

/// `PROXY_*` options.
#[derive(Deserialize, Debug)]
pub struct ProxyConfig {
    pub escrow_contract: Address,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub fee_percent: u8,
    #[serde(default = "default_tx_timeout_ms")]
    pub tx_timeout_ms: u64,
    #[serde(default)]
    pub eip7918: bool,
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default = "default_completer_workers")]
    pub completer_workers: usize,
}

fn default_tx_timeout_ms() -> u64 {
    120_000
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_store_path() -> String {
    "blobgate.redb".to_string()
}

fn default_completer_workers() -> usize {
    4
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = envy::prefixed("PROXY_").from_env()?;
        if config.fee_percent > 10 {
            return Err(ConfigError::InvalidFeePercent(config.fee_percent));
        }
        Ok(config)
    }
}

/// `SIGNER_*` options. Exactly one backend must be selected.
#[derive(Deserialize, Debug, Default)]
pub struct SignerConfig {
    #[serde(default)]
    pub local_private_key: Option<String>,
    #[serde(default)]
    pub kms_key_id: Option<String>,
    #[serde(default)]
    pub kms_region: Option<String>,
    #[serde(default)]
    pub kms_key_name: Option<String>,
}

impl SignerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::prefixed("SIGNER_").from_env()?)
    }

    #[allow(unreachable_code)]
    pub async fn build(&self) -> Result<Signer, ConfigError> {
        match (
            &self.local_private_key,
            &self.kms_key_id,
            &self.kms_key_name,
        ) {
            (Some(private_key), None, None) => {
                let stripped = private_key.strip_prefix("0x").unwrap_or(private_key);
                let bytes = hex::decode(stripped).map_err(|_| ConfigError::InvalidPrivateKey)?;
                let secret_key = secp256k1::SecretKey::from_slice(&bytes)
                    .map_err(|_| ConfigError::InvalidPrivateKey)?;
                Ok(Signer::from(LocalSigner::new(secret_key)))
            }
            (None, Some(_key_id), None) => {
                let _region = self
                    .kms_region
                    .as_ref()
                    .ok_or(ConfigError::InvalidSignerSelection)?;
                #[cfg(feature = "kms-aws")]
                {
                    let signer = blobgate_signer::AwsKmsSigner::from_env(
                        _key_id.clone(),
                        _region.clone(),
                    )
                    .await?;
                    return Ok(Signer::AwsKms(signer));
                }
                Err(ConfigError::SignerBackendUnavailable("kms-aws"))
            }
            (None, None, Some(_key_name)) => {
                #[cfg(feature = "kms-gcp")]
                {
                    let signer =
                        blobgate_signer::GcpKmsSigner::from_env(_key_name.clone()).await?;
                    return Ok(Signer::GcpKms(signer));
                }
                Err(ConfigError::SignerBackendUnavailable("kms-gcp"))
            }
            _ => Err(ConfigError::InvalidSignerSelection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_signer_from_hex_key() {
        let config = SignerConfig {
            local_private_key: Some(
                "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".to_owned(),
            ),
            ..Default::default()
        };
        let signer = config.build().await.unwrap();
        assert!(!signer.address().is_zero());
    }

    #[tokio::test]
    async fn signer_selection_must_be_exclusive() {
        let none = SignerConfig::default();
        assert!(matches!(
            none.build().await,
            Err(ConfigError::InvalidSignerSelection)
        ));

        let both = SignerConfig {
            local_private_key: Some("0xab".to_owned()),
            kms_key_id: Some("key".to_owned()),
            ..Default::default()
        };
        assert!(matches!(
            both.build().await,
            Err(ConfigError::InvalidSignerSelection)
        ));
    }
}
