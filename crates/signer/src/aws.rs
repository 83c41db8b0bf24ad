use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::{MessageType, SigningAlgorithmSpec};
use ethereum_types::{Address, Signature};
use keccak_hash::keccak;
use tracing::debug;

use crate::{der, SignerError};

/// AWS KMS signer. Keys are identified by a UUID `key_id`; the public key is
/// fetched once at construction to derive the Ethereum address.
#[derive(Clone, Debug)]
pub struct AwsKmsSigner {
    client: aws_sdk_kms::Client,
    key_id: String,
    address: Address,
}

impl AwsKmsSigner {
    pub async fn new(client: aws_sdk_kms::Client, key_id: String) -> Result<Self, SignerError> {
        let response = client
            .get_public_key()
            .key_id(&key_id)
            .send()
            .await
            .map_err(|error| SignerError::Kms(error.to_string()))?;

        let spki = response
            .public_key()
            .ok_or(SignerError::MissingPublicKey)?;
        let point = der::public_key_from_spki(spki.as_ref())?;
        let address = Address::from(keccak(&point[1..]));

        debug!(%address, key_id, "instantiated AWS KMS signer");
        Ok(Self {
            client,
            key_id,
            address,
        })
    }

    /// Builds a signer from the ambient AWS configuration (environment
    /// credentials plus the configured region).
    pub async fn from_env(key_id: String, region: String) -> Result<Self, SignerError> {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region))
            .load()
            .await;
        Self::new(aws_sdk_kms::Client::new(&config), key_id).await
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn sign_digest(&self, digest: [u8; 32]) -> Result<Signature, SignerError> {
        let response = self
            .client
            .sign()
            .key_id(&self.key_id)
            .message(Blob::new(digest.as_slice()))
            .message_type(MessageType::Digest)
            .signing_algorithm(SigningAlgorithmSpec::EcdsaSha256)
            .send()
            .await
            .map_err(|error| SignerError::Kms(error.to_string()))?;

        let der_signature = response.signature().ok_or(SignerError::MissingSignature)?;
        der::signature_from_kms(digest, der_signature.as_ref(), self.address)
    }
}
