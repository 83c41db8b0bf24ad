use ethereum_types::{Address, Signature};
use gcloud_sdk::google::cloud::kms::v1::key_management_service_client::KeyManagementServiceClient;
use gcloud_sdk::google::cloud::kms::v1::{self as kms, AsymmetricSignRequest, GetPublicKeyRequest};
use gcloud_sdk::{tonic, GoogleApi, GoogleAuthMiddleware};
use keccak_hash::keccak;
use tracing::debug;

use blobgate_common::base64;

use crate::{der, SignerError};

type Client = GoogleApi<KeyManagementServiceClient<GoogleAuthMiddleware>>;

/// GCP Cloud KMS signer. Keys are addressed by their full resource name
/// (`projects/…/cryptoKeyVersions/…`); the public key is fetched once at
/// construction to derive the Ethereum address.
#[derive(Clone)]
pub struct GcpKmsSigner {
    client: Client,
    key_name: String,
    address: Address,
}

impl std::fmt::Debug for GcpKmsSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpKmsSigner")
            .field("key_name", &self.key_name)
            .field("address", &self.address)
            .finish()
    }
}

impl GcpKmsSigner {
    pub async fn new(client: Client, key_name: String) -> Result<Self, SignerError> {
        let response = client
            .get()
            .get_public_key(request_with_routing(
                GetPublicKeyRequest {
                    name: key_name.clone(),
                },
                &key_name,
            ))
            .await
            .map_err(|error| SignerError::Kms(error.to_string()))?;

        let pem = response.into_inner().pem;
        let point = der::public_key_from_spki(&spki_from_pem(&pem)?)?;
        let address = Address::from(keccak(&point[1..]));

        debug!(%address, key_name, "instantiated GCP KMS signer");
        Ok(Self {
            client,
            key_name,
            address,
        })
    }

    /// Builds a signer from the ambient Google application credentials.
    pub async fn from_env(key_name: String) -> Result<Self, SignerError> {
        let client = GoogleApi::from_function(
            KeyManagementServiceClient::new,
            "https://cloudkms.googleapis.com",
            None,
        )
        .await
        .map_err(|error| SignerError::Kms(error.to_string()))?;
        Self::new(client, key_name).await
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn sign_digest(&self, digest: [u8; 32]) -> Result<Signature, SignerError> {
        let request = AsymmetricSignRequest {
            name: self.key_name.clone(),
            digest: Some(kms::Digest {
                digest: Some(kms::digest::Digest::Sha256(digest.to_vec())),
            }),
            ..Default::default()
        };

        let response = self
            .client
            .get()
            .asymmetric_sign(request_with_routing(request, &self.key_name))
            .await
            .map_err(|error| SignerError::Kms(error.to_string()))?;

        der::signature_from_kms(digest, &response.into_inner().signature, self.address)
    }
}

/// Adds the request-routing metadata Cloud KMS requires,
/// see https://cloud.google.com/kms/docs/grpc
fn request_with_routing<T>(message: T, key_name: &str) -> tonic::Request<T> {
    let mut request = tonic::Request::new(message);
    if let Ok(value) = format!("name={key_name}").parse() {
        request.metadata_mut().insert("x-goog-request-params", value);
    }
    request
}

/// GCP returns the SPKI document PEM-armored rather than raw.
fn spki_from_pem(pem: &str) -> Result<Vec<u8>, SignerError> {
    let body: String = pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    base64::decode(body.trim()).map_err(|_| SignerError::MalformedDer("invalid PEM body"))
}
