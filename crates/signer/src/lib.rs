use bytes::Bytes;
use ethereum_types::{Address, Signature, U256};
use keccak_hash::keccak;

use blobgate_common::types::{BlobTransaction, Eip1559Transaction, TxType};

#[cfg(feature = "kms-aws")]
mod aws;
pub mod der;
mod local;

#[cfg(feature = "kms-aws")]
pub use aws::AwsKmsSigner;
pub use local::LocalSigner;

#[cfg(feature = "kms-gcp")]
mod gcp;
#[cfg(feature = "kms-gcp")]
pub use gcp::GcpKmsSigner;

#[derive(thiserror::Error, Debug)]
pub enum SignerError {
    #[error("KMS request failed: {0}")]
    Kms(String),
    #[error("KMS response did not contain a public key")]
    MissingPublicKey,
    #[error("KMS response did not contain a signature")]
    MissingSignature,
    #[error("malformed DER: {0}")]
    MalformedDer(&'static str),
    #[error("neither recovery id candidate produced the signer address")]
    RecoveryFailed,
    #[error("signing failed: {0}")]
    Secp256k1(#[from] secp256k1::Error),
}

/// Capability interface over the supported signing backends.
///
/// Every backend produces Ethereum-compatible 65-byte `r ‖ s ‖ v` signatures
/// with `v` being the y-parity bit, which is what typed transactions consume.
#[derive(Clone, Debug)]
pub enum Signer {
    Local(LocalSigner),
    #[cfg(feature = "kms-aws")]
    AwsKms(AwsKmsSigner),
    #[cfg(feature = "kms-gcp")]
    GcpKms(GcpKmsSigner),
}

impl Signer {
    pub fn address(&self) -> Address {
        match self {
            Self::Local(signer) => signer.address,
            #[cfg(feature = "kms-aws")]
            Self::AwsKms(signer) => signer.address(),
            #[cfg(feature = "kms-gcp")]
            Self::GcpKms(signer) => signer.address(),
        }
    }

    /// Signs a raw 32-byte digest.
    pub async fn sign_digest(&self, digest: [u8; 32]) -> Result<Signature, SignerError> {
        match self {
            Self::Local(signer) => Ok(signer.sign_digest(digest)),
            #[cfg(feature = "kms-aws")]
            Self::AwsKms(signer) => signer.sign_digest(digest).await,
            #[cfg(feature = "kms-gcp")]
            Self::GcpKms(signer) => signer.sign_digest(digest).await,
        }
    }

    /// Signs `keccak(data)`. Transaction payloads go through here with the
    /// transaction type already prepended.
    pub async fn sign_raw(&self, data: Bytes) -> Result<Signature, SignerError> {
        self.sign_digest(keccak(&data).0).await
    }

    pub async fn sign_blob_transaction(
        &self,
        tx: &mut BlobTransaction,
    ) -> Result<(), SignerError> {
        let mut payload = tx.encode_payload_to_vec();
        payload.insert(0, TxType::EIP4844.into());

        let signature = self.sign_raw(payload.into()).await?;
        (tx.signature_r, tx.signature_s, tx.signature_y_parity) = parse_signature(signature);

        Ok(())
    }

    pub async fn sign_eip1559_transaction(
        &self,
        tx: &mut Eip1559Transaction,
    ) -> Result<(), SignerError> {
        let mut payload = tx.encode_payload_to_vec();
        payload.insert(0, TxType::EIP1559.into());

        let signature = self.sign_raw(payload.into()).await?;
        (tx.signature_r, tx.signature_s, tx.signature_y_parity) = parse_signature(signature);

        Ok(())
    }
}

impl From<LocalSigner> for Signer {
    fn from(value: LocalSigner) -> Self {
        Self::Local(value)
    }
}

fn parse_signature(signature: Signature) -> (U256, U256, bool) {
    let r = U256::from_big_endian(&signature[..32]);
    let s = U256::from_big_endian(&signature[32..64]);
    let y_parity = signature[64] != 0 && signature[64] != 27;

    (r, s, y_parity)
}

/// Address whose private key produced `signature` over `digest`.
pub fn recover_address(digest: &[u8; 32], signature: &Signature) -> Result<Address, SignerError> {
    let v = match signature[64] {
        byte @ (0 | 1) => byte,
        byte @ (27 | 28) => byte - 27,
        _ => return Err(SignerError::RecoveryFailed),
    };
    let recovery_id = secp256k1::ecdsa::RecoveryId::from_i32(v as i32)
        .map_err(|_| SignerError::RecoveryFailed)?;
    let recoverable =
        secp256k1::ecdsa::RecoverableSignature::from_compact(&signature[..64], recovery_id)?;

    let message = secp256k1::Message::from_digest(*digest);
    let public_key = secp256k1::SECP256K1.recover_ecdsa(&message, &recoverable)?;

    Ok(Address::from(keccak(
        &public_key.serialize_uncompressed()[1..],
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::{rand, Secp256k1};

    #[tokio::test]
    async fn local_signatures_recover_to_the_signer() {
        let (secret_key, _) = Secp256k1::new().generate_keypair(&mut rand::thread_rng());
        let signer = Signer::from(LocalSigner::new(secret_key));

        let digest = keccak(b"some payload").0;
        let signature = signer.sign_digest(digest).await.unwrap();

        assert_eq!(recover_address(&digest, &signature).unwrap(), signer.address());
    }

    #[tokio::test]
    async fn signed_transactions_carry_parsed_signature() {
        let (secret_key, _) = Secp256k1::new().generate_keypair(&mut rand::thread_rng());
        let signer = Signer::from(LocalSigner::new(secret_key));

        let mut tx = BlobTransaction {
            chain_id: 1,
            nonce: 0,
            ..Default::default()
        };
        signer.sign_blob_transaction(&mut tx).await.unwrap();
        assert!(!tx.signature_r.is_zero());
        assert!(!tx.signature_s.is_zero());

        // the signature must recover over the sighash
        let mut compact = [0u8; 65];
        compact[..32].copy_from_slice(&tx.signature_r.to_big_endian());
        compact[32..64].copy_from_slice(&tx.signature_s.to_big_endian());
        compact[64] = u8::from(tx.signature_y_parity);
        let signature = Signature::from_slice(&compact);
        assert_eq!(
            recover_address(&tx.sighash().0, &signature).unwrap(),
            signer.address()
        );
    }
}
