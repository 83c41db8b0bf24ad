use bytes::Bytes;
use ethereum_types::H256;
use sha2::{Digest, Sha256};

use crate::constants::{
    BLOB_HEADER_SIZE, BYTES_PER_BLOB, BYTES_PER_FIELD_ELEMENT, FIELD_ELEMENTS_PER_BLOB,
    SAFE_BYTES_PER_BLOB, SAFE_BYTES_PER_FIELD_ELEMENT,
};
use crate::kzg::{KzgBackend, KzgError};
use crate::types::TxVersion;

pub type Blob = [u8; BYTES_PER_BLOB];
pub type Commitment = [u8; 48];
pub type Proof = [u8; 48];

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobCodecError {
    #[error("payload is empty")]
    PayloadEmpty,
    #[error("payload of {0} bytes exceeds the blob capacity of {SAFE_BYTES_PER_BLOB} bytes")]
    PayloadTooLarge(usize),
    #[error("blob must be exactly {BYTES_PER_BLOB} bytes, got {0}")]
    BlobSizeInvalid(usize),
    #[error("blob header declares {0} bytes, more than the blob can carry")]
    HeaderLengthInvalid(usize),
}

#[derive(thiserror::Error, Debug)]
pub enum BlobsBundleError {
    #[error("blob bundle is empty")]
    BlobBundleEmptyError,
    #[error(transparent)]
    Codec(#[from] BlobCodecError),
    #[error(transparent)]
    Kzg(#[from] KzgError),
}

/// Packs an opaque payload into a blob.
///
/// The payload is prefixed with a four byte header (24-bit big-endian byte
/// length plus one reserved zero byte) and striped across the blob's 4096
/// field elements, 31 bytes per element. The first byte of every field
/// element is left zero so the element is a valid BLS12-381 scalar.
pub fn blob_from_bytes(data: Bytes) -> Result<Blob, BlobCodecError> {
    if data.is_empty() {
        return Err(BlobCodecError::PayloadEmpty);
    }
    if data.len() > SAFE_BYTES_PER_BLOB {
        return Err(BlobCodecError::PayloadTooLarge(data.len()));
    }

    let mut stream = [0u8; BLOB_HEADER_SIZE + SAFE_BYTES_PER_BLOB];
    stream[0] = (data.len() >> 16) as u8;
    stream[1] = (data.len() >> 8) as u8;
    stream[2] = data.len() as u8;
    // stream[3] is reserved and stays zero
    stream[BLOB_HEADER_SIZE..BLOB_HEADER_SIZE + data.len()].copy_from_slice(&data);

    let mut blob = [0u8; BYTES_PER_BLOB];
    for (i, chunk) in stream.chunks(SAFE_BYTES_PER_FIELD_ELEMENT).enumerate() {
        let start = i * BYTES_PER_FIELD_ELEMENT + 1;
        blob[start..start + chunk.len()].copy_from_slice(chunk);
    }

    Ok(blob)
}

/// Recovers the payload packed by [`blob_from_bytes`].
pub fn payload_from_blob(blob: &[u8]) -> Result<Bytes, BlobCodecError> {
    if blob.len() != BYTES_PER_BLOB {
        return Err(BlobCodecError::BlobSizeInvalid(blob.len()));
    }

    let length =
        ((blob[1] as usize) << 16) | ((blob[2] as usize) << 8) | blob[3] as usize;
    if length > SAFE_BYTES_PER_BLOB {
        return Err(BlobCodecError::HeaderLengthInvalid(length));
    }

    let mut payload = Vec::with_capacity(length);
    let mut remaining = length;
    for element in 0..FIELD_ELEMENTS_PER_BLOB {
        if remaining == 0 {
            break;
        }
        let start = element * BYTES_PER_FIELD_ELEMENT + 1;
        // the first element's data bytes begin after the header
        let skip = if element == 0 { BLOB_HEADER_SIZE } else { 0 };
        let take = remaining.min(SAFE_BYTES_PER_FIELD_ELEMENT - skip);
        payload.extend_from_slice(&blob[start + skip..start + skip + take]);
        remaining -= take;
    }

    Ok(payload.into())
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BlobsBundle {
    pub blobs: Vec<Blob>,
    pub commitments: Vec<Commitment>,
    pub proofs: Vec<Proof>,
    pub version: TxVersion,
}

impl BlobsBundle {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Computes commitments and proofs for the given blobs. For
    /// [`TxVersion::Eip4844`] there is one proof per blob; for
    /// [`TxVersion::Eip7594`] there are 128 cell proofs per blob.
    pub fn create_from_blobs(
        kzg: &KzgBackend,
        blobs: &[Blob],
        version: TxVersion,
    ) -> Result<Self, BlobsBundleError> {
        if blobs.is_empty() {
            return Err(BlobsBundleError::BlobBundleEmptyError);
        }

        let mut commitments = Vec::with_capacity(blobs.len());
        let mut proofs = Vec::new();

        for blob in blobs {
            match version {
                TxVersion::Eip4844 => {
                    let (commitment, proof) = kzg.blob_to_commitment_and_proof(blob)?;
                    commitments.push(commitment);
                    proofs.push(proof);
                }
                TxVersion::Eip7594 => {
                    let (commitment, cell_proofs) =
                        kzg.blob_to_commitment_and_cell_proofs(blob)?;
                    commitments.push(commitment);
                    proofs.extend(cell_proofs);
                }
            }
        }

        Ok(Self {
            blobs: blobs.to_vec(),
            commitments,
            proofs,
            version,
        })
    }

    pub fn generate_versioned_hashes(&self) -> Vec<H256> {
        self.commitments
            .iter()
            .map(commitment_to_versioned_hash)
            .collect()
    }
}

/// `0x01 ‖ sha256(commitment)[1..]` as defined by EIP-4844.
pub fn commitment_to_versioned_hash(commitment: &Commitment) -> H256 {
    let mut hash: [u8; 32] = Sha256::digest(commitment).into();
    hash[0] = 0x01;
    H256::from(hash)
}
