use crate::types::{Blob, Commitment, Proof};

#[derive(thiserror::Error, Debug)]
pub enum KzgError {
    #[error("c-kzg error: {0}")]
    CKzg(#[from] c_kzg::Error),
}

/// Handle over the KZG trusted setup.
///
/// Built once by the composition root via [`KzgBackend::initialize`]; the
/// underlying settings are memoized process-wide, so cloning the handle is
/// free and all operations are safe to call concurrently.
#[derive(Clone, Copy)]
pub struct KzgBackend {
    settings: &'static c_kzg::KzgSettings,
}

impl std::fmt::Debug for KzgBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KzgBackend").finish()
    }
}

impl KzgBackend {
    /// Loads the Ethereum mainnet trusted setup. Concurrent first calls block
    /// until the setup is ready; later calls reuse the memoized settings.
    pub fn initialize() -> Self {
        Self {
            settings: c_kzg::ethereum_kzg_settings(0),
        }
    }

    /// Computes the KZG commitment for a blob together with the single
    /// blob proof used by EIP-4844 transactions.
    pub fn blob_to_commitment_and_proof(
        &self,
        blob: &Blob,
    ) -> Result<(Commitment, Proof), KzgError> {
        let blob = c_kzg::Blob::from_bytes(blob.as_slice())?;

        let commitment = self.settings.blob_to_kzg_commitment(&blob)?;
        let commitment_bytes = commitment.to_bytes();

        let proof = self
            .settings
            .compute_blob_kzg_proof(&blob, &commitment_bytes)?;

        Ok((commitment_bytes.into_inner(), proof.to_bytes().into_inner()))
    }

    /// Computes the KZG commitment for a blob together with the 128 per-cell
    /// proofs used by the EIP-7594 network envelope.
    pub fn blob_to_commitment_and_cell_proofs(
        &self,
        blob: &Blob,
    ) -> Result<(Commitment, Vec<Proof>), KzgError> {
        let blob = c_kzg::Blob::from_bytes(blob.as_slice())?;

        let commitment = self.settings.blob_to_kzg_commitment(&blob)?;
        let (_cells, proofs) = self.settings.compute_cells_and_kzg_proofs(&blob)?;

        Ok((
            commitment.to_bytes().into_inner(),
            proofs
                .iter()
                .map(|proof| proof.to_bytes().into_inner())
                .collect(),
        ))
    }

    /// Verifies a blob proof against its commitment, using the Fiat-Shamir
    /// protocol defined by c-kzg-4844.
    pub fn verify_blob_proof(
        &self,
        blob: &Blob,
        commitment: &Commitment,
        proof: &Proof,
    ) -> Result<bool, KzgError> {
        let blob = c_kzg::Blob::from_bytes(blob.as_slice())?;
        Ok(self.settings.verify_blob_kzg_proof(
            &blob,
            &c_kzg::Bytes48::from(*commitment),
            &c_kzg::Bytes48::from(*proof),
        )?)
    }
}
