use ethereum_types::U256;

pub use crate::constants::{BLOB_BASE_FEE_UPDATE_FRACTION, GAS_PER_BLOB, MIN_BASE_FEE_PER_BLOB_GAS};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeError {
    #[error("fake exponential overflowed")]
    Overflow,
}

/// Integer approximation of `factor * e ** (numerator / denominator)` used by
/// the EIP-4844 blob base fee update rule.
///
/// All arithmetic is checked; if the blob market is in extreme demand the
/// series can overflow a U256, which is reported instead of saturating.
pub fn fake_exponential_checked(
    factor: u64,
    numerator: u64,
    denominator: u64,
) -> Result<U256, FeeError> {
    let numerator = U256::from(numerator);
    let denominator = U256::from(denominator);

    let mut i = U256::one();
    let mut output = U256::zero();
    let mut numerator_accum = U256::from(factor)
        .checked_mul(denominator)
        .ok_or(FeeError::Overflow)?;

    while !numerator_accum.is_zero() {
        output = output
            .checked_add(numerator_accum)
            .ok_or(FeeError::Overflow)?;

        let divisor = denominator.checked_mul(i).ok_or(FeeError::Overflow)?;
        numerator_accum = numerator_accum
            .checked_mul(numerator)
            .ok_or(FeeError::Overflow)?
            / divisor;

        i = i.checked_add(U256::one()).ok_or(FeeError::Overflow)?;
    }

    Ok(output / denominator)
}

/// Base fee per blob gas for a block with the given `excess_blob_gas`.
pub fn base_fee_per_blob_gas(excess_blob_gas: u64) -> Result<U256, FeeError> {
    fake_exponential_checked(
        MIN_BASE_FEE_PER_BLOB_GAS,
        excess_blob_gas,
        BLOB_BASE_FEE_UPDATE_FRACTION,
    )
}
