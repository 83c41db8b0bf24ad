use ethereum_types::U256;
use tracing::warn;

use blobgate_common::constants::GAS_PER_BLOB;
use blobgate_common::fees::base_fee_per_blob_gas;

use crate::errors::EthClientError;
use crate::types::FeeHistory;
use crate::EthClient;

const GWEI: u64 = 1_000_000_000;

/// Minimal execution gas a completion-sized transaction consumes; used for
/// deposit cost estimation.
pub const BASE_TX_GAS: u64 = 21_000;

/// Blocks of history consulted when the EIP-7918 regime is enabled.
const FEE_HISTORY_BLOCKS: u64 = 5;

/// Fee fields for a transaction carrying `blob_count` blobs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeParams {
    pub max_fee_per_gas: u64,
    pub max_priority_fee_per_gas: u64,
    pub max_fee_per_blob_gas: U256,
    pub blob_fee: U256,
}

/// Derives gas fee fields from the latest block header and, when EIP-7918 is
/// enabled, the recent `baseFeePerBlobGas` history.
#[derive(Debug, Clone)]
pub struct FeeOracle {
    client: EthClient,
    eip7918: bool,
}

impl FeeOracle {
    pub fn new(client: EthClient, eip7918: bool) -> Self {
        Self { client, eip7918 }
    }

    pub async fn fee_params(&self, blob_count: u64) -> Result<FeeParams, EthClientError> {
        let block = self.client.get_latest_block().await?;

        let max_priority_fee_per_gas = self
            .client
            .get_max_priority_fee()
            .await
            .ok()
            .and_then(|fee| fee.try_into().ok())
            .unwrap_or(GWEI);

        let base_fee = block.base_fee_per_gas.unwrap_or_default();
        let max_fee_per_gas = (base_fee * U256::from(2u64) + U256::from(max_priority_fee_per_gas))
            .try_into()
            .map_err(|_| EthClientError::Custom("maxFeePerGas does not fit a u64".to_owned()))?;

        let max_fee_per_blob_gas = if self.eip7918 {
            let history = self.client.get_fee_history(FEE_HISTORY_BLOCKS).await?;
            max_blob_base_fee_from_history(&history)
                .unwrap_or_else(|| U256::from(GWEI))
        } else {
            match block.excess_blob_gas {
                Some(excess_blob_gas) => base_fee_per_blob_gas(excess_blob_gas)
                    .map_err(|error| EthClientError::Custom(error.to_string()))?,
                None => {
                    warn!("block has no excessBlobGas (pre-Cancun chain?), assuming 1 gwei");
                    U256::from(GWEI)
                }
            }
        };

        Ok(FeeParams {
            max_fee_per_gas,
            max_priority_fee_per_gas,
            max_fee_per_blob_gas,
            blob_fee: max_fee_per_blob_gas * GAS_PER_BLOB * blob_count,
        })
    }

    /// Worst-case wei cost of submitting `blob_count` blobs: the blob fee
    /// plus the minimum execution envelope. This is the amount checked
    /// against the escrow deposit.
    pub async fn estimated_cost(&self, blob_count: u64) -> Result<U256, EthClientError> {
        let fees = self.fee_params(blob_count).await?;
        Ok(fees.blob_fee + U256::from(fees.max_fee_per_gas) * BASE_TX_GAS)
    }
}

/// Highest `baseFeePerBlobGas` over the returned history window (EIP-7918
/// regime).
pub fn max_blob_base_fee_from_history(history: &FeeHistory) -> Option<U256> {
    history.base_fee_per_blob_gas.iter().max().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_maximum_picks_the_peak() {
        let history = FeeHistory {
            oldest_block: 0,
            base_fee_per_gas: vec![],
            base_fee_per_blob_gas: [3u64, 5, 4, 7, 2].map(U256::from).to_vec(),
        };
        assert_eq!(
            max_blob_base_fee_from_history(&history),
            Some(U256::from(7u64))
        );

        // the blob fee follows the maximum
        let blob_fee = max_blob_base_fee_from_history(&history).unwrap() * GAS_PER_BLOB;
        assert_eq!(blob_fee, U256::from(7u64 * 131072));
    }

    #[test]
    fn empty_history_yields_none() {
        assert_eq!(max_blob_base_fee_from_history(&FeeHistory::default()), None);
    }
}
