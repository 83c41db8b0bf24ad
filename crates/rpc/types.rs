use blobgate_common::serde_utils;
use blobgate_common::types::Blob;
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::Deserialize;

/// Subset of an `eth_getBlockByNumber` response the fee oracle consumes.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    #[serde(with = "serde_utils::u64::hex_str")]
    pub number: u64,
    #[serde(default)]
    pub base_fee_per_gas: Option<U256>,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub excess_blob_gas: Option<u64>,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub blob_gas_used: Option<u64>,
}

/// `eth_feeHistory` response.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeeHistory {
    #[serde(with = "serde_utils::u64::hex_str")]
    pub oldest_block: u64,
    #[serde(default)]
    pub base_fee_per_gas: Vec<U256>,
    #[serde(default)]
    pub base_fee_per_blob_gas: Vec<U256>,
}

/// Subset of a transaction receipt.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: H256,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub block_number: u64,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub status: u64,
}

impl RpcReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

/// Parameters for `eth_estimateGas`. Blob fields are attached only when the
/// transaction being estimated carries a sidecar.
#[derive(Default, Clone, Debug)]
pub struct EstimateGasRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub nonce: Option<u64>,
    pub blob_versioned_hashes: Vec<H256>,
    pub blobs: Vec<Blob>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_deserializes_hex_quantities() {
        let block: RpcBlock = serde_json::from_str(
            r#"{"number":"0x10","baseFeePerGas":"0x3b9aca00","excessBlobGas":"0x0"}"#,
        )
        .unwrap();
        assert_eq!(block.number, 16);
        assert_eq!(block.base_fee_per_gas, Some(U256::from(1_000_000_000u64)));
        assert_eq!(block.excess_blob_gas, Some(0));
        assert_eq!(block.blob_gas_used, None);
    }

    #[test]
    fn pre_cancun_block_lacks_blob_fields() {
        let block: RpcBlock = serde_json::from_str(r#"{"number":"0x1"}"#).unwrap();
        assert_eq!(block.excess_blob_gas, None);
    }

    #[test]
    fn receipt_status() {
        let receipt: RpcReceipt = serde_json::from_str(
            r#"{"transactionHash":"0x0101010101010101010101010101010101010101010101010101010101010101","blockNumber":"0x2a","status":"0x1"}"#,
        )
        .unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.block_number, 42);
    }

    #[test]
    fn fee_history_deserializes() {
        let history: FeeHistory = serde_json::from_str(
            r#"{"oldestBlock":"0x5","baseFeePerGas":["0x7"],"baseFeePerBlobGas":["0x3","0x5","0x4","0x7","0x2"]}"#,
        )
        .unwrap();
        assert_eq!(history.oldest_block, 5);
        assert_eq!(history.base_fee_per_blob_gas.len(), 5);
    }
}
