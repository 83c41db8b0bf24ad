use blobgate_rlp::encode::RLPEncode;
use blobgate_rlp::structs::Encoder;
use bytes::{BufMut, Bytes};
use ethereum_types::{Address, H256, U256};
use keccak_hash::keccak;
use serde::{Deserialize, Serialize};

use crate::types::BlobsBundle;

/// Wrapper version of the EIP-7594 network envelope.
pub const EIP7594_WRAPPER_VERSION: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxType {
    EIP1559 = 0x02,
    EIP4844 = 0x03,
}

impl From<TxType> for u8 {
    fn from(value: TxType) -> Self {
        value as u8
    }
}

/// Selects the sidecar wire format a blob transaction is broadcast with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxVersion {
    #[default]
    Eip4844,
    Eip7594,
}

/// Type-3 (blob) transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlobTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u64,
    pub max_fee_per_gas: u64,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub access_list: Vec<(Address, Vec<H256>)>,
    pub max_fee_per_blob_gas: U256,
    pub blob_versioned_hashes: Vec<H256>,
    pub signature_y_parity: bool,
    pub signature_r: U256,
    pub signature_s: U256,
}

impl BlobTransaction {
    fn encode_payload_fields<'a>(&self, encoder: Encoder<'a>) -> Encoder<'a> {
        encoder
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.max_priority_fee_per_gas)
            .encode_field(&self.max_fee_per_gas)
            .encode_field(&self.gas_limit)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.access_list)
            .encode_field(&self.max_fee_per_blob_gas)
            .encode_field(&self.blob_versioned_hashes)
    }

    /// RLP list of the unsigned fields, i.e. the list the signature covers.
    pub fn encode_payload(&self, buf: &mut dyn BufMut) {
        self.encode_payload_fields(Encoder::new(buf)).finish();
    }

    pub fn encode_payload_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_payload(&mut buf);
        buf
    }

    /// Hash the signature is computed over: `keccak(0x03 ‖ rlp(unsigned))`.
    pub fn sighash(&self) -> H256 {
        let mut payload = self.encode_payload_to_vec();
        payload.insert(0, TxType::EIP4844.into());
        keccak(payload)
    }

    /// Canonical encoding, without the sidecar. Its keccak is the
    /// transaction hash.
    pub fn encode_canonical_to_vec(&self) -> Vec<u8> {
        let mut buf: Vec<u8> = vec![TxType::EIP4844.into()];
        self.encode(&mut buf);
        buf
    }

    pub fn hash(&self) -> H256 {
        keccak(self.encode_canonical_to_vec())
    }

    /// Network (broadcast) encoding carrying the blob sidecar.
    ///
    /// For [`TxVersion::Eip4844`] the signed transaction list is wrapped
    /// alongside the blobs, commitments and proofs. For
    /// [`TxVersion::Eip7594`] the envelope is a flat list: the signed base
    /// fields followed by the wrapper version and the sidecar arrays with
    /// per-cell proofs.
    pub fn encode_network_to_vec(&self, bundle: &BlobsBundle) -> Vec<u8> {
        let mut buf: Vec<u8> = vec![TxType::EIP4844.into()];
        match bundle.version {
            TxVersion::Eip4844 => {
                Encoder::new(&mut buf)
                    .encode_raw(&self.encode_to_vec())
                    .encode_field(&bundle.blobs)
                    .encode_field(&bundle.commitments)
                    .encode_field(&bundle.proofs)
                    .finish();
            }
            TxVersion::Eip7594 => {
                self.encode_payload_fields(Encoder::new(&mut buf))
                    .encode_field(&self.signature_y_parity)
                    .encode_field(&self.signature_r)
                    .encode_field(&self.signature_s)
                    .encode_field(&EIP7594_WRAPPER_VERSION)
                    .encode_field(&bundle.blobs)
                    .encode_field(&bundle.commitments)
                    .encode_field(&bundle.proofs)
                    .finish();
            }
        }
        buf
    }
}

impl RLPEncode for BlobTransaction {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.encode_payload_fields(Encoder::new(buf))
            .encode_field(&self.signature_y_parity)
            .encode_field(&self.signature_r)
            .encode_field(&self.signature_s)
            .finish();
    }
}

/// Type-2 transaction, used for the escrow completion calls.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Eip1559Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u64,
    pub max_fee_per_gas: u64,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub access_list: Vec<(Address, Vec<H256>)>,
    pub signature_y_parity: bool,
    pub signature_r: U256,
    pub signature_s: U256,
}

impl Eip1559Transaction {
    fn encode_payload_fields<'a>(&self, encoder: Encoder<'a>) -> Encoder<'a> {
        encoder
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.max_priority_fee_per_gas)
            .encode_field(&self.max_fee_per_gas)
            .encode_field(&self.gas_limit)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.access_list)
    }

    pub fn encode_payload(&self, buf: &mut dyn BufMut) {
        self.encode_payload_fields(Encoder::new(buf)).finish();
    }

    pub fn encode_payload_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_payload(&mut buf);
        buf
    }

    pub fn sighash(&self) -> H256 {
        let mut payload = self.encode_payload_to_vec();
        payload.insert(0, TxType::EIP1559.into());
        keccak(payload)
    }

    pub fn encode_canonical_to_vec(&self) -> Vec<u8> {
        let mut buf: Vec<u8> = vec![TxType::EIP1559.into()];
        self.encode(&mut buf);
        buf
    }

    pub fn hash(&self) -> H256 {
        keccak(self.encode_canonical_to_vec())
    }
}

impl RLPEncode for Eip1559Transaction {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.encode_payload_fields(Encoder::new(buf))
            .encode_field(&self.signature_y_parity)
            .encode_field(&self.signature_r)
            .encode_field(&self.signature_s)
            .finish();
    }
}
