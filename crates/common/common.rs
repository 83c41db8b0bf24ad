pub use bytes::Bytes;
pub use ethereum_types::{Address, H256, U256};

pub mod base64;
pub mod calldata;
pub mod constants;
pub mod fees;
pub mod kzg;
pub mod serde_utils;
pub mod types;
