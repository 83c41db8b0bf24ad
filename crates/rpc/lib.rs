mod client;
pub mod errors;
pub mod eth_sender;
pub mod fee_oracle;
pub mod types;
pub mod utils;

pub use client::{EthClient, RpcResponse};
pub use fee_oracle::{FeeOracle, FeeParams};
