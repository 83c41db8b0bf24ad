use bytes::Bytes;
use ethereum_types::{Address, U256};
use keccak_hash::keccak;

/// Subset of Solidity ABI values the escrow interface uses.
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Address(Address),
    Uint(U256),
    Bool(bool),
    FixedBytes(Bytes),
    Bytes(Bytes),
}

#[derive(thiserror::Error, Debug)]
pub enum CalldataError {
    #[error("malformed function signature: {0}")]
    MalformedSignature(String),
    #[error("number of arguments does not match the signature ({expected} != {got})")]
    ArityMismatch { expected: usize, got: usize },
    #[error("fixed bytes value of {0} bytes does not fit a 32-byte word")]
    FixedBytesTooLong(usize),
}

fn parse_signature(signature: &str) -> Result<(&str, Vec<&str>), CalldataError> {
    let sig = signature.trim().trim_start_matches("function ");
    let (name, params) = sig
        .split_once('(')
        .ok_or_else(|| CalldataError::MalformedSignature(signature.to_string()))?;
    let params = params.trim_end_matches(')');
    let params = if params.is_empty() {
        Vec::new()
    } else {
        params.split(',').map(str::trim).collect()
    };
    Ok((name, params))
}

fn compute_function_selector(name: &str, params: &[&str]) -> [u8; 4] {
    let normalized_signature = format!("{name}({})", params.join(","));
    let hash = keccak(normalized_signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encodes a function call (selector + ABI-encoded arguments) for the given
/// human-readable signature, e.g. `completeJob(bytes32,bytes32,bytes)`.
pub fn encode_calldata(signature: &str, values: &[Value]) -> Result<Vec<u8>, CalldataError> {
    let (name, params) = parse_signature(signature)?;

    if params.len() != values.len() {
        return Err(CalldataError::ArityMismatch {
            expected: params.len(),
            got: values.len(),
        });
    }

    let selector = compute_function_selector(name, &params);
    let mut calldata = selector.to_vec();
    calldata.extend_from_slice(&encode_tuple(values)?);

    Ok(calldata)
}

fn encode_tuple(values: &[Value]) -> Result<Vec<u8>, CalldataError> {
    let head_len = 32 * values.len();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for value in values {
        match value {
            Value::Address(address) => {
                head.extend_from_slice(&[0u8; 12]);
                head.extend_from_slice(address.as_bytes());
            }
            Value::Uint(uint) => {
                head.extend_from_slice(&uint.to_big_endian());
            }
            Value::Bool(boolean) => {
                let mut word = [0u8; 32];
                word[31] = u8::from(*boolean);
                head.extend_from_slice(&word);
            }
            Value::FixedBytes(bytes) => {
                if bytes.len() > 32 {
                    return Err(CalldataError::FixedBytesTooLong(bytes.len()));
                }
                let mut word = [0u8; 32];
                word[..bytes.len()].copy_from_slice(bytes);
                head.extend_from_slice(&word);
            }
            Value::Bytes(bytes) => {
                head.extend_from_slice(&U256::from(head_len + tail.len()).to_big_endian());

                tail.extend_from_slice(&U256::from(bytes.len()).to_big_endian());
                tail.extend_from_slice(bytes);
                // pad the data to a word boundary
                tail.resize(tail.len().div_ceil(32) * 32, 0);
            }
        }
    }

    head.extend_from_slice(&tail);
    Ok(head)
}
