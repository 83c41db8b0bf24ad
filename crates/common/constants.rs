/// Size of an EIP-4844 blob in bytes.
pub const BYTES_PER_BLOB: usize = 131072;

/// Field elements per blob.
pub const FIELD_ELEMENTS_PER_BLOB: usize = 4096;

/// Size of a single field element in bytes. The first byte of each element
/// must be zero so the element stays below the BLS12-381 scalar modulus.
pub const BYTES_PER_FIELD_ELEMENT: usize = 32;

/// Usable bytes per field element once the leading zero byte is reserved.
pub const SAFE_BYTES_PER_FIELD_ELEMENT: usize = BYTES_PER_FIELD_ELEMENT - 1;

/// Length of the blob payload header: a 24-bit big-endian byte length plus
/// one reserved zero byte.
pub const BLOB_HEADER_SIZE: usize = 4;

/// Maximum payload a single blob can carry.
pub const SAFE_BYTES_PER_BLOB: usize =
    FIELD_ELEMENTS_PER_BLOB * SAFE_BYTES_PER_FIELD_ELEMENT - BLOB_HEADER_SIZE;

/// Cells per extended blob (EIP-7594).
pub const CELLS_PER_EXT_BLOB: usize = 128;

/// Blob gas consumed by a single blob.
pub const GAS_PER_BLOB: u64 = 131072;

/// Minimum base fee per blob gas (EIP-4844).
pub const MIN_BASE_FEE_PER_BLOB_GAS: u64 = 1;

/// Denominator of the blob base fee update rule (EIP-4844, post-Prague value).
pub const BLOB_BASE_FEE_UPDATE_FRACTION: u64 = 3338477;
