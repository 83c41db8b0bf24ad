/// Prefix for the empty string / zero integer.
pub const RLP_NULL: u8 = 0x80;
