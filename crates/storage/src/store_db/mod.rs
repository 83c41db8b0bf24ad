pub mod in_memory;
#[cfg(feature = "redb")]
pub mod redb;
