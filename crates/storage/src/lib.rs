mod api;
pub mod error;
mod store;
mod store_db;

pub use api::StoreEngine;
pub use store::{EngineType, Store};

/// Seconds since the unix epoch. The store works in coarse wall-clock time:
/// lock TTLs, cache TTLs and retry schedules are all second-granular.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
