pub mod api;
pub mod completer;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod escrow;
pub mod submitter;

pub use coordinator::{Coordinator, SubmitJobRequest};
pub use errors::ProxyError;
