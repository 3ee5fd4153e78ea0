//! Test helpers shared across withme crates.

pub mod provider;
pub mod store;

pub use provider::{FailingProvider, FixedProvider, RecordingProvider, StreamingProvider};
pub use store::FailingAuditStore;
