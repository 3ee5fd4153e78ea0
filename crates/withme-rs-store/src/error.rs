//! Error types for store operations.

use uuid::Uuid;

/// Errors returned by kernel stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Rollout written by a newer schema.
    #[error("unsupported schema version: {0}")]
    UnsupportedSchema(u32),
    /// Session id has no session record.
    #[error("unknown session: {0}")]
    UnknownSession(Uuid),
    /// Session record already exists.
    #[error("session already exists: {0}")]
    SessionExists(Uuid),
    /// Backend refused or could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
