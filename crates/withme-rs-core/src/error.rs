//! Error types for the kernel crate.

use thiserror::Error;
use withme_rs_config::ConfigError;
use withme_rs_protocol::TurnId;
use withme_rs_store::StoreError;

/// Generic supportive message shown when the cause is not worth surfacing.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors returned by kernel operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Malformed request: missing session id, missing payload field, bad payload.
    #[error("{0}")]
    Validation(String),
    /// Action name not understood by the router.
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    /// A governance or lexicon pattern failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(String),
    /// Config failed validation at construction.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Durable store error on a read or write the request depends on.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Model provider error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    /// Background turn task failed to complete.
    #[error("executor error: {0}")]
    Executor(String),
    /// Consumer went away before the streamed reply finished.
    #[error("turn cancelled: {0}")]
    Cancelled(TurnId),
}

impl KernelError {
    /// True for errors caused by the request itself; these are not retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            KernelError::Validation(_) | KernelError::UnknownAction(_)
        )
    }

    /// Text that is safe and supportive to show to the person chatting.
    pub fn user_message(&self) -> String {
        match self {
            KernelError::Validation(message) => message.clone(),
            KernelError::UnknownAction(_) => self.to_string(),
            KernelError::Provider(err) => err.kind().user_message().to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Errors returned by reply providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider is throttling requests (HTTP 429).
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Account quota or credits exhausted (HTTP 402).
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    /// Credentials rejected (HTTP 401/403).
    #[error("authentication failed: {0}")]
    Auth(String),
    /// Any other non-success HTTP status.
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
    /// Connection, timeout, or stream read failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Coarse cause used to pick the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFailure {
    Throttled,
    Unavailable,
    Unknown,
}

impl ProviderFailure {
    pub fn user_message(&self) -> &'static str {
        match self {
            ProviderFailure::Throttled => {
                "I'm receiving a lot of messages right now. Could you try again in a moment?"
            }
            ProviderFailure::Unavailable => {
                "The service is temporarily unavailable. Please try again later."
            }
            ProviderFailure::Unknown => GENERIC_FAILURE_MESSAGE,
        }
    }
}

impl ProviderError {
    /// Map an HTTP status and body onto the matching variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => ProviderError::RateLimited(message),
            402 => ProviderError::QuotaExceeded(message),
            401 | 403 => ProviderError::Auth(message),
            status => ProviderError::Api { status, message },
        }
    }

    pub fn kind(&self) -> ProviderFailure {
        match self {
            ProviderError::RateLimited(_) => ProviderFailure::Throttled,
            ProviderError::QuotaExceeded(_) | ProviderError::Transport(_) => {
                ProviderFailure::Unavailable
            }
            ProviderError::Api { status, .. } if *status >= 500 => ProviderFailure::Unavailable,
            _ => ProviderFailure::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_codes_map_to_failure_kinds() {
        assert_eq!(
            ProviderError::from_status(429, "slow down").kind(),
            ProviderFailure::Throttled
        );
        assert_eq!(
            ProviderError::from_status(402, "no credits").kind(),
            ProviderFailure::Unavailable
        );
        assert_eq!(
            ProviderError::from_status(503, "down").kind(),
            ProviderFailure::Unavailable
        );
        assert_eq!(
            ProviderError::from_status(401, "bad key").kind(),
            ProviderFailure::Unknown
        );
        assert_eq!(
            ProviderError::from_status(400, "bad request").kind(),
            ProviderFailure::Unknown
        );
    }

    #[test]
    fn user_messages_stay_supportive() {
        let throttled = KernelError::Provider(ProviderError::RateLimited("x".to_string()));
        assert_eq!(
            throttled.user_message(),
            "I'm receiving a lot of messages right now. Could you try again in a moment?"
        );
        let store = KernelError::Executor("join failed".to_string());
        assert_eq!(store.user_message(), GENERIC_FAILURE_MESSAGE);
        assert!(!store.is_client_error());
        assert!(KernelError::UnknownAction("dance".to_string()).is_client_error());
        assert_eq!(
            KernelError::UnknownAction("dance".to_string()).to_string(),
            "Unknown action: dance"
        );
    }
}
