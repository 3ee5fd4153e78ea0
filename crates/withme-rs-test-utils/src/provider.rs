use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use withme_rs_core::{CompletionRequest, ProviderError, ReplyProvider, TextStream};

const STUB_MODEL: &str = "stub-model";

#[derive(Debug, Clone)]
pub struct FixedProvider {
    reply: String,
}

impl FixedProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl ReplyProvider for FixedProvider {
    fn model(&self) -> &str {
        STUB_MODEL
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<String, ProviderError> {
        Ok(self.reply.clone())
    }
}

/// Records every request it receives.
#[derive(Debug, Clone)]
pub struct RecordingProvider {
    reply: String,
    seen: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl RecordingProvider {
    pub fn new(reply: impl Into<String>) -> (Self, Arc<Mutex<Vec<CompletionRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                reply: reply.into(),
                seen: seen.clone(),
            },
            seen,
        )
    }
}

#[async_trait]
impl ReplyProvider for RecordingProvider {
    fn model(&self) -> &str {
        STUB_MODEL
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        self.seen.lock().push(request);
        Ok(self.reply.clone())
    }
}

/// Yields fixed fragments from `complete_stream`.
#[derive(Debug, Clone)]
pub struct StreamingProvider {
    chunks: Vec<String>,
    delay: Option<Duration>,
}

impl StreamingProvider {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            delay: None,
        }
    }

    /// Sleep before yielding each fragment.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ReplyProvider for StreamingProvider {
    fn model(&self) -> &str {
        STUB_MODEL
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<String, ProviderError> {
        Ok(self.chunks.join(""))
    }

    async fn complete_stream(
        &self,
        _request: CompletionRequest,
    ) -> Result<TextStream, ProviderError> {
        let fragments = self.chunks.clone().into_iter().map(Ok).collect::<Vec<_>>();
        match self.delay {
            None => Ok(Box::pin(stream::iter(fragments))),
            Some(delay) => Ok(Box::pin(stream::iter(fragments).then(move |fragment| async move {
                tokio::time::sleep(delay).await;
                fragment
            }))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Status(u16),
    Transport,
}

/// Fails every call with a fixed cause.
#[derive(Debug, Clone, Copy)]
pub struct FailingProvider {
    failure: Failure,
}

impl FailingProvider {
    /// Fail as if the gateway answered with `status`.
    pub fn status(status: u16) -> Self {
        Self {
            failure: Failure::Status(status),
        }
    }

    pub fn transport() -> Self {
        Self {
            failure: Failure::Transport,
        }
    }

    fn error(&self) -> ProviderError {
        match self.failure {
            Failure::Status(status) => ProviderError::from_status(status, "stub failure"),
            Failure::Transport => ProviderError::Transport("connection refused".to_string()),
        }
    }
}

#[async_trait]
impl ReplyProvider for FailingProvider {
    fn model(&self) -> &str {
        STUB_MODEL
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<String, ProviderError> {
        Err(self.error())
    }
}
