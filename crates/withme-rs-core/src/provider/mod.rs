//! Model provider seam.
//!
//! The kernel only sees [`ReplyProvider`] and an incremental [`TextStream`] of
//! reply fragments; wire framing stays inside each adapter.

mod openai;
mod sse;

pub use openai::OpenAiCompatibleProvider;
pub use sse::SseDecoder;

use crate::error::ProviderError;
use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use withme_rs_protocol::Role;

/// Ordered reply fragments from a provider.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// One `{role, content}` message sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Chat-completions request minus the model, which the provider owns.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait ReplyProvider: Send + Sync {
    /// Model identifier reported by `status`.
    fn model(&self) -> &str;

    /// Single-shot completion.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;

    /// Streamed completion. Providers without streaming yield one fragment.
    async fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> Result<TextStream, ProviderError> {
        let text = self.complete(request).await?;
        Ok(Box::pin(stream::once(async move { Ok(text) })))
    }
}

/// Drain a fragment stream into one string, stopping at the first error.
pub async fn collect_text(mut fragments: TextStream) -> Result<String, ProviderError> {
    let mut text = String::new();
    while let Some(fragment) = fragments.next().await {
        text.push_str(&fragment?);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Echo;

    #[async_trait]
    impl ReplyProvider for Echo {
        fn model(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
            Ok(request
                .messages
                .last()
                .map(|message| message.content.clone())
                .unwrap_or_default())
        }
    }

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::user(text)],
            max_tokens: 10,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn default_stream_yields_single_fragment() {
        let stream = Echo.complete_stream(request("hello")).await.expect("stream");
        assert_eq!(collect_text(stream).await.expect("collect"), "hello");
    }

    #[tokio::test]
    async fn collect_stops_at_first_error() {
        let fragments: TextStream = Box::pin(stream::iter(vec![
            Ok("I'm ".to_string()),
            Err(ProviderError::Transport("reset".to_string())),
            Ok("here".to_string()),
        ]));
        let err = collect_text(fragments).await.expect_err("error");
        assert!(matches!(err, ProviderError::Transport(_)));
    }

    #[test]
    fn chat_message_serializes_lowercase_role() {
        let value = serde_json::to_value(ChatMessage::assistant("hi")).expect("serialize");
        assert_eq!(value, serde_json::json!({ "role": "assistant", "content": "hi" }));
    }
}
