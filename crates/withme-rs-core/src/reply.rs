//! Reply generator adapter.
//!
//! Assembles the system instruction, the bounded history window and the new
//! user text, then forwards them to the provider. Output is returned verbatim;
//! content safety is enforced on the input side.

use crate::error::ProviderError;
use crate::prompt::build_system_prompt;
use crate::provider::{ChatMessage, CompletionRequest, ReplyProvider, TextStream};
use std::sync::Arc;
use withme_rs_config::KernelConfig;
use withme_rs_protocol::Role;
use withme_rs_store::{MemoryRecord, MessageRecord};

/// Returned when the provider produced no text.
pub const FALLBACK_REPLY: &str = "I'm here with you.";

/// Inputs for one generated reply.
#[derive(Debug, Clone, Copy)]
pub struct ReplyRequest<'a> {
    pub text: &'a str,
    /// Prior turns, oldest first.
    pub history: &'a [MessageRecord],
    pub companion_name: &'a str,
    pub is_dependency: bool,
    pub memories: &'a [MemoryRecord],
}

#[derive(Clone)]
pub struct ReplyGenerator {
    provider: Arc<dyn ReplyProvider>,
    max_tokens: u32,
    temperature: f32,
    history_window: usize,
}

impl ReplyGenerator {
    pub fn new(provider: Arc<dyn ReplyProvider>, config: &KernelConfig) -> Self {
        Self {
            provider,
            max_tokens: config.provider.max_tokens,
            temperature: config.provider.temperature,
            history_window: config.chat.history_window,
        }
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Build the full chat-completions request for a reply.
    pub fn build_request(&self, request: &ReplyRequest<'_>) -> CompletionRequest {
        let skip = request.history.len().saturating_sub(self.history_window);
        let mut messages = Vec::with_capacity(request.history.len() - skip + 2);
        messages.push(ChatMessage::system(build_system_prompt(
            request.companion_name,
            request.is_dependency,
            request.memories,
        )));
        messages.extend(
            request.history[skip..]
                .iter()
                .filter(|message| message.role != Role::System)
                .map(|message| ChatMessage::new(message.role, message.content.clone())),
        );
        messages.push(ChatMessage::user(request.text));
        CompletionRequest {
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    pub async fn generate(&self, request: &ReplyRequest<'_>) -> Result<String, ProviderError> {
        let reply = self.provider.complete(self.build_request(request)).await?;
        Ok(or_fallback(reply))
    }

    /// Streamed variant; an empty stream is the caller's cue to use
    /// [`FALLBACK_REPLY`].
    pub async fn generate_stream(
        &self,
        request: &ReplyRequest<'_>,
    ) -> Result<TextStream, ProviderError> {
        self.provider
            .complete_stream(self.build_request(request))
            .await
    }
}

/// Replace an empty or whitespace-only reply with [`FALLBACK_REPLY`].
pub fn or_fallback(reply: String) -> String {
    if reply.trim().is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;
    use withme_rs_config::ChatConfig;

    struct Silent;

    #[async_trait]
    impl ReplyProvider for Silent {
        fn model(&self) -> &str {
            "silent"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<String, ProviderError> {
            Ok("  ".to_string())
        }
    }

    fn generator(history_window: usize) -> ReplyGenerator {
        let config = KernelConfig::builder()
            .chat(ChatConfig {
                history_window,
                ..ChatConfig::default()
            })
            .build();
        ReplyGenerator::new(Arc::new(Silent), &config)
    }

    fn history(session_id: Uuid, count: usize) -> Vec<MessageRecord> {
        (0..count)
            .map(|idx| {
                let role = if idx % 2 == 0 { Role::User } else { Role::Assistant };
                MessageRecord::new(session_id, role, format!("turn {idx}"))
            })
            .collect()
    }

    #[test]
    fn request_keeps_most_recent_window_in_order() {
        let session_id = Uuid::new_v4();
        let history = history(session_id, 6);
        let request = generator(3).build_request(&ReplyRequest {
            text: "now",
            history: &history,
            companion_name: "Still",
            is_dependency: false,
            memories: &[],
        });
        let contents = request
            .messages
            .iter()
            .skip(1)
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["turn 3", "turn 4", "turn 5", "now"]);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.max_tokens, 500);
    }

    #[tokio::test]
    async fn blank_output_uses_fallback() {
        let reply = generator(20)
            .generate(&ReplyRequest {
                text: "hello",
                history: &[],
                companion_name: "Still",
                is_dependency: false,
                memories: &[],
            })
            .await
            .expect("reply");
        assert_eq!(reply, FALLBACK_REPLY);
    }
}
