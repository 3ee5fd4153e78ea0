//! OpenAI-compatible chat-completions adapter.

use super::sse::SseDecoder;
use super::{CompletionRequest, ReplyProvider, TextStream};
use crate::error::ProviderError;
use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use log::{debug, error};
use reqwest::Client;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::time::Duration;
use withme_rs_config::ProviderConfig;

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Talks to any gateway exposing `POST {base_url}/v1/chat/completions`.
pub struct OpenAiCompatibleProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatibleProvider {
    /// Build from config. The key comes from `config.api_key` only; callers
    /// resolve environment variables before this point.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(client_error)?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}{}",
                config.base_url.trim_end_matches('/'),
                COMPLETIONS_PATH
            ),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self.client.post(&self.endpoint).json(body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(
                "model gateway returned error (status={}, model={}, body_len={})",
                status.as_u16(),
                self.model,
                message.len()
            );
            return Err(ProviderError::from_status(status.as_u16(), message));
        }
        Ok(response)
    }
}

fn client_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Transport(format!("failed to build http client: {err}"))
}

struct FragmentState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

fn fragments<S, B>(bytes: S) -> impl Stream<Item = Result<String, ProviderError>>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    let state = FragmentState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.finished || state.decoder.is_done() {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let decoded = state.decoder.push(chunk.as_ref());
                    state.pending.extend(decoded);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(ProviderError::Transport(err.to_string())), state));
                }
                None => {
                    state.finished = true;
                    let decoded = state.decoder.finish();
                    state.pending.extend(decoded);
                }
            }
        }
    })
}

#[async_trait]
impl ReplyProvider for OpenAiCompatibleProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let body = self.request_body(&request, false);
        debug!(
            "requesting completion (model={}, messages={})",
            self.model,
            request.messages.len()
        );
        let response = self.send(&body).await?;
        let value: Value = response
            .json()
            .await
            .map_err(|err| ProviderError::Decode(err.to_string()))?;
        Ok(value["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> Result<TextStream, ProviderError> {
        let body = self.request_body(&request, true);
        debug!(
            "requesting streamed completion (model={}, messages={})",
            self.model,
            request.messages.len()
        );
        let response = self.send(&body).await?;
        Ok(Box::pin(fragments(Box::pin(response.bytes_stream()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatMessage, collect_text};
    use pretty_assertions::assert_eq;

    fn config() -> ProviderConfig {
        ProviderConfig {
            base_url: "https://gateway.example/".to_string(),
            model: "test-model".to_string(),
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn endpoint_joins_base_url() {
        let provider = OpenAiCompatibleProvider::from_config(&config()).expect("provider");
        assert_eq!(
            provider.endpoint(),
            "https://gateway.example/v1/chat/completions"
        );
    }

    #[test]
    fn request_body_matches_chat_completions_shape() {
        let provider = OpenAiCompatibleProvider::from_config(&config()).expect("provider");
        let request = CompletionRequest {
            messages: vec![ChatMessage::system("be kind"), ChatMessage::user("hi")],
            max_tokens: 500,
            temperature: 0.5,
        };
        assert_eq!(
            provider.request_body(&request, true),
            json!({
                "model": "test-model",
                "messages": [
                    { "role": "system", "content": "be kind" },
                    { "role": "user", "content": "hi" }
                ],
                "max_tokens": 500,
                "temperature": 0.5,
                "stream": true
            })
        );
        assert!(provider.request_body(&request, false).get("stream").is_none());
    }

    #[test]
    fn client_build_failure_is_a_transport_error() {
        let err = Client::new()
            .get("not a url")
            .build()
            .expect_err("relative url");
        match client_error(err) {
            ProviderError::Transport(message) => {
                assert!(message.starts_with("failed to build http client: "));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn byte_chunks_become_ordered_fragments() {
        let chunks: Vec<Result<Vec<u8>, reqwest::Error>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"I'm \"}}]}\n\nda".to_vec()),
            Ok(b"ta: {\"choices\":[{\"delta\":{\"content\":\"here\"}}]}\n\n".to_vec()),
            Ok(b"data: [DONE]\n\n".to_vec()),
        ];
        let stream: TextStream = Box::pin(fragments(stream::iter(chunks)));
        assert_eq!(collect_text(stream).await.expect("collect"), "I'm here");
    }
}
