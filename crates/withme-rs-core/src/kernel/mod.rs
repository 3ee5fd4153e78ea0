//! Kernel orchestrator: request routing and the chat turn driver.

mod actions;
pub mod pipeline;
mod response;
mod stream;

pub use pipeline::{
    AllowedTurn, AuditedTurn, BlockedTurn, ClassifiedTurn, LoopedTurn, ReceivedTurn, Route,
    ScoredTurn, TurnInput,
};
pub use response::{
    ChatResponse, CheckinResponse, ExportBundle, KernelResponse, MemoryDeleteResponse,
    MemoryListResponse, NebulaResponse, StatusResponse,
};
pub use stream::ChatStream;

use crate::audit::AuditLedger;
use crate::crisis::resources_for_region;
use crate::emotion::EmotionInferencer;
use crate::error::KernelError;
use crate::governance::GovernanceEngine;
use crate::naming::{NameSuggestion, suggest_companion_name};
use crate::provider::{OpenAiCompatibleProvider, ReplyProvider};
use crate::reply::{FALLBACK_REPLY, ReplyGenerator, ReplyRequest};
use crate::thought_loop::ThoughtLoopAggregator;
use futures_util::stream::StreamExt;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use stream::{RUN_STREAM_BUFFER, RunEventBus, TurnEvents};
use uuid::Uuid;
use withme_rs_config::KernelConfig;
use withme_rs_protocol::{
    ChatPayload, CheckinPayload, EventPayload, EventSink, KernelAction, KernelRequest,
    MemoryPayload, MemorySubAction, Role, SessionId, TurnId,
};
use withme_rs_store::{JsonlKernelStore, KernelStore, MemoryRecord, MessageRecord, StoreError};

pub const SESSION_ID_REQUIRED: &str = "sessionId is required";
pub const SESSION_ID_INVALID: &str = "sessionId must be a UUID";
pub const UNKNOWN_MEMORY_SUB_ACTION: &str = "Unknown memory subAction";
pub const MEMORY_ID_REQUIRED: &str = "memoryId is required";

/// Parse the request's session id, rejecting missing or malformed values.
pub fn parse_session_id(raw: Option<&str>) -> Result<SessionId, KernelError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| KernelError::Validation(SESSION_ID_REQUIRED.to_string()))?;
    Uuid::parse_str(raw).map_err(|_| KernelError::Validation(SESSION_ID_INVALID.to_string()))
}

fn decode_payload<T>(payload: Value, action: KernelAction) -> Result<T, KernelError>
where
    T: DeserializeOwned + Default,
{
    if payload.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(payload).map_err(|err| {
        KernelError::Validation(format!("invalid {} payload: {err}", action.as_str()))
    })
}

/// Companion settings a turn needs from the session row.
struct SessionContext {
    companion_name: String,
    region: String,
}

pub(crate) struct KernelInner {
    config: KernelConfig,
    store: Arc<dyn KernelStore>,
    provider: Arc<dyn ReplyProvider>,
    governance: GovernanceEngine,
    emotions: EmotionInferencer,
    ledger: AuditLedger,
    thought_loop: ThoughtLoopAggregator,
    replies: ReplyGenerator,
    event_sink: Option<Arc<dyn EventSink>>,
}

/// Builder for [`Kernel`].
pub struct KernelBuilder {
    config: KernelConfig,
    store: Arc<dyn KernelStore>,
    provider: Arc<dyn ReplyProvider>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl KernelBuilder {
    /// Observer that receives every turn event, streamed or not.
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Kernel, KernelError> {
        self.config.validate()?;
        let governance = GovernanceEngine::standard()?;
        let emotions = EmotionInferencer::new()?;
        let ledger = AuditLedger::new(self.store.clone());
        let thought_loop = ThoughtLoopAggregator::new(
            self.store.clone(),
            self.config.thought_loop.capacity,
            self.config.thought_loop.snippet_chars,
        );
        let replies = ReplyGenerator::new(self.provider.clone(), &self.config);
        info!(
            "kernel initialized (model={}, history_window={}, stream={})",
            self.provider.model(),
            self.config.chat.history_window,
            self.config.chat.stream
        );
        Ok(Kernel {
            inner: Arc::new(KernelInner {
                config: self.config,
                store: self.store,
                provider: self.provider,
                governance,
                emotions,
                ledger,
                thought_loop,
                replies,
                event_sink: self.event_sink,
            }),
        })
    }
}

/// Governance kernel façade. Cheap to clone; clones share one set of
/// collaborators.
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<KernelInner>,
}

impl Kernel {
    pub fn builder(
        config: KernelConfig,
        store: Arc<dyn KernelStore>,
        provider: Arc<dyn ReplyProvider>,
    ) -> KernelBuilder {
        KernelBuilder {
            config,
            store,
            provider,
            event_sink: None,
        }
    }

    pub fn new(
        config: KernelConfig,
        store: Arc<dyn KernelStore>,
        provider: Arc<dyn ReplyProvider>,
    ) -> Result<Self, KernelError> {
        Self::builder(config, store, provider).build()
    }

    /// Kernel over the default JSONL store and the OpenAI-compatible provider.
    pub fn from_config(config: KernelConfig) -> Result<Self, KernelError> {
        let root = config.store_root().ok_or_else(|| {
            StoreError::Unavailable("unable to resolve a store directory".to_string())
        })?;
        info!("initializing kernel store (root={})", root.display());
        let store: Arc<dyn KernelStore> = Arc::new(JsonlKernelStore::new(root)?);
        let provider: Arc<dyn ReplyProvider> =
            Arc::new(OpenAiCompatibleProvider::from_config(&config.provider)?);
        Self::new(config, store, provider)
    }

    pub fn config(&self) -> &KernelConfig {
        &self.inner.config
    }

    pub fn store(&self) -> Arc<dyn KernelStore> {
        self.inner.store.clone()
    }

    /// Validate and route one request envelope.
    pub async fn handle(&self, request: KernelRequest) -> Result<KernelResponse, KernelError> {
        let session_id = parse_session_id(request.session_id.as_deref())?;
        let action = KernelAction::parse(&request.action)
            .ok_or_else(|| KernelError::UnknownAction(request.action.clone()))?;
        info!(
            "handling kernel request (session_id={}, action={}, anonymous={})",
            session_id,
            action.as_str(),
            request.anonymous_id.is_some()
        );
        match action {
            KernelAction::Chat => {
                let payload: ChatPayload = decode_payload(request.payload, action)?;
                self.chat(session_id, &payload.text)
                    .await
                    .map(KernelResponse::Chat)
            }
            KernelAction::Checkin => {
                let payload: CheckinPayload = decode_payload(request.payload, action)?;
                self.checkin(session_id, payload)
                    .await
                    .map(KernelResponse::Checkin)
            }
            KernelAction::Memory => {
                let payload: MemoryPayload = decode_payload(request.payload, action)?;
                match payload
                    .sub_action
                    .as_deref()
                    .and_then(MemorySubAction::parse)
                {
                    Some(MemorySubAction::List) => self
                        .list_memories(session_id)
                        .await
                        .map(KernelResponse::Memories),
                    Some(MemorySubAction::Delete) => {
                        let memory_id = payload.memory_id.ok_or_else(|| {
                            KernelError::Validation(MEMORY_ID_REQUIRED.to_string())
                        })?;
                        self.delete_memory(session_id, memory_id)
                            .await
                            .map(KernelResponse::MemoryDeleted)
                    }
                    None => Err(KernelError::Validation(
                        UNKNOWN_MEMORY_SUB_ACTION.to_string(),
                    )),
                }
            }
            KernelAction::Nebula => self.nebulae(session_id).await.map(KernelResponse::Nebulae),
            KernelAction::Status => self.status(session_id).await.map(KernelResponse::Status),
            KernelAction::Export => self
                .export(session_id)
                .await
                .map(|bundle| KernelResponse::Export(Box::new(bundle))),
        }
    }

    /// Run one chat turn to completion.
    pub async fn chat(
        &self,
        session_id: SessionId,
        text: &str,
    ) -> Result<ChatResponse, KernelError> {
        let turn_id = Uuid::new_v4();
        let received = ReceivedTurn::new(session_id, turn_id, text)?;
        debug!(
            "running chat turn (session_id={}, turn_id={}, text_len={})",
            session_id,
            turn_id,
            text.len()
        );
        let events = TurnEvents::new(session_id, self.inner.event_sink.clone(), None);
        self.inner
            .run_turn(received, events, self.inner.config.chat.stream)
            .await
    }

    /// Run one chat turn in the background, streaming its events.
    pub async fn chat_stream(
        &self,
        session_id: SessionId,
        text: impl Into<String>,
    ) -> Result<ChatStream, KernelError> {
        let turn_id = Uuid::new_v4();
        let received = ReceivedTurn::new(session_id, turn_id, text)?;
        debug!(
            "streaming chat turn (session_id={}, turn_id={}, text_len={})",
            session_id,
            turn_id,
            received.input().text.len()
        );
        let (bus, receiver) = RunEventBus::new(RUN_STREAM_BUFFER);
        let events = TurnEvents::new(session_id, self.inner.event_sink.clone(), Some(bus));
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move { inner.run_turn(received, events, true).await });
        Ok(ChatStream::new(session_id, turn_id, receiver, handle))
    }

    /// Ask the model to propose a companion name.
    pub async fn suggest_name(&self) -> NameSuggestion {
        suggest_companion_name(self.inner.provider.as_ref()).await
    }
}

impl KernelInner {
    async fn run_turn(
        &self,
        received: ReceivedTurn,
        events: TurnEvents,
        stream: bool,
    ) -> Result<ChatResponse, KernelError> {
        let session_id = received.input().session_id;
        let turn_id = received.input().turn_id;
        events.emit(EventPayload::TurnStarted { turn_id }).await;
        match self.drive_turn(received, &events, stream).await {
            Ok(response) => {
                events
                    .emit(EventPayload::TurnCompleted {
                        turn_id,
                        reply: response.reply.clone(),
                    })
                    .await;
                info!(
                    "chat turn completed (session_id={}, turn_id={}, result={:?}, crisis={})",
                    session_id, turn_id, response.governance_result, response.crisis_mode
                );
                Ok(response)
            }
            Err(err) => {
                warn!(
                    "chat turn failed (session_id={}, turn_id={}): {}",
                    session_id, turn_id, err
                );
                events
                    .emit(EventPayload::Error {
                        turn_id: Some(turn_id),
                        message: err.user_message(),
                    })
                    .await;
                Err(err)
            }
        }
    }

    async fn drive_turn(
        &self,
        received: ReceivedTurn,
        events: &TurnEvents,
        stream: bool,
    ) -> Result<ChatResponse, KernelError> {
        let session_id = received.input().session_id;
        let turn_id = received.input().turn_id;
        let session = self.session_context(session_id).await?;
        let turn = received
            .classify(&self.governance)
            .score(&self.emotions)
            .record(&self.ledger)
            .await
            .loop_updated(&self.thought_loop)
            .await;
        events.emit(turn.governance_event()).await;
        let text = turn.input().text.clone();

        let response = match turn.route() {
            Route::Blocked(blocked) => {
                events
                    .emit(EventPayload::ReplyDelta {
                        turn_id,
                        delta: blocked.reply().to_string(),
                    })
                    .await;
                blocked.redirect(&self.ledger).await
            }
            Route::Allowed(allowed) => {
                let history = self
                    .store
                    .recent_messages(session_id, self.config.chat.history_window)
                    .await?;
                let memories = self.memory_context(session_id).await?;
                let reply = {
                    let request = ReplyRequest {
                        text: &allowed.input().text,
                        history: &history,
                        companion_name: &session.companion_name,
                        is_dependency: allowed.decision().is_dependency,
                        memories: &memories,
                    };
                    if stream {
                        self.stream_reply(&request, turn_id, events).await?
                    } else {
                        let reply = self.replies.generate(&request).await?;
                        events
                            .emit(EventPayload::ReplyDelta {
                                turn_id,
                                delta: reply.clone(),
                            })
                            .await;
                        reply
                    }
                };
                let resources = allowed
                    .decision()
                    .is_crisis
                    .then(|| resources_for_region(&session.region));
                allowed.complete(reply, &self.ledger, resources).await
            }
        };

        self.persist_exchange(session_id, &text, &response).await;
        Ok(response)
    }

    async fn stream_reply(
        &self,
        request: &ReplyRequest<'_>,
        turn_id: TurnId,
        events: &TurnEvents,
    ) -> Result<String, KernelError> {
        let mut fragments = self.replies.generate_stream(request).await?;
        let mut reply = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            if events.is_abandoned() {
                info!("stream consumer went away, stopping reply (turn_id={})", turn_id);
                return Err(KernelError::Cancelled(turn_id));
            }
            reply.push_str(&fragment);
            events
                .emit(EventPayload::ReplyDelta {
                    turn_id,
                    delta: fragment,
                })
                .await;
        }
        if reply.trim().is_empty() {
            reply = FALLBACK_REPLY.to_string();
            events
                .emit(EventPayload::ReplyDelta {
                    turn_id,
                    delta: reply.clone(),
                })
                .await;
        }
        Ok(reply)
    }

    async fn session_context(&self, session_id: SessionId) -> Result<SessionContext, KernelError> {
        let companion = &self.config.companion;
        Ok(match self.store.load_session(session_id).await? {
            Some(session) => SessionContext {
                companion_name: session.companion_name,
                region: session.region,
            },
            None => {
                debug!(
                    "no session row, using companion defaults (session_id={})",
                    session_id
                );
                SessionContext {
                    companion_name: companion.default_name.clone(),
                    region: companion.default_region.clone(),
                }
            }
        })
    }

    /// Most recent memories, newest first, capped for the prompt.
    async fn memory_context(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<MemoryRecord>, KernelError> {
        let mut memories = self.store.list_memories(session_id).await?;
        memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        memories.truncate(self.config.chat.memory_context_limit);
        Ok(memories)
    }

    /// Append the user and assistant turns. Failures are logged only.
    async fn persist_exchange(&self, session_id: SessionId, text: &str, response: &ChatResponse) {
        let mut user = MessageRecord::new(session_id, Role::User, text);
        user.is_crisis_flagged = response.crisis_mode;
        let assistant = MessageRecord::new(session_id, Role::Assistant, response.reply.clone());
        for message in [user, assistant] {
            if let Err(err) = self.store.append_message(&message).await {
                warn!(
                    "failed to append message (session_id={}, role={}): {}",
                    session_id,
                    message.role.as_str(),
                    err
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn session_id_validation() {
        assert_eq!(
            parse_session_id(None).expect_err("missing").to_string(),
            SESSION_ID_REQUIRED
        );
        assert_eq!(
            parse_session_id(Some("  ")).expect_err("blank").to_string(),
            SESSION_ID_REQUIRED
        );
        assert_eq!(
            parse_session_id(Some("session-1")).expect_err("not uuid").to_string(),
            SESSION_ID_INVALID
        );
        let id = Uuid::new_v4();
        assert_eq!(
            parse_session_id(Some(&id.to_string())).expect("uuid"),
            id
        );
    }

    #[test]
    fn null_payload_decodes_to_default() {
        let payload: CheckinPayload =
            decode_payload(Value::Null, KernelAction::Checkin).expect("decode");
        assert_eq!(payload, CheckinPayload::default());
        let err =
            decode_payload::<ChatPayload>(serde_json::json!({ "text": 3 }), KernelAction::Chat)
                .expect_err("bad type");
        assert!(err.to_string().starts_with("invalid chat payload"));
    }
}
