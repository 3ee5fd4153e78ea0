//! Wire protocol types for the withme kernel: requests, events, and shared enums.

mod crisis;
mod request;
mod signal;

pub use crisis::{CrisisResources, Hotline, RegionOption};
pub use request::{
    ChatPayload, CheckinPayload, KernelAction, KernelRequest, MemoryPayload, MemorySubAction,
};
pub use signal::{
    AuditActor, AuditResult, CrisisSeverity, EmotionEstimate, GovernanceResult, Role,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session.
pub type SessionId = Uuid;
/// Unique identifier for a chat turn.
pub type TurnId = Uuid;

/// Wrapper for events emitted while a chat turn runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMsg {
    /// Unique id for the event.
    pub id: Uuid,
    /// Session id associated with the event.
    pub session_id: SessionId,
    /// Timestamp when the event was created.
    pub created_at: DateTime<Utc>,
    /// Event payload content.
    pub payload: EventPayload,
}

impl EventMsg {
    /// Stamp a payload with a fresh id and the current time.
    pub fn new(session_id: SessionId, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            created_at: Utc::now(),
            payload,
        }
    }
}

/// All events emitted during a streamed chat turn, in emission order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type", content = "payload")]
pub enum EventPayload {
    /// Turn lifecycle started.
    TurnStarted { turn_id: TurnId },
    /// Governance and emotion scoring finished for the user input.
    GovernanceEvaluated {
        turn_id: TurnId,
        governance_result: GovernanceResult,
        crisis_mode: bool,
        crisis_severity: Option<CrisisSeverity>,
        is_dependency: bool,
        emotion: EmotionEstimate,
        policy_refs: Vec<String>,
    },
    /// Incremental reply fragment, delivered in generation order.
    ReplyDelta { turn_id: TurnId, delta: String },
    /// Turn lifecycle completed with the full reply text.
    TurnCompleted { turn_id: TurnId, reply: String },
    /// Error event for the turn.
    Error {
        turn_id: Option<TurnId>,
        message: String,
    },
}

/// Sink interface for kernel events.
pub trait EventSink: Send + Sync {
    /// Emit an event to downstream listeners.
    fn emit(&self, event: EventMsg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn reply_delta_serializes_with_tag_and_payload() {
        let turn_id = Uuid::nil();
        let payload = EventPayload::ReplyDelta {
            turn_id,
            delta: "I'm here".to_string(),
        };
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(
            value,
            json!({
                "type": "reply_delta",
                "payload": {
                    "turn_id": "00000000-0000-0000-0000-000000000000",
                    "delta": "I'm here"
                }
            })
        );
    }
}
