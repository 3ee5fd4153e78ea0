//! Request envelope and per-action payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One logical call into the kernel.
///
/// `action` and `sessionId` are kept loose so the kernel can report missing
/// or unknown values as validation errors instead of decode failures.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct KernelRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub anonymous_id: Option<String>,
    #[serde(default = "empty_payload")]
    pub payload: Value,
}

impl KernelRequest {
    /// Build a request for an action with an object payload.
    pub fn new(action: KernelAction, session_id: impl Into<String>, payload: Value) -> Self {
        Self {
            action: action.as_str().to_string(),
            session_id: Some(session_id.into()),
            anonymous_id: None,
            payload,
        }
    }
}

/// Actions understood by the kernel router.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KernelAction {
    Chat,
    Checkin,
    Memory,
    Nebula,
    Status,
    Export,
}

impl KernelAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            KernelAction::Chat => "chat",
            KernelAction::Checkin => "checkin",
            KernelAction::Memory => "memory",
            KernelAction::Nebula => "nebula",
            KernelAction::Status => "status",
            KernelAction::Export => "export",
        }
    }

    /// Parse an action name; `None` for anything unrecognized.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "chat" => Some(KernelAction::Chat),
            "checkin" => Some(KernelAction::Checkin),
            "memory" => Some(KernelAction::Memory),
            "nebula" => Some(KernelAction::Nebula),
            "status" => Some(KernelAction::Status),
            "export" => Some(KernelAction::Export),
            _ => None,
        }
    }
}

/// Payload for `chat`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatPayload {
    #[serde(default)]
    pub text: String,
}

/// Payload for `checkin`: self-reported 1..=5 scales.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckinPayload {
    #[serde(default)]
    pub sleep: Option<i32>,
    #[serde(default)]
    pub mood: Option<i32>,
    #[serde(default)]
    pub energy: Option<i32>,
    #[serde(default)]
    pub stress: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub skipped: bool,
}

/// Payload for `memory`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPayload {
    #[serde(default)]
    pub sub_action: Option<String>,
    #[serde(default)]
    pub memory_id: Option<Uuid>,
}

/// Memory sub-actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemorySubAction {
    List,
    Delete,
}

impl MemorySubAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "list" => Some(MemorySubAction::List),
            "delete" => Some(MemorySubAction::Delete),
            _ => None,
        }
    }
}

fn empty_payload() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_defaults_payload_to_empty_object() {
        let request: KernelRequest =
            serde_json::from_value(json!({ "action": "status", "sessionId": "abc" }))
                .expect("decode");
        assert_eq!(request.session_id.as_deref(), Some("abc"));
        assert_eq!(request.payload, json!({}));
        assert_eq!(KernelAction::parse(&request.action), Some(KernelAction::Status));
    }

    #[test]
    fn unknown_action_does_not_parse() {
        assert_eq!(KernelAction::parse("dance"), None);
        assert_eq!(KernelAction::parse("Chat"), None);
    }

    #[test]
    fn memory_payload_reads_camel_case_fields() {
        let payload: MemoryPayload = serde_json::from_value(json!({
            "subAction": "delete",
            "memoryId": "6f1c1f0e-8a41-4f55-9a3e-0d1f1f8f2b10"
        }))
        .expect("decode");
        assert_eq!(payload.sub_action.as_deref(), Some("delete"));
        assert!(payload.memory_id.is_some());
    }
}
