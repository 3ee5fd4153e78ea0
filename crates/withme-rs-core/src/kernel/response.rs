//! Response shapes returned by kernel actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use withme_rs_protocol::{CrisisResources, CrisisSeverity, EmotionEstimate, GovernanceResult};
use withme_rs_store::{
    AuditRecord, CheckInRecord, MemoryRecord, MessageRecord, NebulaRecord, SessionRecord,
};

/// Result of one chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub emotion: EmotionEstimate,
    pub crisis_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crisis_severity: Option<CrisisSeverity>,
    pub is_dependency: bool,
    pub governance_result: GovernanceResult,
    pub policy_refs: Vec<String>,
    /// Present on crisis turns only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crisis_resources: Option<CrisisResources>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinResponse {
    pub stored: bool,
    pub event_id: Uuid,
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryListResponse {
    /// Newest first.
    pub memories: Vec<MemoryRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NebulaResponse {
    /// Most recently updated first.
    pub nebulae: Vec<NebulaRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub healthy: bool,
    pub model: String,
    pub memory_count: usize,
    pub message_count: usize,
    pub last_checkin: Option<DateTime<Utc>>,
    pub governance_active: bool,
}

/// Everything persisted for a session at collection time, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub exported_at: DateTime<Utc>,
    pub session: Option<SessionRecord>,
    pub messages: Vec<MessageRecord>,
    pub memories: Vec<MemoryRecord>,
    pub check_ins: Vec<CheckInRecord>,
    pub audit_log: Vec<AuditRecord>,
}

/// Response for any routed [`withme_rs_protocol::KernelRequest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KernelResponse {
    Chat(ChatResponse),
    Checkin(CheckinResponse),
    Memories(MemoryListResponse),
    MemoryDeleted(MemoryDeleteResponse),
    Nebulae(NebulaResponse),
    Status(StatusResponse),
    Export(Box<ExportBundle>),
}
