//! Persisted record models.
//!
//! Records serialize with snake_case field names so an export mirrors the
//! stored rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use withme_rs_protocol::{AuditActor, AuditResult, Role, SessionId};

/// How warm the companion should sound.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Warmth {
    #[default]
    High,
    Medium,
    Low,
}

/// Register the companion writes in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Formality {
    #[default]
    Casual,
    Balanced,
    Formal,
}

/// Preferred reply length.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    #[default]
    Concise,
    Balanced,
    Detailed,
}

/// Personality traits chosen during onboarding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CompanionTraits {
    #[serde(default)]
    pub warmth: Warmth,
    #[serde(default)]
    pub formality: Formality,
    #[serde(default)]
    pub verbosity: Verbosity,
}

/// Exactly one of these identifies who a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOwner {
    /// Authenticated user reference.
    User(String),
    /// Anonymous device reference.
    Anonymous(String),
}

/// One person's ongoing relationship with the companion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: SessionId,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub anonymous_id: Option<String>,
    pub region: String,
    #[serde(default)]
    pub onboarding_completed: bool,
    pub theme: String,
    pub companion_name: String,
    #[serde(default)]
    pub companion_traits: CompanionTraits,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Fresh session with onboarding defaults for the given owner.
    pub fn new(owner: SessionOwner, region: &str, companion_name: &str) -> Self {
        let now = Utc::now();
        let (user_id, anonymous_id) = match owner {
            SessionOwner::User(id) => (Some(id), None),
            SessionOwner::Anonymous(id) => (None, Some(id)),
        };
        Self {
            id: Uuid::new_v4(),
            user_id,
            anonymous_id,
            region: region.to_string(),
            onboarding_completed: false,
            theme: "system".to_string(),
            companion_name: companion_name.to_string(),
            companion_traits: CompanionTraits::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, owner: &SessionOwner) -> bool {
        match owner {
            SessionOwner::User(id) => self.user_id.as_deref() == Some(id.as_str()),
            SessionOwner::Anonymous(id) => self.anonymous_id.as_deref() == Some(id.as_str()),
        }
    }
}

/// Partial update applied by onboarding and settings screens.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SessionUpdate {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub onboarding_completed: Option<bool>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub companion_name: Option<String>,
    #[serde(default)]
    pub companion_traits: Option<CompanionTraits>,
}

impl SessionUpdate {
    /// Apply the set fields onto a session and bump `updated_at`.
    pub fn apply(&self, session: &mut SessionRecord) {
        if let Some(region) = &self.region {
            session.region = region.clone();
        }
        if let Some(done) = self.onboarding_completed {
            session.onboarding_completed = done;
        }
        if let Some(theme) = &self.theme {
            session.theme = theme.clone();
        }
        if let Some(name) = &self.companion_name {
            session.companion_name = name.clone();
        }
        if let Some(traits) = self.companion_traits {
            session.companion_traits = traits;
        }
        session.updated_at = Utc::now();
    }
}

/// One user or assistant turn. Never edited after it is appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageRecord {
    pub id: Uuid,
    pub session_id: SessionId,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub is_crisis_flagged: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(session_id: SessionId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            role,
            content: content.into(),
            is_crisis_flagged: false,
            created_at: Utc::now(),
        }
    }
}

/// A user-owned fact extracted from conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub session_id: SessionId,
    pub memory_type: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub consent: Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_message_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(
        session_id: SessionId,
        memory_type: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session_id,
            memory_type: memory_type.into(),
            title: title.into(),
            content: None,
            emotion: None,
            consent: Value::Null,
            tags: Vec::new(),
            source: None,
            source_message_id: None,
            metadata: Value::Object(Map::new()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Daily self-report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckInRecord {
    pub id: Uuid,
    pub session_id: SessionId,
    #[serde(default)]
    pub sleep_quality: Option<i32>,
    #[serde(default)]
    pub mood_score: Option<i32>,
    #[serde(default)]
    pub energy_level: Option<i32>,
    #[serde(default)]
    pub stress_level: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub skipped: bool,
    pub created_at: DateTime<Utc>,
}

/// Immutable ledger row. Raw input text never appears here, only its hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    pub id: Uuid,
    pub session_id: SessionId,
    pub actor: AuditActor,
    pub action: String,
    pub input_hash: Option<String>,
    pub result: AuditResult,
    pub policy_refs: Vec<String>,
    pub metadata: Map<String, Value>,
    pub ts: DateTime<Utc>,
}

/// One element of the bounded per-session thought loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThoughtLoopEntry {
    pub ts: DateTime<Utc>,
    pub text: String,
    pub emotion_label: String,
}

/// Rolling window of recent turns plus collaborator-derived lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThoughtLoopRecord {
    pub session_id: SessionId,
    pub recent_entries: Vec<ThoughtLoopEntry>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub open_loops: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cluster of related memories maintained by a collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NebulaRecord {
    pub id: Uuid,
    pub session_id: SessionId,
    pub label: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub dominant_emotion: Option<String>,
    #[serde(default)]
    pub memory_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
