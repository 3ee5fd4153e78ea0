//! Shared enums and value types produced by governance and emotion scoring.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate emotion estimate for one piece of text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmotionEstimate {
    /// Valence in `[-1, 1]`.
    pub valence: f64,
    /// Arousal in `[0, 1]`.
    pub arousal: f64,
    /// Keyword-derived label, or `neutral`.
    pub label: String,
}

impl EmotionEstimate {
    /// Estimate used when no lexicon keyword matched.
    pub fn neutral() -> Self {
        Self {
            valence: 0.0,
            arousal: 0.3,
            label: "neutral".to_string(),
        }
    }
}

/// Crisis tier for a classified input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CrisisSeverity {
    /// Explicit self-harm or suicide intent.
    Severe,
    /// Hopelessness or burden ideation.
    Moderate,
}

impl CrisisSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrisisSeverity::Severe => "severe",
            CrisisSeverity::Moderate => "moderate",
        }
    }
}

/// Outcome reported to the caller for a chat turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GovernanceResult {
    Allowed,
    Blocked,
}

/// Who produced an audited event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditActor {
    /// The person using the companion.
    User,
    /// The governance kernel itself.
    Aga,
    /// Background or operator processes.
    System,
}

impl AuditActor {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditActor::User => "user",
            AuditActor::Aga => "aga",
            AuditActor::System => "system",
        }
    }
}

/// Recorded outcome of an audited event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditResult {
    Allowed,
    Blocked,
    Escalated,
}

impl AuditResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditResult::Allowed => "allowed",
            AuditResult::Blocked => "blocked",
            AuditResult::Escalated => "escalated",
        }
    }
}

impl fmt::Display for AuditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speaker role for a conversation turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction.
    System,
    /// User-authored message.
    User,
    /// Companion-authored message.
    Assistant,
}

impl Role {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}
