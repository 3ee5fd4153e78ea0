//! Typed stages of a chat turn.
//!
//! Each stage consumes the previous one, so a reply cannot be generated before
//! the turn was classified, scored, audited and folded into the thought loop.

use super::response::ChatResponse;
use crate::audit::{AuditEntry, AuditLedger, hash_input};
use crate::emotion::EmotionInferencer;
use crate::error::KernelError;
use crate::governance::{BlockReason, GovernanceDecision, GovernanceEngine};
use crate::thought_loop::ThoughtLoopAggregator;
use log::warn;
use withme_rs_protocol::{
    AuditActor, AuditResult, CrisisResources, EmotionEstimate, EventPayload, GovernanceResult,
    SessionId, TurnId,
};

pub const MISSING_TEXT: &str = "Missing text in payload";

const CHAT_MESSAGE: &str = "chat_message";
const GOVERNANCE_REDIRECT: &str = "governance_redirect";
const CHAT_RESPONSE: &str = "chat_response";
const RESPONSE_GENERATED: &str = "response_generated";

/// Identity and input shared by every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnInput {
    pub session_id: SessionId,
    pub turn_id: TurnId,
    pub text: String,
}

/// A validated user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedTurn {
    input: TurnInput,
}

impl ReceivedTurn {
    pub fn new(
        session_id: SessionId,
        turn_id: TurnId,
        text: impl Into<String>,
    ) -> Result<Self, KernelError> {
        let text = text.into();
        if text.is_empty() {
            return Err(KernelError::Validation(MISSING_TEXT.to_string()));
        }
        Ok(Self {
            input: TurnInput {
                session_id,
                turn_id,
                text,
            },
        })
    }

    pub fn input(&self) -> &TurnInput {
        &self.input
    }

    pub fn classify(self, engine: &GovernanceEngine) -> ClassifiedTurn {
        let decision = engine.evaluate(&self.input.text);
        let input_hash = hash_input(&self.input.text);
        ClassifiedTurn {
            input: self.input,
            decision,
            input_hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedTurn {
    input: TurnInput,
    decision: GovernanceDecision,
    input_hash: String,
}

impl ClassifiedTurn {
    pub fn decision(&self) -> &GovernanceDecision {
        &self.decision
    }

    /// Emotion is scored for blocked turns too.
    pub fn score(self, inferencer: &EmotionInferencer) -> ScoredTurn {
        let emotion = inferencer.infer(&self.input.text);
        ScoredTurn {
            input: self.input,
            decision: self.decision,
            input_hash: self.input_hash,
            emotion,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTurn {
    input: TurnInput,
    decision: GovernanceDecision,
    input_hash: String,
    emotion: EmotionEstimate,
}

impl ScoredTurn {
    pub fn emotion(&self) -> &EmotionEstimate {
        &self.emotion
    }

    /// Audit the incoming message. A failed write is logged, not fatal.
    pub async fn record(self, ledger: &AuditLedger) -> AuditedTurn {
        let severity = self
            .decision
            .crisis_severity
            .map(|severity| severity.as_str());
        let entry = AuditEntry::new(
            self.input.session_id,
            AuditActor::User,
            CHAT_MESSAGE,
            self.decision.audit_result(),
        )
        .input_hash(self.input_hash)
        .policy_refs(self.decision.policy_refs.iter().cloned())
        .meta("emotionDetected", self.emotion.label.clone())
        .meta("crisisMode", self.decision.is_crisis)
        .meta("crisisSeverity", severity);
        ledger.append(entry).await;
        AuditedTurn {
            input: self.input,
            decision: self.decision,
            emotion: self.emotion,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditedTurn {
    input: TurnInput,
    decision: GovernanceDecision,
    emotion: EmotionEstimate,
}

impl AuditedTurn {
    /// Fold the turn into the session's thought loop. A failed update is
    /// logged and the turn carries on.
    pub async fn loop_updated(self, aggregator: &ThoughtLoopAggregator) -> LoopedTurn {
        if let Err(err) = aggregator
            .update(self.input.session_id, &self.input.text, &self.emotion.label)
            .await
        {
            warn!(
                "failed to update thought loop (session_id={}): {}",
                self.input.session_id, err
            );
        }
        LoopedTurn {
            input: self.input,
            decision: self.decision,
            emotion: self.emotion,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopedTurn {
    input: TurnInput,
    decision: GovernanceDecision,
    emotion: EmotionEstimate,
}

/// Which way a turn goes after the thought loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Blocked(BlockedTurn),
    Allowed(AllowedTurn),
}

impl LoopedTurn {
    pub fn input(&self) -> &TurnInput {
        &self.input
    }

    pub fn governance_event(&self) -> EventPayload {
        EventPayload::GovernanceEvaluated {
            turn_id: self.input.turn_id,
            governance_result: self.decision.governance_result(),
            crisis_mode: self.decision.is_crisis,
            crisis_severity: self.decision.crisis_severity,
            is_dependency: self.decision.is_dependency,
            emotion: self.emotion.clone(),
            policy_refs: self.decision.policy_refs.clone(),
        }
    }

    pub fn route(self) -> Route {
        match (self.decision.allowed, self.decision.block_reason) {
            (false, Some(reason)) => {
                let redirect = self
                    .decision
                    .redirect
                    .clone()
                    .unwrap_or_else(|| reason.redirect().to_string());
                Route::Blocked(BlockedTurn {
                    input: self.input,
                    decision: self.decision,
                    emotion: self.emotion,
                    reason,
                    redirect,
                })
            }
            _ => Route::Allowed(AllowedTurn {
                input: self.input,
                decision: self.decision,
                emotion: self.emotion,
            }),
        }
    }
}

/// A turn stopped by a boundary rule. No model call happens.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedTurn {
    input: TurnInput,
    decision: GovernanceDecision,
    emotion: EmotionEstimate,
    reason: BlockReason,
    redirect: String,
}

impl BlockedTurn {
    pub fn input(&self) -> &TurnInput {
        &self.input
    }

    pub fn reply(&self) -> &str {
        &self.redirect
    }

    pub async fn redirect(self, ledger: &AuditLedger) -> ChatResponse {
        let entry = AuditEntry::new(
            self.input.session_id,
            AuditActor::Aga,
            GOVERNANCE_REDIRECT,
            AuditResult::Blocked,
        )
        .policy_refs(self.decision.policy_refs.iter().cloned())
        .meta("reason", self.reason.as_str());
        ledger.append(entry).await;
        ChatResponse {
            reply: self.redirect,
            emotion: self.emotion,
            crisis_mode: false,
            crisis_severity: None,
            is_dependency: false,
            governance_result: GovernanceResult::Blocked,
            policy_refs: self.decision.policy_refs,
            crisis_resources: None,
        }
    }
}

/// A turn cleared for reply generation.
#[derive(Debug, Clone, PartialEq)]
pub struct AllowedTurn {
    input: TurnInput,
    decision: GovernanceDecision,
    emotion: EmotionEstimate,
}

impl AllowedTurn {
    pub fn input(&self) -> &TurnInput {
        &self.input
    }

    pub fn decision(&self) -> &GovernanceDecision {
        &self.decision
    }

    /// Audit the generated reply and build the response.
    pub async fn complete(
        self,
        reply: String,
        ledger: &AuditLedger,
        crisis_resources: Option<CrisisResources>,
    ) -> ChatResponse {
        let result = if self.decision.is_crisis {
            AuditResult::Escalated
        } else {
            AuditResult::Allowed
        };
        let entry = AuditEntry::new(
            self.input.session_id,
            AuditActor::Aga,
            CHAT_RESPONSE,
            result,
        )
        .input_hash(hash_input(&reply))
        .policy_refs([RESPONSE_GENERATED])
        .meta("crisisMode", self.decision.is_crisis);
        ledger.append(entry).await;
        ChatResponse {
            reply,
            emotion: self.emotion,
            crisis_mode: self.decision.is_crisis,
            crisis_severity: self.decision.crisis_severity,
            is_dependency: self.decision.is_dependency,
            governance_result: GovernanceResult::Allowed,
            policy_refs: self.decision.policy_refs,
            crisis_resources: if self.decision.is_crisis {
                crisis_resources
            } else {
                None
            },
        }
    }
}
