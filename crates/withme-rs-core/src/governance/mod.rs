//! Governance decision engine.
//!
//! [`GovernanceEngine::evaluate`] is a pure function of the input text: the
//! same text always yields the same [`GovernanceDecision`].

mod rules;

pub use rules::{
    BlockReason, CRISIS_GROUP, CompiledRule, MEDICAL_REDIRECT, RuleCategory, RuleEffect, RuleSet,
    RuleSpec, STANDARD_RULES,
};

use crate::error::KernelError;
use log::debug;
use withme_rs_protocol::{AuditResult, CrisisSeverity, GovernanceResult};

/// Tag appended when no blocking rule fired.
pub const BOUNDARY_CHECK_PASSED: &str = "boundary_check_passed";

/// Outcome of classifying one user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct GovernanceDecision {
    /// False only when a blocking rule fired.
    pub allowed: bool,
    pub block_reason: Option<BlockReason>,
    pub is_crisis: bool,
    pub crisis_severity: Option<CrisisSeverity>,
    pub is_dependency: bool,
    /// Canned reply for blocked turns.
    pub redirect: Option<String>,
    /// Policy tags in firing order.
    pub policy_refs: Vec<String>,
}

impl Default for GovernanceDecision {
    fn default() -> Self {
        Self {
            allowed: true,
            block_reason: None,
            is_crisis: false,
            crisis_severity: None,
            is_dependency: false,
            redirect: None,
            policy_refs: Vec::new(),
        }
    }
}

impl GovernanceDecision {
    pub fn governance_result(&self) -> GovernanceResult {
        if self.allowed {
            GovernanceResult::Allowed
        } else {
            GovernanceResult::Blocked
        }
    }

    /// Result recorded for the incoming message in the audit ledger.
    pub fn audit_result(&self) -> AuditResult {
        if !self.allowed {
            AuditResult::Blocked
        } else if self.is_crisis {
            AuditResult::Escalated
        } else {
            AuditResult::Allowed
        }
    }
}

/// Evaluates text against an ordered [`RuleSet`].
#[derive(Debug, Clone)]
pub struct GovernanceEngine {
    rules: RuleSet,
}

impl GovernanceEngine {
    /// Engine over the built-in rule table.
    pub fn standard() -> Result<Self, KernelError> {
        Ok(Self::new(RuleSet::standard()?))
    }

    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn evaluate(&self, text: &str) -> GovernanceDecision {
        let mut decision = GovernanceDecision::default();
        let mut fired_groups: Vec<&'static str> = Vec::new();

        for rule in self.rules.iter() {
            if rule
                .exclusive_group
                .is_some_and(|group| fired_groups.contains(&group))
            {
                continue;
            }
            if !rule.matches(text) {
                continue;
            }
            decision
                .policy_refs
                .push(rule.category.policy_ref().to_string());
            if let Some(group) = rule.exclusive_group {
                fired_groups.push(group);
            }
            match rule.effect {
                RuleEffect::Block(reason) => {
                    decision.allowed = false;
                    decision.block_reason = Some(reason);
                    decision.redirect = Some(reason.redirect().to_string());
                    debug!(
                        "governance blocked turn (reason={}, text_len={})",
                        reason.as_str(),
                        text.len()
                    );
                    return decision;
                }
                RuleEffect::Crisis(severity) => {
                    decision.is_crisis = true;
                    decision.crisis_severity = Some(severity);
                }
                RuleEffect::Dependency => decision.is_dependency = true,
            }
        }

        decision.policy_refs.push(BOUNDARY_CHECK_PASSED.to_string());
        debug!(
            "governance evaluated turn (crisis={}, dependency={}, text_len={})",
            decision.is_crisis,
            decision.is_dependency,
            text.len()
        );
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn engine() -> GovernanceEngine {
        GovernanceEngine::standard().expect("engine")
    }

    #[test]
    fn medical_request_blocks_without_other_flags() {
        let decision = engine().evaluate("What dose of my medication should I take?");
        assert_eq!(
            decision,
            GovernanceDecision {
                allowed: false,
                block_reason: Some(BlockReason::MedicalAdvice),
                is_crisis: false,
                crisis_severity: None,
                is_dependency: false,
                redirect: Some(MEDICAL_REDIRECT.to_string()),
                policy_refs: vec!["boundary_medical_advice".to_string()],
            }
        );
        assert_eq!(decision.audit_result(), AuditResult::Blocked);
    }

    #[test]
    fn medical_block_skips_crisis_and_dependency() {
        let decision = engine().evaluate("I want to die, can you diagnose me? I need you");
        assert!(!decision.allowed);
        assert!(!decision.is_crisis);
        assert!(!decision.is_dependency);
        assert_eq!(decision.policy_refs, vec!["boundary_medical_advice"]);
    }

    #[test]
    fn severe_crisis_is_flagged_and_allowed() {
        let decision = engine().evaluate("I want to kill myself");
        assert!(decision.allowed);
        assert!(decision.is_crisis);
        assert_eq!(decision.crisis_severity, Some(CrisisSeverity::Severe));
        assert_eq!(
            decision.policy_refs,
            vec!["crisis_severe", BOUNDARY_CHECK_PASSED]
        );
        assert_eq!(decision.audit_result(), AuditResult::Escalated);
    }

    #[test]
    fn severe_never_degrades_to_moderate() {
        // Matches both tiers; only the severe tag may appear.
        let decision = engine().evaluate("I feel hopeless and I think about suicide");
        assert_eq!(decision.crisis_severity, Some(CrisisSeverity::Severe));
        assert!(!decision.policy_refs.iter().any(|tag| tag == "crisis_moderate"));
    }

    #[test]
    fn moderate_only_input() {
        let decision = engine().evaluate("Honestly I'm a burden to everyone");
        assert_eq!(decision.crisis_severity, Some(CrisisSeverity::Moderate));
        assert_eq!(
            decision.policy_refs,
            vec!["crisis_moderate", BOUNDARY_CHECK_PASSED]
        );
    }

    #[test]
    fn dependency_is_independent_of_crisis() {
        let decision = engine().evaluate("You're my only friend and I want to die");
        assert!(decision.is_crisis);
        assert!(decision.is_dependency);
        assert_eq!(
            decision.policy_refs,
            vec!["crisis_severe", "dependency_detected", BOUNDARY_CHECK_PASSED]
        );
    }

    #[test]
    fn neutral_text_passes_boundary_check() {
        let decision = engine().evaluate("I had a fine day, feeling okay");
        assert_eq!(
            decision,
            GovernanceDecision {
                policy_refs: vec![BOUNDARY_CHECK_PASSED.to_string()],
                ..GovernanceDecision::default()
            }
        );
        assert_eq!(decision.governance_result(), GovernanceResult::Allowed);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let engine = engine();
        let text = "No one else understands me and I can't take this anymore";
        assert_eq!(engine.evaluate(text), engine.evaluate(text));
    }

    #[test]
    fn negated_statement_still_matches() {
        // Known limitation: no negation handling.
        let decision = engine().evaluate("I don't want to kill myself");
        assert_eq!(decision.crisis_severity, Some(CrisisSeverity::Severe));
    }
}
