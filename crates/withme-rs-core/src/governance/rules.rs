//! Ordered classifier rule table.
//!
//! Each rule is a `(category, patterns, priority)` entry. Rules are evaluated
//! in ascending priority by [`super::GovernanceEngine`]; a rule in an
//! exclusive group is skipped once a higher-priority rule in that group fired.

use crate::error::KernelError;
use regex::{Regex, RegexBuilder};
use withme_rs_protocol::CrisisSeverity;

/// Exclusive group shared by the two crisis tiers.
pub const CRISIS_GROUP: &str = "crisis";

/// Rule families recognized by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleCategory {
    MedicalAdvice,
    CrisisSevere,
    CrisisModerate,
    Dependency,
}

impl RuleCategory {
    /// Policy tag recorded when a rule of this category fires.
    pub fn policy_ref(&self) -> &'static str {
        match self {
            RuleCategory::MedicalAdvice => "boundary_medical_advice",
            RuleCategory::CrisisSevere => "crisis_severe",
            RuleCategory::CrisisModerate => "crisis_moderate",
            RuleCategory::Dependency => "dependency_detected",
        }
    }
}

/// Why a turn was blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    MedicalAdvice,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::MedicalAdvice => "medical_advice_blocked",
        }
    }

    /// Canned reply returned instead of a model call.
    pub fn redirect(&self) -> &'static str {
        match self {
            BlockReason::MedicalAdvice => MEDICAL_REDIRECT,
        }
    }
}

pub const MEDICAL_REDIRECT: &str = "I hear you, and I want you to get the best guidance on this. That's something your doctor or healthcare provider can really help with — they can give you the personalized care you deserve. I'm here to walk alongside you through it.";

/// What a firing rule does to the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEffect {
    /// Stop evaluation and block the turn.
    Block(BlockReason),
    /// Flag the turn as a crisis of the given tier.
    Crisis(CrisisSeverity),
    /// Flag over-reliance on the companion.
    Dependency,
}

/// Static description of one rule family.
#[derive(Debug, Clone, Copy)]
pub struct RuleSpec {
    pub category: RuleCategory,
    pub priority: u8,
    pub exclusive_group: Option<&'static str>,
    pub effect: RuleEffect,
    pub patterns: &'static [&'static str],
}

pub const STANDARD_RULES: &[RuleSpec] = &[
    RuleSpec {
        category: RuleCategory::MedicalAdvice,
        priority: 0,
        exclusive_group: None,
        effect: RuleEffect::Block(BlockReason::MedicalAdvice),
        patterns: &[
            r"what\s+(dose|dosage|amount)(\s+of\s+(my\s+)?[a-z]+)?\s+should\s+i",
            r"should\s+i\s+(take|stop|increase|decrease|change)\s+(my\s+)?(medication|medicine|meds|pills|dose)",
            r"do\s+i\s+have\s+[a-z]+\s*(syndrome|disorder|disease|condition)?",
            r"is\s+(this|it)\s+(serious|dangerous|bad|normal)",
            r"can\s+you\s+diagnose",
            r"what('s|\s+is)\s+wrong\s+with\s+me",
            r"prescribe|prescription",
            r"how\s+much\s+[a-z]+\s+should\s+i\s+take",
        ],
    },
    RuleSpec {
        category: RuleCategory::CrisisSevere,
        priority: 1,
        exclusive_group: Some(CRISIS_GROUP),
        effect: RuleEffect::Crisis(CrisisSeverity::Severe),
        patterns: &[
            r"\b(kill|end)\s+(myself|my\s+life)\b",
            r"\bsuicid(e|al)\b",
            r"\bwant\s+to\s+die\b",
            r"\bdon'?t\s+want\s+to\s+(live|be\s+alive|exist)\b",
            r"\b(cutting|cut)\s+(myself|my\s+(wrist|arm|leg))",
            r"\bself[- ]?harm",
            r"\boverdose\b",
            r"\bhang(ing)?\s+myself\b",
            r"\bjump(ing)?\s+(off|from)\b",
        ],
    },
    RuleSpec {
        category: RuleCategory::CrisisModerate,
        priority: 2,
        exclusive_group: Some(CRISIS_GROUP),
        effect: RuleEffect::Crisis(CrisisSeverity::Moderate),
        patterns: &[
            r"\bi\s*can'?t\s+(do|take)\s+this\s+anymore\b",
            r"\bi('m|\s+am)\s+a\s+burden\b",
            r"\beveryone\s+would\s+be\s+better\s+off\s+without\s+me\b",
            r"\bno\s+(point|reason)\s+(in\s+)?(living|going\s+on)\b",
            r"\bhopeless\b",
            r"\bgive\s+up\b",
            r"\bworthless\b",
            r"\bno\s+way\s+out\b",
        ],
    },
    RuleSpec {
        category: RuleCategory::Dependency,
        priority: 3,
        exclusive_group: None,
        effect: RuleEffect::Dependency,
        patterns: &[
            r"\byou('re|r|\s+are)\s+(my\s+)?only\s+(friend|one|support)",
            r"\bi\s+(only\s+)?have\s+you\b",
            r"\bno\s+one\s+(else\s+)?(cares|understands|listens)",
            r"\bi\s+need\s+you\b",
            r"\bdon'?t\s+leave\s+me\b",
            r"\bwithout\s+you\s+i\b",
        ],
    },
];

/// A rule with its patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub category: RuleCategory,
    pub priority: u8,
    pub exclusive_group: Option<&'static str>,
    pub effect: RuleEffect,
    patterns: Vec<Regex>,
}

impl CompiledRule {
    fn compile(spec: &RuleSpec) -> Result<Self, KernelError> {
        let patterns = spec
            .patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| KernelError::Pattern(format!("{pattern}: {err}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            category: spec.category,
            priority: spec.priority,
            exclusive_group: spec.exclusive_group,
            effect: spec.effect,
            patterns,
        })
    }

    /// True on the first matching pattern; the rest are not tried.
    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(text))
    }
}

/// Rules sorted by ascending priority.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile the built-in table.
    pub fn standard() -> Result<Self, KernelError> {
        Self::compile(STANDARD_RULES)
    }

    pub fn compile(specs: &[RuleSpec]) -> Result<Self, KernelError> {
        let mut rules = specs
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        rules.sort_by_key(|rule| rule.priority);
        Ok(Self { rules })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
