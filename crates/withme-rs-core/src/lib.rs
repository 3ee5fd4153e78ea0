//! Governance kernel for the companion chat backend.
//!
//! Every user turn runs through a fixed pipeline: pattern classification and
//! the governance decision, emotion scoring, an audit entry, the thought-loop
//! update, and (unless blocked) reply generation followed by a second audit
//! entry. The [`Kernel`] also routes check-ins, memory control, nebulae,
//! status and export requests.

pub mod audit;
pub mod checkin;
pub mod crisis;
pub mod emotion;
pub mod error;
pub mod governance;
pub mod kernel;
pub mod naming;
pub mod prompt;
pub mod provider;
pub mod reply;
pub mod thought_loop;

pub use audit::{AuditEntry, AuditLedger, hash_input};
pub use emotion::EmotionInferencer;
pub use error::{KernelError, ProviderError, ProviderFailure};
pub use governance::{BlockReason, GovernanceDecision, GovernanceEngine};
pub use kernel::{
    ChatResponse, ChatStream, CheckinResponse, ExportBundle, Kernel, KernelBuilder,
    KernelResponse, MemoryDeleteResponse, MemoryListResponse, NebulaResponse, StatusResponse,
};
pub use naming::{NameSuggestion, suggest_companion_name};
pub use provider::{
    ChatMessage, CompletionRequest, OpenAiCompatibleProvider, ReplyProvider, TextStream,
    collect_text,
};
pub use reply::{ReplyGenerator, ReplyRequest};
pub use thought_loop::ThoughtLoopAggregator;
