//! Durable row-level storage for kernel sessions.
//!
//! The kernel only talks to [`KernelStore`]; [`JsonlKernelStore`] is the
//! default append-only implementation with one rollout file per session.

pub mod error;
mod jsonl;
pub mod model;
mod store;

/// Store error type.
pub use error::StoreError;
/// Default JSONL-backed store.
pub use jsonl::JsonlKernelStore;
/// Persisted record models.
pub use model::{
    AuditRecord, CheckInRecord, CompanionTraits, Formality, MemoryRecord, MessageRecord,
    NebulaRecord, SessionOwner, SessionRecord, SessionUpdate, ThoughtLoopEntry,
    ThoughtLoopRecord, Verbosity, Warmth,
};
/// Store interface used by the kernel.
pub use store::{KernelStore, ThoughtLoopUpdate};
