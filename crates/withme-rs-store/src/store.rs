//! Store abstraction consumed by the kernel.

use crate::error::StoreError;
use crate::model::{
    AuditRecord, CheckInRecord, MemoryRecord, MessageRecord, NebulaRecord, SessionOwner,
    SessionRecord, SessionUpdate, ThoughtLoopRecord,
};
use async_trait::async_trait;
use uuid::Uuid;
use withme_rs_protocol::SessionId;

/// Read-modify-write step applied to a session's thought loop.
pub type ThoughtLoopUpdate =
    Box<dyn FnOnce(Option<ThoughtLoopRecord>) -> ThoughtLoopRecord + Send>;

#[async_trait]
/// Row-level CRUD over session-scoped data.
///
/// The audit log is append-only: no method edits or removes an audit row.
pub trait KernelStore: Send + Sync {
    /// Persist a new session record.
    async fn create_session(&self, session: &SessionRecord) -> Result<(), StoreError>;
    async fn load_session(&self, session_id: SessionId)
    -> Result<Option<SessionRecord>, StoreError>;
    /// Find the session belonging to an owner, if one exists.
    async fn find_session(&self, owner: &SessionOwner)
    -> Result<Option<SessionRecord>, StoreError>;
    /// Apply a partial update; fails with `UnknownSession` when absent.
    async fn update_session(
        &self,
        session_id: SessionId,
        update: &SessionUpdate,
    ) -> Result<SessionRecord, StoreError>;

    async fn append_message(&self, message: &MessageRecord) -> Result<(), StoreError>;
    /// All messages, oldest first.
    async fn list_messages(&self, session_id: SessionId) -> Result<Vec<MessageRecord>, StoreError>;
    /// The most recent `limit` messages, oldest first.
    async fn recent_messages(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let mut messages = self.list_messages(session_id).await?;
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.split_off(skip))
    }
    async fn count_messages(&self, session_id: SessionId) -> Result<usize, StoreError> {
        Ok(self.list_messages(session_id).await?.len())
    }

    async fn insert_memory(&self, memory: &MemoryRecord) -> Result<(), StoreError>;
    /// Live memories in insertion order.
    async fn list_memories(&self, session_id: SessionId) -> Result<Vec<MemoryRecord>, StoreError>;
    /// Remove a memory owned by the session. Returns false when it was not found.
    async fn delete_memory(&self, session_id: SessionId, memory_id: Uuid)
    -> Result<bool, StoreError>;
    async fn count_memories(&self, session_id: SessionId) -> Result<usize, StoreError> {
        Ok(self.list_memories(session_id).await?.len())
    }

    async fn insert_check_in(&self, check_in: &CheckInRecord) -> Result<(), StoreError>;
    async fn list_check_ins(&self, session_id: SessionId)
    -> Result<Vec<CheckInRecord>, StoreError>;
    async fn latest_check_in(
        &self,
        session_id: SessionId,
    ) -> Result<Option<CheckInRecord>, StoreError> {
        Ok(self
            .list_check_ins(session_id)
            .await?
            .into_iter()
            .max_by_key(|check_in| check_in.created_at))
    }

    /// Durably append one audit row before returning.
    async fn append_audit(&self, entry: &AuditRecord) -> Result<(), StoreError>;
    /// Audit rows in append order.
    async fn list_audit(&self, session_id: SessionId) -> Result<Vec<AuditRecord>, StoreError>;

    async fn load_thought_loop(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ThoughtLoopRecord>, StoreError>;
    /// Atomically replace the thought loop with `update(current)`.
    async fn update_thought_loop(
        &self,
        session_id: SessionId,
        update: ThoughtLoopUpdate,
    ) -> Result<ThoughtLoopRecord, StoreError>;

    /// Insert or replace a nebula by id.
    async fn upsert_nebula(&self, nebula: &NebulaRecord) -> Result<(), StoreError>;
    async fn list_nebulae(&self, session_id: SessionId) -> Result<Vec<NebulaRecord>, StoreError>;
}
