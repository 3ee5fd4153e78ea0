use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;
use withme_rs_protocol::SessionId;
use withme_rs_store::{
    AuditRecord, CheckInRecord, KernelStore, MemoryRecord, MessageRecord, NebulaRecord,
    SessionOwner, SessionRecord, SessionUpdate, StoreError, ThoughtLoopRecord, ThoughtLoopUpdate,
};

/// Wraps a store and fails audit appends. Message and thought-loop writes
/// can be made to fail too.
#[derive(Clone)]
pub struct FailingAuditStore {
    inner: Arc<dyn KernelStore>,
    fail_messages: bool,
    fail_thought_loop: bool,
}

impl FailingAuditStore {
    pub fn new(inner: Arc<dyn KernelStore>) -> Self {
        Self {
            inner,
            fail_messages: false,
            fail_thought_loop: false,
        }
    }

    pub fn failing_messages(mut self) -> Self {
        self.fail_messages = true;
        self
    }

    pub fn failing_thought_loop(mut self) -> Self {
        self.fail_thought_loop = true;
        self
    }
}

fn unavailable(what: &str) -> StoreError {
    StoreError::Unavailable(format!("{what} writes disabled"))
}

#[async_trait]
impl KernelStore for FailingAuditStore {
    async fn create_session(&self, session: &SessionRecord) -> Result<(), StoreError> {
        self.inner.create_session(session).await
    }

    async fn load_session(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, StoreError> {
        self.inner.load_session(session_id).await
    }

    async fn find_session(
        &self,
        owner: &SessionOwner,
    ) -> Result<Option<SessionRecord>, StoreError> {
        self.inner.find_session(owner).await
    }

    async fn update_session(
        &self,
        session_id: SessionId,
        update: &SessionUpdate,
    ) -> Result<SessionRecord, StoreError> {
        self.inner.update_session(session_id, update).await
    }

    async fn append_message(&self, message: &MessageRecord) -> Result<(), StoreError> {
        if self.fail_messages {
            return Err(unavailable("message"));
        }
        self.inner.append_message(message).await
    }

    async fn list_messages(&self, session_id: SessionId) -> Result<Vec<MessageRecord>, StoreError> {
        self.inner.list_messages(session_id).await
    }

    async fn insert_memory(&self, memory: &MemoryRecord) -> Result<(), StoreError> {
        self.inner.insert_memory(memory).await
    }

    async fn list_memories(&self, session_id: SessionId) -> Result<Vec<MemoryRecord>, StoreError> {
        self.inner.list_memories(session_id).await
    }

    async fn delete_memory(
        &self,
        session_id: SessionId,
        memory_id: Uuid,
    ) -> Result<bool, StoreError> {
        self.inner.delete_memory(session_id, memory_id).await
    }

    async fn insert_check_in(&self, check_in: &CheckInRecord) -> Result<(), StoreError> {
        self.inner.insert_check_in(check_in).await
    }

    async fn list_check_ins(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<CheckInRecord>, StoreError> {
        self.inner.list_check_ins(session_id).await
    }

    async fn append_audit(&self, _entry: &AuditRecord) -> Result<(), StoreError> {
        Err(unavailable("audit"))
    }

    async fn list_audit(&self, session_id: SessionId) -> Result<Vec<AuditRecord>, StoreError> {
        self.inner.list_audit(session_id).await
    }

    async fn load_thought_loop(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ThoughtLoopRecord>, StoreError> {
        self.inner.load_thought_loop(session_id).await
    }

    async fn update_thought_loop(
        &self,
        session_id: SessionId,
        update: ThoughtLoopUpdate,
    ) -> Result<ThoughtLoopRecord, StoreError> {
        if self.fail_thought_loop {
            return Err(unavailable("thought loop"));
        }
        self.inner.update_thought_loop(session_id, update).await
    }

    async fn upsert_nebula(&self, nebula: &NebulaRecord) -> Result<(), StoreError> {
        self.inner.upsert_nebula(nebula).await
    }

    async fn list_nebulae(&self, session_id: SessionId) -> Result<Vec<NebulaRecord>, StoreError> {
        self.inner.list_nebulae(session_id).await
    }
}
