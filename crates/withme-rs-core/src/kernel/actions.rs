//! Non-chat actions: check-ins, memory control, nebulae, status, export and
//! session management.

use super::Kernel;
use super::response::{
    CheckinResponse, ExportBundle, MemoryDeleteResponse, MemoryListResponse, NebulaResponse,
    StatusResponse,
};
use crate::audit::AuditEntry;
use crate::checkin::reply_for;
use crate::crisis::resources_for_region;
use crate::error::KernelError;
use chrono::Utc;
use log::{debug, info};
use uuid::Uuid;
use withme_rs_protocol::{AuditActor, AuditResult, CheckinPayload, CrisisResources, SessionId};
use withme_rs_store::{CheckInRecord, SessionOwner, SessionRecord, SessionUpdate};

impl Kernel {
    /// Store a daily check-in and pick a canned reply.
    pub async fn checkin(
        &self,
        session_id: SessionId,
        payload: CheckinPayload,
    ) -> Result<CheckinResponse, KernelError> {
        let record = CheckInRecord {
            id: Uuid::new_v4(),
            session_id,
            sleep_quality: payload.sleep,
            mood_score: payload.mood,
            energy_level: payload.energy,
            stress_level: payload.stress,
            notes: payload.notes.clone(),
            skipped: payload.skipped,
            created_at: Utc::now(),
        };
        self.inner.store.insert_check_in(&record).await?;
        self.inner
            .ledger
            .append(
                AuditEntry::new(session_id, AuditActor::User, "daily_checkin", AuditResult::Allowed)
                    .policy_refs(["checkin_stored"])
                    .meta("skipped", payload.skipped),
            )
            .await;
        debug!(
            "check-in stored (session_id={}, check_in_id={}, skipped={})",
            session_id, record.id, record.skipped
        );
        Ok(CheckinResponse {
            stored: true,
            event_id: record.id,
            reply: reply_for(&payload).to_string(),
        })
    }

    pub async fn list_memories(
        &self,
        session_id: SessionId,
    ) -> Result<MemoryListResponse, KernelError> {
        let mut memories = self.inner.store.list_memories(session_id).await?;
        memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(MemoryListResponse { memories })
    }

    /// Delete a memory owned by the session. Only successful deletions are
    /// audited.
    pub async fn delete_memory(
        &self,
        session_id: SessionId,
        memory_id: Uuid,
    ) -> Result<MemoryDeleteResponse, KernelError> {
        let deleted = self.inner.store.delete_memory(session_id, memory_id).await?;
        if deleted {
            self.inner
                .ledger
                .append(
                    AuditEntry::new(
                        session_id,
                        AuditActor::User,
                        "memory_deleted",
                        AuditResult::Allowed,
                    )
                    .policy_refs(["user_data_control"])
                    .meta("memoryId", memory_id.to_string()),
                )
                .await;
        }
        info!(
            "memory delete handled (session_id={}, memory_id={}, deleted={})",
            session_id, memory_id, deleted
        );
        Ok(MemoryDeleteResponse { deleted })
    }

    pub async fn nebulae(&self, session_id: SessionId) -> Result<NebulaResponse, KernelError> {
        let mut nebulae = self.inner.store.list_nebulae(session_id).await?;
        nebulae.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(NebulaResponse { nebulae })
    }

    pub async fn status(&self, session_id: SessionId) -> Result<StatusResponse, KernelError> {
        let store = &self.inner.store;
        let memory_count = store.count_memories(session_id).await?;
        let message_count = store.count_messages(session_id).await?;
        let last_checkin = store
            .latest_check_in(session_id)
            .await?
            .map(|check_in| check_in.created_at);
        Ok(StatusResponse {
            healthy: true,
            model: self.inner.replies.model().to_string(),
            memory_count,
            message_count,
            last_checkin,
            governance_active: true,
        })
    }

    /// Collect everything stored for the session, then audit the export.
    pub async fn export(&self, session_id: SessionId) -> Result<ExportBundle, KernelError> {
        let store = &self.inner.store;
        let session = store.load_session(session_id).await?;
        let mut messages = store.list_messages(session_id).await?;
        messages.sort_by_key(|message| message.created_at);
        let mut memories = store.list_memories(session_id).await?;
        memories.sort_by_key(|memory| memory.created_at);
        let mut check_ins = store.list_check_ins(session_id).await?;
        check_ins.sort_by_key(|check_in| check_in.created_at);
        let mut audit_log = store.list_audit(session_id).await?;
        audit_log.sort_by_key(|entry| entry.ts);

        self.inner
            .ledger
            .append(
                AuditEntry::new(session_id, AuditActor::User, "data_export", AuditResult::Allowed)
                    .policy_refs(["user_data_sovereignty"]),
            )
            .await;
        info!(
            "session exported (session_id={}, messages={}, memories={}, check_ins={}, audit={})",
            session_id,
            messages.len(),
            memories.len(),
            check_ins.len(),
            audit_log.len()
        );
        Ok(ExportBundle {
            exported_at: Utc::now(),
            session,
            messages,
            memories,
            check_ins,
            audit_log,
        })
    }

    /// Find the owner's session or create one with companion defaults.
    pub async fn open_session(&self, owner: SessionOwner) -> Result<SessionRecord, KernelError> {
        if let Some(session) = self.inner.store.find_session(&owner).await? {
            debug!("reusing session (session_id={})", session.id);
            return Ok(session);
        }
        let companion = &self.inner.config.companion;
        let session = SessionRecord::new(owner, &companion.default_region, &companion.default_name);
        self.inner.store.create_session(&session).await?;
        info!("session created (session_id={})", session.id);
        Ok(session)
    }

    pub async fn update_session(
        &self,
        session_id: SessionId,
        update: &SessionUpdate,
    ) -> Result<SessionRecord, KernelError> {
        Ok(self.inner.store.update_session(session_id, update).await?)
    }

    /// Crisis resources for the session's region, or the configured default.
    pub async fn crisis_resources(
        &self,
        session_id: SessionId,
    ) -> Result<CrisisResources, KernelError> {
        let region = match self.inner.store.load_session(session_id).await? {
            Some(session) => session.region,
            None => self.inner.config.companion.default_region.clone(),
        };
        Ok(resources_for_region(&region))
    }
}
