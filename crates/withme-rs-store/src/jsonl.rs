//! Session persistence using one append-only JSONL rollout per session.

use crate::error::StoreError;
use crate::model::{
    AuditRecord, CheckInRecord, MemoryRecord, MessageRecord, NebulaRecord, SessionOwner,
    SessionRecord, SessionUpdate, ThoughtLoopRecord,
};
use crate::store::{KernelStore, ThoughtLoopUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;
use withme_rs_protocol::SessionId;

const SCHEMA_VERSION: u32 = 1;

/// Internal JSONL event representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RolloutEvent {
    SchemaVersion {
        version: u32,
    },
    /// Full session snapshot; the latest one wins.
    Session {
        session: SessionRecord,
    },
    Message {
        message: MessageRecord,
    },
    MemoryInserted {
        memory: MemoryRecord,
    },
    /// Tombstone so earlier lines are never rewritten.
    MemoryDeleted {
        memory_id: Uuid,
        deleted_at: DateTime<Utc>,
    },
    CheckIn {
        check_in: CheckInRecord,
    },
    Audit {
        entry: AuditRecord,
    },
    /// Nebula snapshot, replacing any earlier one with the same id.
    Nebula {
        nebula: NebulaRecord,
    },
}

/// State rebuilt by replaying a rollout.
#[derive(Default)]
struct RolloutState {
    version: Option<u32>,
    session: Option<SessionRecord>,
    messages: Vec<MessageRecord>,
    memories: Vec<MemoryRecord>,
    check_ins: Vec<CheckInRecord>,
    audit: Vec<AuditRecord>,
    nebulae: Vec<NebulaRecord>,
}

impl RolloutState {
    fn apply(&mut self, event: RolloutEvent) -> Result<(), StoreError> {
        match event {
            RolloutEvent::SchemaVersion { version } => {
                if version > SCHEMA_VERSION {
                    return Err(StoreError::UnsupportedSchema(version));
                }
                self.version = Some(version);
            }
            RolloutEvent::Session { session } => self.session = Some(session),
            RolloutEvent::Message { message } => self.messages.push(message),
            RolloutEvent::MemoryInserted { memory } => self.memories.push(memory),
            RolloutEvent::MemoryDeleted { memory_id, .. } => {
                self.memories.retain(|memory| memory.id != memory_id);
            }
            RolloutEvent::CheckIn { check_in } => self.check_ins.push(check_in),
            RolloutEvent::Audit { entry } => self.audit.push(entry),
            RolloutEvent::Nebula { nebula } => {
                match self.nebulae.iter_mut().find(|existing| existing.id == nebula.id) {
                    Some(existing) => *existing = nebula,
                    None => self.nebulae.push(nebula),
                }
            }
        }
        Ok(())
    }
}

/// JSONL-backed kernel store.
///
/// Messages, audit rows and the other session events append to
/// `{session_id}.jsonl`. The thought loop is a bounded snapshot kept in
/// `{session_id}.thought_loop.json` and replaced on every update.
#[derive(Clone)]
pub struct JsonlKernelStore {
    files: Arc<RolloutFiles>,
}

/// File layout plus one lock per session.
struct RolloutFiles {
    root: PathBuf,
    locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl JsonlKernelStore {
    /// Create a new JSONL store under the given root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized JSONL kernel store (root={})", root.display());
        Ok(Self {
            files: Arc::new(RolloutFiles {
                root,
                locks: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Root directory holding the rollouts.
    pub fn root(&self) -> &Path {
        &self.files.root
    }

    /// Run file work on the blocking pool.
    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&RolloutFiles) -> Result<T, StoreError> + Send + 'static,
    {
        let files = self.files.clone();
        tokio::task::spawn_blocking(move || op(&files))
            .await
            .map_err(|err| StoreError::Unavailable(format!("store task failed: {err}")))?
    }
}

impl RolloutFiles {
    fn rollout_path(&self, session_id: SessionId) -> PathBuf {
        self.root.join(format!("{session_id}.jsonl"))
    }

    fn thought_loop_path(&self, session_id: SessionId) -> PathBuf {
        self.root.join(format!("{session_id}.thought_loop.json"))
    }

    fn session_lock(&self, session_id: SessionId) -> Arc<Mutex<()>> {
        self.locks.lock().entry(session_id).or_default().clone()
    }

    /// Append events, writing the schema header when the rollout is new.
    ///
    /// Caller must hold the session lock.
    fn write_events_locked(
        &self,
        session_id: SessionId,
        events: &[RolloutEvent],
    ) -> Result<(), StoreError> {
        let path = self.rollout_path(session_id);
        let is_new = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut buffer = String::new();
        if is_new {
            debug!("creating session rollout (session_id={})", session_id);
            let header = RolloutEvent::SchemaVersion {
                version: SCHEMA_VERSION,
            };
            buffer.push_str(&serde_json::to_string(&header)?);
            buffer.push('\n');
        }
        for event in events {
            buffer.push_str(&serde_json::to_string(event)?);
            buffer.push('\n');
        }
        file.write_all(buffer.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    fn write_event(&self, session_id: SessionId, event: RolloutEvent) -> Result<(), StoreError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock();
        self.write_events_locked(session_id, &[event])
    }

    /// Replay a rollout. Caller must hold the session lock.
    fn read_rollout_locked(&self, session_id: SessionId) -> Result<RolloutState, StoreError> {
        let path = self.rollout_path(session_id);
        let mut state = RolloutState::default();
        if !path.exists() {
            return Ok(state);
        }
        let reader = BufReader::new(OpenOptions::new().read(true).open(&path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: RolloutEvent = serde_json::from_str(&line)?;
            state.apply(event)?;
        }
        Ok(state)
    }

    fn read_rollout(&self, session_id: SessionId) -> Result<RolloutState, StoreError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock();
        self.read_rollout_locked(session_id)
    }

    fn create_session(&self, session: &SessionRecord) -> Result<(), StoreError> {
        let lock = self.session_lock(session.id);
        let _guard = lock.lock();
        if self.read_rollout_locked(session.id)?.session.is_some() {
            return Err(StoreError::SessionExists(session.id));
        }
        info!("recording session creation (session_id={})", session.id);
        self.write_events_locked(
            session.id,
            &[RolloutEvent::Session {
                session: session.clone(),
            }],
        )
    }

    fn find_session(&self, owner: &SessionOwner) -> Result<Option<SessionRecord>, StoreError> {
        let mut found: Option<SessionRecord> = None;
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(session_id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| Uuid::parse_str(stem).ok())
            else {
                continue;
            };
            let Some(session) = self.read_rollout(session_id)?.session else {
                continue;
            };
            if !session.is_owned_by(owner) {
                continue;
            }
            let earlier = found
                .as_ref()
                .is_none_or(|current| session.created_at < current.created_at);
            if earlier {
                found = Some(session);
            }
        }
        Ok(found)
    }

    fn update_session(
        &self,
        session_id: SessionId,
        update: &SessionUpdate,
    ) -> Result<SessionRecord, StoreError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock();
        let mut session = self
            .read_rollout_locked(session_id)?
            .session
            .ok_or(StoreError::UnknownSession(session_id))?;
        update.apply(&mut session);
        self.write_events_locked(
            session_id,
            &[RolloutEvent::Session {
                session: session.clone(),
            }],
        )?;
        Ok(session)
    }

    fn delete_memory(&self, session_id: SessionId, memory_id: Uuid) -> Result<bool, StoreError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock();
        let state = self.read_rollout_locked(session_id)?;
        if !state.memories.iter().any(|memory| memory.id == memory_id) {
            debug!(
                "memory not found for delete (session_id={}, memory_id={})",
                session_id, memory_id
            );
            return Ok(false);
        }
        info!(
            "recording memory tombstone (session_id={}, memory_id={})",
            session_id, memory_id
        );
        self.write_events_locked(
            session_id,
            &[RolloutEvent::MemoryDeleted {
                memory_id,
                deleted_at: Utc::now(),
            }],
        )?;
        Ok(true)
    }

    /// Caller must hold the session lock.
    fn read_thought_loop_locked(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ThoughtLoopRecord>, StoreError> {
        let path = self.thought_loop_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn load_thought_loop(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ThoughtLoopRecord>, StoreError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock();
        self.read_thought_loop_locked(session_id)
    }

    /// Replace the snapshot through a temp file and rename.
    fn update_thought_loop(
        &self,
        session_id: SessionId,
        update: ThoughtLoopUpdate,
    ) -> Result<ThoughtLoopRecord, StoreError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock();
        let record = update(self.read_thought_loop_locked(session_id)?);
        let path = self.thought_loop_path(session_id);
        let staging = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&staging)?;
            file.write_all(serde_json::to_string(&record)?.as_bytes())?;
            file.sync_data()?;
        }
        fs::rename(&staging, &path)?;
        debug!(
            "thought loop snapshot replaced (session_id={}, entries={})",
            session_id,
            record.recent_entries.len()
        );
        Ok(record)
    }
}

#[async_trait]
impl KernelStore for JsonlKernelStore {
    async fn create_session(&self, session: &SessionRecord) -> Result<(), StoreError> {
        let session = session.clone();
        self.run(move |files| files.create_session(&session)).await
    }

    async fn load_session(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, StoreError> {
        self.run(move |files| Ok(files.read_rollout(session_id)?.session)).await
    }

    async fn find_session(
        &self,
        owner: &SessionOwner,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let owner = owner.clone();
        self.run(move |files| files.find_session(&owner)).await
    }

    async fn update_session(
        &self,
        session_id: SessionId,
        update: &SessionUpdate,
    ) -> Result<SessionRecord, StoreError> {
        let update = update.clone();
        self.run(move |files| files.update_session(session_id, &update)).await
    }

    async fn append_message(&self, message: &MessageRecord) -> Result<(), StoreError> {
        debug!(
            "appending message event (session_id={}, role={}, content_len={})",
            message.session_id,
            message.role.as_str(),
            message.content.len()
        );
        let session_id = message.session_id;
        let event = RolloutEvent::Message {
            message: message.clone(),
        };
        self.run(move |files| files.write_event(session_id, event)).await
    }

    async fn list_messages(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        self.run(move |files| Ok(files.read_rollout(session_id)?.messages)).await
    }

    async fn insert_memory(&self, memory: &MemoryRecord) -> Result<(), StoreError> {
        let session_id = memory.session_id;
        let event = RolloutEvent::MemoryInserted {
            memory: memory.clone(),
        };
        self.run(move |files| files.write_event(session_id, event)).await
    }

    async fn list_memories(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<MemoryRecord>, StoreError> {
        self.run(move |files| Ok(files.read_rollout(session_id)?.memories)).await
    }

    async fn delete_memory(
        &self,
        session_id: SessionId,
        memory_id: Uuid,
    ) -> Result<bool, StoreError> {
        self.run(move |files| files.delete_memory(session_id, memory_id)).await
    }

    async fn insert_check_in(&self, check_in: &CheckInRecord) -> Result<(), StoreError> {
        let session_id = check_in.session_id;
        let event = RolloutEvent::CheckIn {
            check_in: check_in.clone(),
        };
        self.run(move |files| files.write_event(session_id, event)).await
    }

    async fn list_check_ins(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<CheckInRecord>, StoreError> {
        self.run(move |files| Ok(files.read_rollout(session_id)?.check_ins)).await
    }

    async fn append_audit(&self, entry: &AuditRecord) -> Result<(), StoreError> {
        debug!(
            "appending audit event (session_id={}, action={}, result={})",
            entry.session_id, entry.action, entry.result
        );
        let session_id = entry.session_id;
        let event = RolloutEvent::Audit {
            entry: entry.clone(),
        };
        self.run(move |files| files.write_event(session_id, event)).await
    }

    async fn list_audit(&self, session_id: SessionId) -> Result<Vec<AuditRecord>, StoreError> {
        self.run(move |files| Ok(files.read_rollout(session_id)?.audit)).await
    }

    async fn load_thought_loop(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ThoughtLoopRecord>, StoreError> {
        self.run(move |files| files.load_thought_loop(session_id)).await
    }

    async fn update_thought_loop(
        &self,
        session_id: SessionId,
        update: ThoughtLoopUpdate,
    ) -> Result<ThoughtLoopRecord, StoreError> {
        self.run(move |files| files.update_thought_loop(session_id, update)).await
    }

    async fn upsert_nebula(&self, nebula: &NebulaRecord) -> Result<(), StoreError> {
        let session_id = nebula.session_id;
        let event = RolloutEvent::Nebula {
            nebula: nebula.clone(),
        };
        self.run(move |files| files.write_event(session_id, event)).await
    }

    async fn list_nebulae(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<NebulaRecord>, StoreError> {
        self.run(move |files| Ok(files.read_rollout(session_id)?.nebulae)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn newer_schema_version_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlKernelStore::new(temp.path()).expect("store");
        let session_id = Uuid::new_v4();
        let mut file = fs::File::create(store.files.rollout_path(session_id)).expect("create");
        writeln!(file, "{{\"type\":\"schema_version\",\"version\":9}}").expect("write");

        let err = store.files.read_rollout(session_id).err().expect("error");
        assert!(matches!(err, StoreError::UnsupportedSchema(9)));
    }

    #[test]
    fn first_write_emits_schema_header() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlKernelStore::new(temp.path()).expect("store");
        let session_id = Uuid::new_v4();
        store
            .files
            .write_event(
                session_id,
                RolloutEvent::MemoryDeleted {
                    memory_id: Uuid::new_v4(),
                    deleted_at: Utc::now(),
                },
            )
            .expect("write");

        let contents = fs::read_to_string(store.files.rollout_path(session_id)).expect("read");
        let first = contents.lines().next().expect("header");
        assert_eq!(first, "{\"type\":\"schema_version\",\"version\":1}");
        assert_eq!(contents.lines().count(), 2);
    }
}
