//! Append-only audit ledger writer.

use chrono::Utc;
use log::{debug, error};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;
use withme_rs_protocol::{AuditActor, AuditResult, SessionId};
use withme_rs_store::{AuditRecord, KernelStore, StoreError};

/// Content address for text that must not be stored raw: `sha256:` + hex.
pub fn hash_input(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("sha256:{}", hex::encode(digest))
}

/// Builder for one ledger row.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    session_id: SessionId,
    actor: AuditActor,
    action: &'static str,
    input_hash: Option<String>,
    result: AuditResult,
    policy_refs: Vec<String>,
    metadata: Map<String, Value>,
}

impl AuditEntry {
    pub fn new(
        session_id: SessionId,
        actor: AuditActor,
        action: &'static str,
        result: AuditResult,
    ) -> Self {
        Self {
            session_id,
            actor,
            action,
            input_hash: None,
            result,
            policy_refs: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn input_hash(mut self, hash: impl Into<String>) -> Self {
        self.input_hash = Some(hash.into());
        self
    }

    pub fn policy_refs<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy_refs = refs.into_iter().map(Into::into).collect();
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn action(&self) -> &'static str {
        self.action
    }

    pub fn into_record(self) -> AuditRecord {
        AuditRecord {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            actor: self.actor,
            action: self.action.to_string(),
            input_hash: self.input_hash,
            result: self.result,
            policy_refs: self.policy_refs,
            metadata: self.metadata,
            ts: Utc::now(),
        }
    }
}

/// Writes audit rows through the store.
#[derive(Clone)]
pub struct AuditLedger {
    store: Arc<dyn KernelStore>,
}

impl AuditLedger {
    pub fn new(store: Arc<dyn KernelStore>) -> Self {
        Self { store }
    }

    /// Durably append one row, surfacing store failures.
    pub async fn try_append(&self, entry: AuditEntry) -> Result<AuditRecord, StoreError> {
        let record = entry.into_record();
        self.store.append_audit(&record).await?;
        debug!(
            "audit appended (session_id={}, action={}, result={})",
            record.session_id, record.action, record.result
        );
        Ok(record)
    }

    /// Append a row; failures are logged and the caller carries on.
    pub async fn append(&self, entry: AuditEntry) {
        let session_id = entry.session_id;
        let action = entry.action;
        if let Err(err) = self.try_append(entry).await {
            error!(
                "failed to append audit entry (session_id={}, action={}): {}",
                session_id, action, err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn hash_has_algorithm_prefix_and_lowercase_hex() {
        let hash = hash_input("hello");
        assert_eq!(
            hash,
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(hash_input(""), hash_input(""));
        assert_ne!(hash_input("a"), hash_input("b"));
    }

    #[test]
    fn entry_builds_record() {
        let session_id = Uuid::new_v4();
        let record = AuditEntry::new(
            session_id,
            AuditActor::User,
            "memory_deleted",
            AuditResult::Allowed,
        )
        .policy_refs(["user_data_control"])
        .meta("memoryId", "abc")
        .into_record();
        assert_eq!(record.session_id, session_id);
        assert_eq!(record.action, "memory_deleted");
        assert_eq!(record.input_hash, None);
        assert_eq!(record.policy_refs, vec!["user_data_control"]);
        assert_eq!(Value::Object(record.metadata), json!({ "memoryId": "abc" }));
    }
}
