use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::{Map, json};
use tempfile::tempdir;
use uuid::Uuid;
use withme_rs_protocol::{AuditActor, AuditResult, Role};
use withme_rs_store::{
    AuditRecord, CheckInRecord, JsonlKernelStore, KernelStore, MemoryRecord, MessageRecord,
    NebulaRecord, SessionOwner, SessionRecord, SessionUpdate, StoreError, ThoughtLoopEntry,
    ThoughtLoopRecord, ThoughtLoopUpdate, Warmth,
};

fn audit_row(session_id: Uuid, action: &str) -> AuditRecord {
    AuditRecord {
        id: Uuid::new_v4(),
        session_id,
        actor: AuditActor::User,
        action: action.to_string(),
        input_hash: None,
        result: AuditResult::Allowed,
        policy_refs: vec!["checkin_stored".to_string()],
        metadata: Map::new(),
        ts: Utc::now(),
    }
}

#[tokio::test]
async fn session_round_trip_and_update() {
    let temp = tempdir().expect("tempdir");
    let store = JsonlKernelStore::new(temp.path()).expect("store");
    let session =
        SessionRecord::new(SessionOwner::Anonymous("device-1".to_string()), "US", "Still");
    store.create_session(&session).await.expect("create");

    let loaded = store
        .load_session(session.id)
        .await
        .expect("load")
        .expect("session");
    assert_eq!(loaded, session);

    let err = store.create_session(&session).await.unwrap_err();
    assert!(matches!(err, StoreError::SessionExists(id) if id == session.id));

    let updated = store
        .update_session(
            session.id,
            &SessionUpdate {
                companion_name: Some("Ember".to_string()),
                onboarding_completed: Some(true),
                ..SessionUpdate::default()
            },
        )
        .await
        .expect("update");
    assert_eq!(updated.companion_name, "Ember");
    assert!(updated.onboarding_completed);
    assert_eq!(updated.companion_traits.warmth, Warmth::High);
    assert_eq!(updated.region, "US");

    let found = store
        .find_session(&SessionOwner::Anonymous("device-1".to_string()))
        .await
        .expect("find")
        .expect("session");
    assert_eq!(found.companion_name, "Ember");
    assert_eq!(
        store
            .find_session(&SessionOwner::User("someone".to_string()))
            .await
            .expect("find"),
        None
    );
}

#[tokio::test]
async fn update_of_unknown_session_fails() {
    let temp = tempdir().expect("tempdir");
    let store = JsonlKernelStore::new(temp.path()).expect("store");
    let missing = Uuid::new_v4();
    let err = store
        .update_session(missing, &SessionUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownSession(id) if id == missing));
}

#[tokio::test]
async fn recent_messages_keeps_latest_in_order() {
    let temp = tempdir().expect("tempdir");
    let store = JsonlKernelStore::new(temp.path()).expect("store");
    let session_id = Uuid::new_v4();
    for idx in 0..5 {
        let message = MessageRecord::new(session_id, Role::User, format!("turn {idx}"));
        store.append_message(&message).await.expect("append");
    }

    let recent = store.recent_messages(session_id, 3).await.expect("recent");
    let contents = recent
        .iter()
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>();
    assert_eq!(contents, vec!["turn 2", "turn 3", "turn 4"]);
    assert_eq!(store.count_messages(session_id).await.expect("count"), 5);
}

#[tokio::test]
async fn memory_delete_is_scoped_and_leaves_audit_rows() {
    let temp = tempdir().expect("tempdir");
    let store = JsonlKernelStore::new(temp.path()).expect("store");
    let session_id = Uuid::new_v4();
    let other_session = Uuid::new_v4();

    let memory = MemoryRecord::new(session_id, "preference", "Likes evening walks");
    store.insert_memory(&memory).await.expect("insert");
    store
        .append_audit(&audit_row(session_id, "daily_checkin"))
        .await
        .expect("audit");

    assert_eq!(
        store
            .delete_memory(other_session, memory.id)
            .await
            .expect("delete other"),
        false
    );
    assert_eq!(
        store.delete_memory(session_id, memory.id).await.expect("delete"),
        true
    );
    assert_eq!(
        store.delete_memory(session_id, memory.id).await.expect("again"),
        false
    );
    assert!(store.list_memories(session_id).await.expect("list").is_empty());
    assert_eq!(store.list_audit(session_id).await.expect("audit").len(), 1);
}

#[tokio::test]
async fn latest_check_in_uses_creation_time() {
    let temp = tempdir().expect("tempdir");
    let store = JsonlKernelStore::new(temp.path()).expect("store");
    let session_id = Uuid::new_v4();
    let now = Utc::now();
    for (offset, mood) in [(2, 1), (0, 5), (1, 3)] {
        let record = CheckInRecord {
            id: Uuid::new_v4(),
            session_id,
            sleep_quality: None,
            mood_score: Some(mood),
            energy_level: None,
            stress_level: None,
            notes: None,
            skipped: false,
            created_at: now - Duration::hours(offset),
        };
        store.insert_check_in(&record).await.expect("insert");
    }

    let latest = store
        .latest_check_in(session_id)
        .await
        .expect("latest")
        .expect("record");
    assert_eq!(latest.mood_score, Some(5));
}

#[tokio::test]
async fn thought_loop_update_sees_previous_snapshot() {
    let temp = tempdir().expect("tempdir");
    let store = JsonlKernelStore::new(temp.path()).expect("store");
    let session_id = Uuid::new_v4();
    for text in ["first", "second"] {
        let text = text.to_string();
        store
            .update_thought_loop(
                session_id,
                Box::new(move |current| {
                    let now = Utc::now();
                    let entry = ThoughtLoopEntry {
                        ts: now,
                        text,
                        emotion_label: "neutral".to_string(),
                    };
                    match current {
                        Some(mut record) => {
                            record.recent_entries.push(entry);
                            record.updated_at = now;
                            record
                        }
                        None => ThoughtLoopRecord {
                            session_id,
                            recent_entries: vec![entry],
                            themes: Vec::new(),
                            open_loops: Vec::new(),
                            created_at: now,
                            updated_at: now,
                        },
                    }
                }),
            )
            .await
            .expect("update");
    }

    let record = store
        .load_thought_loop(session_id)
        .await
        .expect("load")
        .expect("record");
    let texts = record
        .recent_entries
        .iter()
        .map(|entry| entry.text.as_str())
        .collect::<Vec<_>>();
    assert_eq!(texts, vec!["first", "second"]);
}

#[tokio::test]
async fn nebula_upsert_replaces_by_id() {
    let temp = tempdir().expect("tempdir");
    let store = JsonlKernelStore::new(temp.path()).expect("store");
    let session_id = Uuid::new_v4();
    let now = Utc::now();
    let mut nebula = NebulaRecord {
        id: Uuid::new_v4(),
        session_id,
        label: "Work stress".to_string(),
        summary: None,
        dominant_emotion: Some("stressed".to_string()),
        memory_ids: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    store.upsert_nebula(&nebula).await.expect("insert");
    nebula.summary = Some("Mondays are hardest".to_string());
    store.upsert_nebula(&nebula).await.expect("update");

    let nebulae = store.list_nebulae(session_id).await.expect("list");
    assert_eq!(nebulae, vec![nebula]);
}

#[tokio::test]
async fn audit_rows_keep_metadata() {
    let temp = tempdir().expect("tempdir");
    let store = JsonlKernelStore::new(temp.path()).expect("store");
    let session_id = Uuid::new_v4();
    let mut row = audit_row(session_id, "memory_deleted");
    row.metadata.insert("memoryId".to_string(), json!("abc"));
    store.append_audit(&row).await.expect("append");

    assert_eq!(store.list_audit(session_id).await.expect("list"), vec![row]);
}

/// Push `text` and keep at most `capacity` entries.
fn push_capped(session_id: Uuid, text: String, capacity: usize) -> ThoughtLoopUpdate {
    Box::new(move |current| {
        let now = Utc::now();
        let mut record = current.unwrap_or_else(|| ThoughtLoopRecord {
            session_id,
            recent_entries: Vec::new(),
            themes: Vec::new(),
            open_loops: Vec::new(),
            created_at: now,
            updated_at: now,
        });
        record.recent_entries.push(ThoughtLoopEntry {
            ts: now,
            text,
            emotion_label: "neutral".to_string(),
        });
        let overflow = record.recent_entries.len().saturating_sub(capacity);
        record.recent_entries.drain(..overflow);
        record.updated_at = now;
        record
    })
}

#[tokio::test]
async fn thought_loop_updates_do_not_grow_the_rollout() {
    let temp = tempdir().expect("tempdir");
    let store = JsonlKernelStore::new(temp.path()).expect("store");
    let session_id = Uuid::new_v4();
    store
        .append_message(&MessageRecord::new(session_id, Role::User, "hello"))
        .await
        .expect("message");
    let rollout = temp.path().join(format!("{session_id}.jsonl"));
    let rollout_len = std::fs::metadata(&rollout).expect("rollout").len();

    for idx in 0..60 {
        store
            .update_thought_loop(
                session_id,
                push_capped(session_id, format!("{}{idx}", "x".repeat(200)), 20),
            )
            .await
            .expect("update");
    }

    assert_eq!(std::fs::metadata(&rollout).expect("rollout").len(), rollout_len);
    let record = store
        .load_thought_loop(session_id)
        .await
        .expect("load")
        .expect("record");
    assert_eq!(record.recent_entries.len(), 20);
    assert!(record.recent_entries[0].text.ends_with("40"));
    assert_eq!(store.list_messages(session_id).await.expect("messages").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_stay_atomic_per_session() {
    let temp = tempdir().expect("tempdir");
    let store = JsonlKernelStore::new(temp.path()).expect("store");
    let sessions = [Uuid::new_v4(), Uuid::new_v4()];

    let mut handles = Vec::new();
    for session_id in sessions {
        for idx in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_thought_loop(
                        session_id,
                        push_capped(session_id, format!("t{idx}"), 64),
                    )
                    .await
                    .expect("update");
                store
                    .append_audit(&audit_row(session_id, "chat_message"))
                    .await
                    .expect("audit");
            }));
        }
    }
    for handle in handles {
        handle.await.expect("join");
    }

    for session_id in sessions {
        let record = store
            .load_thought_loop(session_id)
            .await
            .expect("load")
            .expect("record");
        assert_eq!(record.recent_entries.len(), 16);
        assert_eq!(store.list_audit(session_id).await.expect("audit").len(), 16);
    }
}
