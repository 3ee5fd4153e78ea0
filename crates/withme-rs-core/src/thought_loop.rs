//! Bounded per-session history of recent turns.

use chrono::{DateTime, Utc};
use log::debug;
use std::sync::Arc;
use withme_rs_protocol::SessionId;
use withme_rs_store::{KernelStore, StoreError, ThoughtLoopEntry, ThoughtLoopRecord};

/// Keep at most `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Append `entry` to `current` (or start a new record), evicting the oldest
/// entries beyond `capacity`.
pub fn push_entry(
    current: Option<ThoughtLoopRecord>,
    session_id: SessionId,
    entry: ThoughtLoopEntry,
    capacity: usize,
    now: DateTime<Utc>,
) -> ThoughtLoopRecord {
    let mut record = current.unwrap_or_else(|| ThoughtLoopRecord {
        session_id,
        recent_entries: Vec::new(),
        themes: Vec::new(),
        open_loops: Vec::new(),
        created_at: now,
        updated_at: now,
    });
    record.recent_entries.push(entry);
    let overflow = record.recent_entries.len().saturating_sub(capacity);
    if overflow > 0 {
        record.recent_entries.drain(..overflow);
    }
    record.updated_at = now;
    record
}

/// Maintains the append/evict window. Theme and open-loop derivation belong to
/// other processes; those lists are carried through untouched.
#[derive(Clone)]
pub struct ThoughtLoopAggregator {
    store: Arc<dyn KernelStore>,
    capacity: usize,
    snippet_chars: usize,
}

impl ThoughtLoopAggregator {
    pub fn new(store: Arc<dyn KernelStore>, capacity: usize, snippet_chars: usize) -> Self {
        Self {
            store,
            capacity,
            snippet_chars,
        }
    }

    pub async fn update(
        &self,
        session_id: SessionId,
        text: &str,
        emotion_label: &str,
    ) -> Result<ThoughtLoopRecord, StoreError> {
        let now = Utc::now();
        let entry = ThoughtLoopEntry {
            ts: now,
            text: truncate_chars(text, self.snippet_chars),
            emotion_label: emotion_label.to_string(),
        };
        let capacity = self.capacity;
        let record = self
            .store
            .update_thought_loop(
                session_id,
                Box::new(move |current| push_entry(current, session_id, entry, capacity, now)),
            )
            .await?;
        debug!(
            "thought loop updated (session_id={}, entries={})",
            session_id,
            record.recent_entries.len()
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn entry(text: &str) -> ThoughtLoopEntry {
        ThoughtLoopEntry {
            ts: Utc::now(),
            text: text.to_string(),
            emotion_label: "neutral".to_string(),
        }
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 200), "short");
        assert_eq!(truncate_chars(&"x".repeat(250), 200).len(), 200);
    }

    #[test]
    fn first_entry_creates_record() {
        let session_id = Uuid::new_v4();
        let record = push_entry(None, session_id, entry("one"), 20, Utc::now());
        assert_eq!(record.session_id, session_id);
        assert_eq!(record.recent_entries.len(), 1);
    }

    #[test]
    fn oldest_entries_are_evicted() {
        let session_id = Uuid::new_v4();
        let mut record = None;
        for idx in 0..25 {
            record = Some(push_entry(
                record,
                session_id,
                entry(&format!("turn {idx}")),
                20,
                Utc::now(),
            ));
        }
        let record = record.expect("record");
        let texts = record
            .recent_entries
            .iter()
            .map(|entry| entry.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(texts.len(), 20);
        assert_eq!(texts.first(), Some(&"turn 5"));
        assert_eq!(texts.last(), Some(&"turn 24"));
    }

    #[test]
    fn themes_survive_updates() {
        let session_id = Uuid::new_v4();
        let mut record = push_entry(None, session_id, entry("one"), 20, Utc::now());
        record.themes = vec!["work".to_string()];
        let record = push_entry(Some(record), session_id, entry("two"), 20, Utc::now());
        assert_eq!(record.themes, vec!["work"]);
    }
}
