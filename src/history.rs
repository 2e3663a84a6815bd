use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde_json::{json, Value};

use crate::{db::KeyValueStore, models::CallRecord};

pub const CALL_HISTORY_KEY: &str = "callHistory";
pub const LAST_CALL_KEY: &str = "lastCallData";
pub const LAST_UPDATE_KEY: &str = "lastUpdate";
pub const LAST_AGENT_STATUS_KEY: &str = "lastAgentStatus";

/// Most-recent-first call history, written through to the key-value store.
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
    max_entries: usize,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>, max_entries: usize) -> Self {
        Self { store, max_entries }
    }

    /// Never fails: an unreadable or malformed history starts empty.
    pub async fn load(&self) -> Vec<CallRecord> {
        let mut values = match self.store.get(&[CALL_HISTORY_KEY]).await {
            Ok(values) => values,
            Err(err) => {
                warn!("Failed to read call history: {err:#}");
                return Vec::new();
            }
        };

        let Some(raw) = values.remove(CALL_HISTORY_KEY) else {
            return Vec::new();
        };

        match serde_json::from_value::<Vec<CallRecord>>(raw) {
            Ok(mut history) => {
                history.truncate(self.max_entries);
                info!("Loaded {} calls from history", history.len());
                history
            }
            Err(err) => {
                warn!("Discarding malformed call history: {err}");
                Vec::new()
            }
        }
    }

    /// Puts `record` at the front of `history`, drops the oldest entries past
    /// the cap and writes the history, last record and timestamp in one call.
    /// `history` is updated even if the write fails, so the next append
    /// carries the missed data.
    pub async fn append(
        &self,
        history: &mut Vec<CallRecord>,
        record: CallRecord,
        saved_at: DateTime<Utc>,
    ) -> Result<()> {
        history.insert(0, record);
        history.truncate(self.max_entries);

        let entries = vec![
            (
                CALL_HISTORY_KEY.to_string(),
                serde_json::to_value(&*history).context("failed to encode call history")?,
            ),
            (
                LAST_CALL_KEY.to_string(),
                serde_json::to_value(&history[0]).context("failed to encode call record")?,
            ),
            (LAST_UPDATE_KEY.to_string(), json!(saved_at.to_rfc3339())),
        ];

        self.store
            .set(entries)
            .await
            .context("failed to persist call history")
    }

    pub async fn record_agent_status(&self, status: &str) -> Result<()> {
        self.store
            .set(vec![(
                LAST_AGENT_STATUS_KEY.to_string(),
                Value::String(status.to_string()),
            )])
            .await
            .context("failed to persist agent status")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::MemoryStore, models::DurationSource, monitor::testing::FlakyStore};
    use chrono::Duration;

    fn record(n: i64) -> CallRecord {
        let start = DateTime::parse_from_rfc3339("2026-03-02T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::minutes(n);
        CallRecord {
            id: format!("call-{n}"),
            phone: format!("8900000000{n}"),
            duration: "00:00:30".into(),
            region: "not specified".into(),
            start_time: start,
            end_time: start + Duration::seconds(30),
            finalized_at: start + Duration::seconds(31),
            source: DurationSource::Calculated,
        }
    }

    #[tokio::test]
    async fn empty_store_loads_empty_history() {
        let history = HistoryStore::new(Arc::new(MemoryStore::new()), 10);
        assert!(history.load().await.is_empty());
    }

    #[tokio::test]
    async fn append_caps_history_and_evicts_oldest() {
        let store = Arc::new(MemoryStore::new());
        let history_store = HistoryStore::new(store.clone(), 10);
        let mut history = Vec::new();

        for n in 0..12 {
            let saved_at = record(n).finalized_at;
            history_store
                .append(&mut history, record(n), saved_at)
                .await
                .unwrap();
        }

        let persisted = history_store.load().await;
        assert_eq!(persisted.len(), 10);
        assert_eq!(persisted, history);
        assert_eq!(persisted[0].id, "call-11");
        assert_eq!(persisted[9].id, "call-2");
        assert!(persisted.iter().all(|r| r.id != "call-0" && r.id != "call-1"));

        let values = store.get(&[LAST_CALL_KEY, LAST_UPDATE_KEY]).await.unwrap();
        assert_eq!(values[LAST_CALL_KEY]["id"], "call-11");
        assert!(values.contains_key(LAST_UPDATE_KEY));
    }

    #[tokio::test]
    async fn failed_write_keeps_memory_and_next_append_persists_both() {
        let store = Arc::new(FlakyStore::default());
        let history_store = HistoryStore::new(store.clone(), 10);
        let mut history = Vec::new();

        store.fail_writes(true);
        let missed = record(1);
        assert!(history_store
            .append(&mut history, missed.clone(), missed.finalized_at)
            .await
            .is_err());
        assert_eq!(history, vec![missed.clone()]);
        assert!(history_store.load().await.is_empty());

        store.fail_writes(false);
        let next = record(2);
        history_store
            .append(&mut history, next.clone(), next.finalized_at)
            .await
            .unwrap();

        assert_eq!(history_store.load().await, vec![next, missed]);
    }

    #[tokio::test]
    async fn malformed_history_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(vec![(CALL_HISTORY_KEY.into(), json!({ "not": "a list" }))])
            .await
            .unwrap();

        let history = HistoryStore::new(store, 10);
        assert!(history.load().await.is_empty());
    }

    #[tokio::test]
    async fn agent_status_is_written_under_its_key() {
        let store = Arc::new(MemoryStore::new());
        let history = HistoryStore::new(store.clone(), 10);
        history.record_agent_status("Готов").await.unwrap();

        let values = store.get(&[LAST_AGENT_STATUS_KEY]).await.unwrap();
        assert_eq!(values[LAST_AGENT_STATUS_KEY], json!("Готов"));
    }
}
