//! In-process record store with change notifications

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::{broadcast, RwLock};

use super::{matches_range, DateRange, RecordKind, RecordStore};
use crate::types::{RawRecord, Result, RevtrackError};

const CHANGE_CAPACITY: usize = 64;

pub struct MemoryStore {
    records: RwLock<HashMap<RecordKind, Vec<RawRecord>>>,
    unavailable: RwLock<HashSet<RecordKind>>,
    changes: broadcast::Sender<RecordKind>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            records: RwLock::new(HashMap::new()),
            unavailable: RwLock::new(HashSet::new()),
            changes,
        }
    }

    /// Add one record and notify subscribers
    pub async fn insert(&self, kind: RecordKind, record: RawRecord) {
        self.records
            .write()
            .await
            .entry(kind)
            .or_default()
            .push(record);
        self.notify(kind);
    }

    /// Add a batch with a single notification
    pub async fn extend(&self, kind: RecordKind, records: impl IntoIterator<Item = RawRecord>) {
        self.records
            .write()
            .await
            .entry(kind)
            .or_default()
            .extend(records);
        self.notify(kind);
    }

    /// Drop every record of `kind` and notify subscribers
    pub async fn clear(&self, kind: RecordKind) {
        self.records.write().await.remove(&kind);
        self.notify(kind);
    }

    /// Make reads of `kind` fail, as if its source were unreachable
    pub async fn set_unavailable(&self, kind: RecordKind, unavailable: bool) {
        let mut set = self.unavailable.write().await;
        if unavailable {
            set.insert(kind);
        } else {
            set.remove(&kind);
        }
    }

    fn notify(&self, kind: RecordKind) {
        // No receivers is fine
        let _ = self.changes.send(kind);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch(&self, kind: RecordKind, range: &DateRange) -> Result<Vec<RawRecord>> {
        if self.unavailable.read().await.contains(&kind) {
            return Err(RevtrackError::Store(format!("{kind} unavailable")));
        }
        Ok(self
            .records
            .read()
            .await
            .get(&kind)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| matches_range(r, kind, range))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<RecordKind>> {
        Some(self.changes.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_fetch_filters_by_range() {
        let store = MemoryStore::new();
        store
            .extend(
                RecordKind::Receipts,
                vec![
                    record(json!({"id": "r1", "issuedAt": "2024-03-10", "total": 80})),
                    record(json!({"id": "r2", "issuedAt": "2024-04-02", "total": 10})),
                ],
            )
            .await;

        let range = DateRange::between(
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
        );
        let records = store.fetch(RecordKind::Receipts, &range).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], "r1");

        let all = store.fetch(RecordKind::Receipts, &DateRange::all()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_kind_returns_nothing() {
        let store = MemoryStore::new();
        let records = store.fetch(RecordKind::Orders, &DateRange::all()).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_kind_fails() {
        let store = MemoryStore::new();
        store.set_unavailable(RecordKind::Receipts, true).await;
        let err = store
            .fetch(RecordKind::Receipts, &DateRange::all())
            .await
            .unwrap_err();
        assert!(matches!(err, RevtrackError::Store(_)));

        store.set_unavailable(RecordKind::Receipts, false).await;
        assert!(store.fetch(RecordKind::Receipts, &DateRange::all()).await.is_ok());
    }

    #[tokio::test]
    async fn test_insert_notifies_subscribers() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe().unwrap();

        store
            .insert(RecordKind::Standalone, record(json!({"id": "q1"})))
            .await;

        assert_eq!(rx.recv().await.unwrap(), RecordKind::Standalone);
    }
}
