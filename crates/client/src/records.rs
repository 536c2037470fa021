//! Record Cache: records the user authorized, keyed by id

use std::collections::HashMap;

use indivo_domain::Record;
use tokio::sync::RwLock;

/// Authorized records; filled by discovery and cleared on logout
#[derive(Debug, Default)]
pub struct RecordCache {
    records: RwLock<HashMap<String, Record>>,
}

impl RecordCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<Record> {
        self.records.read().await.get(id).cloned()
    }

    /// Insert or replace records; returns the cache size afterwards
    pub async fn insert_all(&self, records: impl IntoIterator<Item = Record>) -> usize {
        let mut cache = self.records.write().await;
        for record in records {
            cache.insert(record.id.clone(), record);
        }
        cache.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// All records ordered by id
    pub async fn all(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Record with the smallest id
    pub async fn first(&self) -> Option<Record> {
        self.records.read().await.values().min_by(|a, b| a.id.cmp(&b.id)).cloned()
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}
