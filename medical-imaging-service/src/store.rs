use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

use crate::models::{MedicalAnalysisRecord, NewAnalysisRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Trait for storing and retrieving completed analyses
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Persist a new record and assign it a fresh id.
    async fn create(&self, record: NewAnalysisRecord) -> StoreResult<MedicalAnalysisRecord>;
    async fn get(&self, id: i64) -> StoreResult<Option<MedicalAnalysisRecord>>;
    /// All records in id order.
    async fn list(&self) -> StoreResult<Vec<MedicalAnalysisRecord>>;
}

/// In-memory implementation of AnalysisStore. Lives as long as the process;
/// ids start at 1 and are never reused.
pub struct InMemoryAnalysisStore {
    records: Arc<DashMap<i64, MedicalAnalysisRecord>>,
    next_id: AtomicI64,
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InMemoryAnalysisStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisStore for InMemoryAnalysisStore {
    async fn create(&self, record: NewAnalysisRecord) -> StoreResult<MedicalAnalysisRecord> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = MedicalAnalysisRecord::from_new(id, record, Utc::now());
        self.records.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: i64) -> StoreResult<Option<MedicalAnalysisRecord>> {
        Ok(self.records.get(&id).map(|entry| entry.clone()))
    }

    async fn list(&self) -> StoreResult<Vec<MedicalAnalysisRecord>> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.id);
        Ok(records)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fallback::fallback_output;
    use crate::report::new_record;
    use std::collections::HashSet;

    pub(crate) fn sample_record(filename: &str) -> NewAnalysisRecord {
        new_record(filename.to_string(), "QUJD".to_string(), None, &fallback_output()).unwrap()
    }

    #[tokio::test]
    async fn test_ids_start_at_one_and_increase() {
        let store = InMemoryAnalysisStore::new();
        let first = store.create(sample_record("a.png")).await.unwrap();
        let second = store.create(sample_record("b.png")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.get(2).await.unwrap().unwrap().image_filename, "b.png");
        assert!(store.get(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_in_insertion_order() {
        let store = InMemoryAnalysisStore::new();
        for name in ["a.png", "b.png", "c.png"] {
            store.create(sample_record(name)).await.unwrap();
        }
        let names: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.image_filename)
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_get_distinct_ids() {
        let store = Arc::new(InMemoryAnalysisStore::new());
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .create(sample_record(&format!("{i}.png")))
                        .await
                        .unwrap()
                        .id
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap()));
        }
        assert_eq!(ids.len(), 50);
        assert_eq!(store.list().await.unwrap().len(), 50);
        assert_eq!(ids, (1..=50).collect());
    }
}
