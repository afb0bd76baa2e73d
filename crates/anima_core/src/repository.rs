//! In-process repository. Used by tests, simulations and hosts that persist
//! snapshots themselves.

use crate::error::AnimaResult;
use crate::record::{MemoryId, MemoryRecord};
use crate::MemoryRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryRepository {
    records: RwLock<HashMap<MemoryId, MemoryRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = MemoryRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.id, r)).collect()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// Records sorted by creation time so callers get a stable input order.
fn ordered(mut records: Vec<MemoryRecord>) -> Vec<MemoryRecord> {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    records
}

#[async_trait]
impl MemoryRepository for InMemoryRepository {
    async fn persist(&self, record: &MemoryRecord) -> AnimaResult<()> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, id: MemoryId) -> AnimaResult<Option<MemoryRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn query_active(&self) -> AnimaResult<Vec<MemoryRecord>> {
        let guard = self.records.read().await;
        Ok(ordered(guard.values().filter(|r| r.is_active()).cloned().collect()))
    }

    async fn query_all(&self) -> AnimaResult<Vec<MemoryRecord>> {
        let guard = self.records.read().await;
        Ok(ordered(guard.values().cloned().collect()))
    }

    async fn delete(&self, id: MemoryId) -> AnimaResult<bool> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MemoryCategory;
    use chrono::Utc;

    #[tokio::test]
    async fn test_persist_load_delete() {
        let repo = InMemoryRepository::new();
        let record = MemoryRecord::new("likes tea", MemoryCategory::Preference, Utc::now());
        repo.persist(&record).await.unwrap();
        assert_eq!(repo.len().await, 1);
        assert_eq!(repo.load(record.id).await.unwrap(), Some(record.clone()));
        assert!(repo.delete(record.id).await.unwrap());
        assert!(!repo.delete(record.id).await.unwrap());
        assert!(repo.load(record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_active_skips_forgotten() {
        let now = Utc::now();
        let active = MemoryRecord::new("a", MemoryCategory::Fact, now);
        let mut forgotten = MemoryRecord::new("b", MemoryCategory::Fact, now);
        forgotten.is_forgotten = true;
        let repo = InMemoryRepository::with_records(vec![active.clone(), forgotten]);
        let listed = repo.query_active().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, active.id);
        assert_eq!(repo.query_all().await.unwrap().len(), 2);
    }
}
