//! Lock-free in-process memory backend, cleared on restart.
//!
//! Supports the same bounded-size and popularity-extension knobs as
//! `FileBackend`, since neither policy is specific to persistence (§4.10).

use async_trait::async_trait;
use dashmap::DashMap;

use crate::entry::MemoryEntry;
use crate::error::MemoryResult;
use crate::query::MemoryQuery;

use super::MemoryBackend;

#[derive(Default)]
pub struct InMemoryBackend {
    entries: DashMap<String, MemoryEntry>,
    max_entries: Option<usize>,
    extend_on_access: bool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(max_entries: Option<usize>, extend_on_access: bool) -> Self {
        Self { entries: DashMap::new(), max_entries, extend_on_access }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn trim_oldest_entries(&self, max: usize) {
        if self.entries.len() <= max {
            return;
        }
        let mut entries: Vec<(String, chrono::DateTime<chrono::Utc>)> =
            self.entries.iter().map(|e| (e.key().clone(), e.value().created_at)).collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1));

        let to_remove = self.entries.len() - max;
        for (key, _) in entries.into_iter().take(to_remove) {
            self.entries.remove(&key);
        }
    }
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    async fn store(&self, key: &str, entry: MemoryEntry) -> MemoryResult<()> {
        self.entries.insert(key.to_string(), entry);
        if let Some(max) = self.max_entries {
            self.trim_oldest_entries(max);
        }
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> MemoryResult<Option<MemoryEntry>> {
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_expired() => {
                drop(entry);
                self.entries.remove(key);
                Ok(None)
            }
            Some(mut entry) => {
                entry.touch(self.extend_on_access);
                Ok(Some(entry.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> MemoryResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: Option<&str>) -> MemoryResult<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| prefix.map_or(true, |p| k.starts_with(p)))
            .collect())
    }

    async fn clear(&self) -> MemoryResult<()> {
        self.entries.clear();
        Ok(())
    }

    async fn search(&self, query: &MemoryQuery) -> MemoryResult<Vec<MemoryEntry>> {
        let mut results = Vec::new();
        for entry in self.entries.iter() {
            if entry.is_expired() {
                continue;
            }
            if query.matches(&entry) {
                results.push(entry.clone());
                if let Some(limit) = query.limit {
                    if results.len() >= limit {
                        break;
                    }
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn stores_and_retrieves() {
        let backend = InMemoryBackend::new();
        backend
            .store("k1", MemoryEntry::new("k1", json!({"a": 1})))
            .await
            .unwrap();
        let got = backend.retrieve("k1").await.unwrap();
        assert_eq!(got.unwrap().value, json!({"a": 1}));
    }

    #[tokio::test]
    async fn expired_entry_is_not_returned() {
        let backend = InMemoryBackend::new();
        let mut entry = MemoryEntry::new("k1", json!(1)).with_ttl(Some(0));
        entry.created_at -= chrono::Duration::seconds(5);
        backend.store("k1", entry).await.unwrap();
        assert!(backend.retrieve("k1").await.unwrap().is_none());
        assert_eq!(backend.len(), 0);
    }

    #[tokio::test]
    async fn list_keys_filters_by_prefix() {
        let backend = InMemoryBackend::new();
        backend.store("user:1", MemoryEntry::new("user:1", json!(1))).await.unwrap();
        backend.store("admin:1", MemoryEntry::new("admin:1", json!(1))).await.unwrap();
        let keys = backend.list_keys(Some("user:")).await.unwrap();
        assert_eq!(keys, vec!["user:1".to_string()]);
    }

    #[tokio::test]
    async fn retrieve_bumps_access_count() {
        let backend = InMemoryBackend::new();
        backend.store("k1", MemoryEntry::new("k1", json!(1))).await.unwrap();
        backend.retrieve("k1").await.unwrap();
        let got = backend.retrieve("k1").await.unwrap().unwrap();
        assert_eq!(got.access_count, 2);
    }

    #[tokio::test]
    async fn max_entries_trims_oldest_on_store() {
        let backend = InMemoryBackend::with_options(Some(3), false);

        for i in 1..=5 {
            let entry = MemoryEntry::new(format!("key{i}"), json!(i));
            backend.store(&format!("key{i}"), entry).await.unwrap();
            tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
        }

        assert_eq!(backend.len(), 3);
        assert!(backend.retrieve("key1").await.unwrap().is_none());
        assert!(backend.retrieve("key2").await.unwrap().is_none());
        assert!(backend.retrieve("key5").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn extend_on_access_pushes_created_at_forward() {
        let backend = InMemoryBackend::with_options(None, true);
        backend.store("k1", MemoryEntry::new("k1", json!(1))).await.unwrap();
        let before = backend.retrieve("k1").await.unwrap().unwrap().created_at;
        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
        let after = backend.retrieve("k1").await.unwrap().unwrap().created_at;
        assert!(after > before);
    }
}
