//! File-based memory backend for persistent storage.
//!
//! Stores memory entries in a JSON file that persists across agent runs.
//! Supports an optional `max_entries` limit to prevent unbounded file
//! growth: when the limit is reached, the oldest entries (by creation
//! time) are removed to make room for new ones.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::entry::MemoryEntry;
use crate::error::{MemoryError, MemoryResult};
use crate::query::MemoryQuery;

use super::MemoryBackend;

#[derive(Clone)]
pub struct FileBackend {
    path: PathBuf,
    cache: Arc<RwLock<HashMap<String, MemoryEntry>>>,
    max_entries: Option<usize>,
    extend_on_access: bool,
}

impl FileBackend {
    pub async fn new(path: impl Into<PathBuf>) -> MemoryResult<Self> {
        Self::with_options(path, None, false).await
    }

    pub async fn with_max_entries(path: impl Into<PathBuf>, max_entries: Option<usize>) -> MemoryResult<Self> {
        Self::with_options(path, max_entries, false).await
    }

    pub async fn with_options(
        path: impl Into<PathBuf>,
        max_entries: Option<usize>,
        extend_on_access: bool,
    ) -> MemoryResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| MemoryError::Io {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }

        let mut cache: HashMap<String, MemoryEntry> = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| MemoryError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
            if content.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            HashMap::new()
        };

        if let Some(max) = max_entries {
            if cache.len() > max {
                Self::trim_oldest_entries(&mut cache, max);
            }
        }

        let backend = Self {
            path,
            cache: Arc::new(RwLock::new(cache)),
            max_entries,
            extend_on_access,
        };

        if max_entries.is_some() {
            backend.persist().await?;
        }

        Ok(backend)
    }

    fn trim_oldest_entries(cache: &mut HashMap<String, MemoryEntry>, max: usize) {
        if cache.len() <= max {
            return;
        }
        let mut entries: Vec<_> = cache.iter().collect();
        entries.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at));

        let to_remove = cache.len() - max;
        let keys_to_remove: Vec<String> = entries.iter().take(to_remove).map(|(k, _)| (*k).clone()).collect();
        for key in keys_to_remove {
            cache.remove(&key);
        }
    }

    async fn persist(&self) -> MemoryResult<()> {
        let cache = self.cache.read().await;
        let content = serde_json::to_string_pretty(&*cache)?;
        drop(cache);

        tokio::fs::write(&self.path, content).await.map_err(|e| MemoryError::Io {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

#[async_trait]
impl MemoryBackend for FileBackend {
    async fn store(&self, key: &str, entry: MemoryEntry) -> MemoryResult<()> {
        {
            let mut cache = self.cache.write().await;
            cache.insert(key.to_string(), entry);
            if let Some(max) = self.max_entries {
                if cache.len() > max {
                    Self::trim_oldest_entries(&mut cache, max);
                }
            }
        }
        self.persist().await
    }

    async fn retrieve(&self, key: &str) -> MemoryResult<Option<MemoryEntry>> {
        let cache = self.cache.read().await;
        let expired = matches!(cache.get(key), Some(entry) if entry.is_expired());
        drop(cache);

        if expired {
            let mut cache = self.cache.write().await;
            cache.remove(key);
            drop(cache);
            self.persist().await?;
            return Ok(None);
        }

        let mut cache = self.cache.write().await;
        let Some(entry) = cache.get_mut(key) else {
            return Ok(None);
        };
        entry.touch(self.extend_on_access);
        let touched = entry.clone();
        drop(cache);
        self.persist().await?;
        Ok(Some(touched))
    }

    async fn delete(&self, key: &str) -> MemoryResult<()> {
        {
            let mut cache = self.cache.write().await;
            cache.remove(key);
        }
        self.persist().await
    }

    async fn list_keys(&self, prefix: Option<&str>) -> MemoryResult<Vec<String>> {
        let cache = self.cache.read().await;
        Ok(match prefix {
            Some(p) => cache.keys().filter(|k| k.starts_with(p)).cloned().collect(),
            None => cache.keys().cloned().collect(),
        })
    }

    async fn clear(&self) -> MemoryResult<()> {
        {
            let mut cache = self.cache.write().await;
            cache.clear();
        }
        self.persist().await
    }

    async fn search(&self, query: &MemoryQuery) -> MemoryResult<Vec<MemoryEntry>> {
        let cache = self.cache.read().await;
        let mut results = Vec::new();
        for entry in cache.values() {
            if entry.is_expired() {
                continue;
            }
            if query.matches(entry) {
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
    use tempfile::tempdir;

    #[tokio::test]
    async fn store_and_retrieve_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let backend = FileBackend::new(&path).await.unwrap();

        backend.store("k1", MemoryEntry::new("k1", json!({"data": "test"}))).await.unwrap();
        let retrieved = backend.retrieve("k1").await.unwrap();
        assert_eq!(retrieved.unwrap().key, "k1");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn entries_persist_across_backend_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");

        {
            let backend = FileBackend::new(&path).await.unwrap();
            backend.store("key1", MemoryEntry::new("key1", json!({"value": 1}))).await.unwrap();
            backend.store("key2", MemoryEntry::new("key2", json!({"value": 2}))).await.unwrap();
        }

        {
            let backend = FileBackend::new(&path).await.unwrap();
            assert_eq!(backend.retrieve("key1").await.unwrap().unwrap().value, json!({"value": 1}));
            assert_eq!(backend.retrieve("key2").await.unwrap().unwrap().value, json!({"value": 2}));
        }
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let backend = FileBackend::new(&path).await.unwrap();

        backend.store("key1", MemoryEntry::new("key1", json!(1))).await.unwrap();
        backend.delete("key1").await.unwrap();
        assert!(backend.retrieve("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn creates_nested_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/memory.json");
        let backend = FileBackend::new(&path).await.unwrap();
        backend.store("key1", MemoryEntry::new("key1", json!(1))).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn max_entries_trims_oldest_on_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let backend = FileBackend::with_max_entries(&path, Some(3)).await.unwrap();

        for i in 1..=5 {
            let entry = MemoryEntry::new(format!("key{i}"), json!(i));
            backend.store(&format!("key{i}"), entry).await.unwrap();
            tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        }

        let keys = backend.list_keys(None).await.unwrap();
        assert_eq!(keys.len(), 3);
        assert!(backend.retrieve("key1").await.unwrap().is_none());
        assert!(backend.retrieve("key2").await.unwrap().is_none());
        assert!(backend.retrieve("key5").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn retrieve_bumps_access_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let backend = FileBackend::new(&path).await.unwrap();

        backend.store("k1", MemoryEntry::new("k1", json!(1))).await.unwrap();
        backend.retrieve("k1").await.unwrap();
        let got = backend.retrieve("k1").await.unwrap().unwrap();
        assert_eq!(got.access_count, 2);
    }

    #[tokio::test]
    async fn extend_on_access_pushes_created_at_forward() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let backend = FileBackend::with_options(&path, None, true).await.unwrap();

        backend.store("k1", MemoryEntry::new("k1", json!(1))).await.unwrap();
        let before = backend.retrieve("k1").await.unwrap().unwrap().created_at;
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        let after = backend.retrieve("k1").await.unwrap().unwrap().created_at;
        assert!(after > before);
    }

    #[tokio::test]
    async fn max_entries_trims_on_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");

        {
            let backend = FileBackend::new(&path).await.unwrap();
            for i in 1..=5 {
                let entry = MemoryEntry::new(format!("key{i}"), json!(i));
                backend.store(&format!("key{i}"), entry).await.unwrap();
                tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
            }
            assert_eq!(backend.len().await, 5);
        }

        {
            let backend = FileBackend::with_max_entries(&path, Some(2)).await.unwrap();
            assert_eq!(backend.len().await, 2);
            assert!(backend.retrieve("key4").await.unwrap().is_some());
            assert!(backend.retrieve("key5").await.unwrap().is_some());
        }
    }
}
