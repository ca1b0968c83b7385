//! Pluggable memory backends. `MemoryBackend` is the storage seam every
//! backend implements; `SimpleMemory` is the facade the runtime reaches
//! for, resolved from a `Memory` resource's `backend` field.

pub mod file;
pub mod memory;
pub mod vector_service;

use async_trait::async_trait;

use crate::entry::MemoryEntry;
use crate::error::MemoryResult;
use crate::query::MemoryQuery;

#[async_trait]
pub trait MemoryBackend: Send + Sync {
    async fn store(&self, key: &str, entry: MemoryEntry) -> MemoryResult<()>;
    async fn retrieve(&self, key: &str) -> MemoryResult<Option<MemoryEntry>>;
    async fn delete(&self, key: &str) -> MemoryResult<()>;
    async fn list_keys(&self, prefix: Option<&str>) -> MemoryResult<Vec<String>>;
    async fn clear(&self) -> MemoryResult<()>;
    async fn search(&self, query: &MemoryQuery) -> MemoryResult<Vec<MemoryEntry>>;
}

/// A type-erased handle to whichever backend a `Memory` resource resolved
/// to (§4.10: in-process or vector-service).
pub struct SimpleMemory {
    inner: Box<dyn MemoryBackend>,
}

impl SimpleMemory {
    pub fn in_memory() -> Self {
        Self {
            inner: Box::new(memory::InMemoryBackend::new()),
        }
    }

    pub async fn file(path: impl Into<std::path::PathBuf>) -> MemoryResult<Self> {
        Ok(Self {
            inner: Box::new(file::FileBackend::new(path).await?),
        })
    }

    pub fn vector_service(endpoint: impl Into<String>) -> Self {
        Self {
            inner: Box::new(vector_service::VectorServiceBackend::new(endpoint)),
        }
    }

    pub async fn store(&self, key: &str, entry: MemoryEntry) -> MemoryResult<()> {
        self.inner.store(key, entry).await
    }

    pub async fn retrieve(&self, key: &str) -> MemoryResult<Option<MemoryEntry>> {
        self.inner.retrieve(key).await
    }

    pub async fn delete(&self, key: &str) -> MemoryResult<()> {
        self.inner.delete(key).await
    }

    pub async fn list_keys(&self, prefix: Option<&str>) -> MemoryResult<Vec<String>> {
        self.inner.list_keys(prefix).await
    }

    pub async fn clear(&self) -> MemoryResult<()> {
        self.inner.clear().await
    }

    pub async fn search(&self, query: &MemoryQuery) -> MemoryResult<Vec<MemoryEntry>> {
        self.inner.search(query).await
    }
}
