//! Connector to an external vector-service memory backend (§4.10). This
//! crate treats the service as opaque: it speaks a small HTTP contract
//! (`PUT/GET/DELETE /entries/:key`, `POST /search`) and does no embedding
//! or similarity scoring itself — that's the service's job.

use async_trait::async_trait;

use crate::entry::MemoryEntry;
use crate::error::{MemoryError, MemoryResult};
use crate::query::MemoryQuery;

use super::MemoryBackend;

pub struct VectorServiceBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl VectorServiceBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    fn entry_url(&self, key: &str) -> String {
        format!("{}/entries/{}", self.endpoint.trim_end_matches('/'), key)
    }
}

#[async_trait]
impl MemoryBackend for VectorServiceBackend {
    async fn store(&self, key: &str, entry: MemoryEntry) -> MemoryResult<()> {
        self.client
            .put(self.entry_url(key))
            .json(&entry)
            .send()
            .await
            .map_err(|e| MemoryError::VectorService(e.to_string()))?
            .error_for_status()
            .map_err(|e| MemoryError::VectorService(e.to_string()))?;
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> MemoryResult<Option<MemoryEntry>> {
        let response = self
            .client
            .get(self.entry_url(key))
            .send()
            .await
            .map_err(|e| MemoryError::VectorService(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let entry: MemoryEntry = response
            .error_for_status()
            .map_err(|e| MemoryError::VectorService(e.to_string()))?
            .json()
            .await
            .map_err(|e| MemoryError::VectorService(e.to_string()))?;
        if entry.is_expired() {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn delete(&self, key: &str) -> MemoryResult<()> {
        self.client
            .delete(self.entry_url(key))
            .send()
            .await
            .map_err(|e| MemoryError::VectorService(e.to_string()))?;
        Ok(())
    }

    async fn list_keys(&self, prefix: Option<&str>) -> MemoryResult<Vec<String>> {
        let results = self.search(&MemoryQuery {
            prefix: prefix.map(str::to_string),
            ..Default::default()
        }).await?;
        Ok(results.into_iter().map(|e| e.key).collect())
    }

    async fn clear(&self) -> MemoryResult<()> {
        self.client
            .post(format!("{}/clear", self.endpoint.trim_end_matches('/')))
            .send()
            .await
            .map_err(|e| MemoryError::VectorService(e.to_string()))?;
        Ok(())
    }

    async fn search(&self, query: &MemoryQuery) -> MemoryResult<Vec<MemoryEntry>> {
        let body = serde_json::json!({
            "prefix": query.prefix,
            "limit": query.limit,
            "valueContains": query.value_contains,
        });
        let entries: Vec<MemoryEntry> = self
            .client
            .post(format!("{}/search", self.endpoint.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .map_err(|e| MemoryError::VectorService(e.to_string()))?
            .error_for_status()
            .map_err(|e| MemoryError::VectorService(e.to_string()))?
            .json()
            .await
            .map_err(|e| MemoryError::VectorService(e.to_string()))?;
        Ok(entries.into_iter().filter(|e| !e.is_expired()).collect())
    }
}
