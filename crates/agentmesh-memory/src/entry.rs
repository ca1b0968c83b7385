//! A single stored memory entry: a value plus the bookkeeping the TTL and
//! popularity-extension policies (§4.10) need.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub access_count: u64,
    /// Absent means no expiry; set by the backend from the owning
    /// `Memory` resource's `ttlSeconds`.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

impl MemoryEntry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            value,
            created_at: now,
            timestamp: now,
            access_count: 0,
            ttl_seconds: None,
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: Option<u64>) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Expiry is computed at read time from `created_at + ttl_seconds`,
    /// not enforced by a background sweep (§4.10).
    pub fn is_expired(&self) -> bool {
        match self.ttl_seconds {
            Some(ttl) => Utc::now() > self.created_at + chrono::Duration::seconds(ttl as i64),
            None => false,
        }
    }

    /// Record a read: bump the access count and, if the popularity
    /// extension policy applies, push `created_at` forward so the entry's
    /// effective TTL window restarts.
    pub fn touch(&mut self, extend_on_access: bool) {
        self.access_count += 1;
        self.timestamp = Utc::now();
        if extend_on_access {
            self.created_at = Utc::now();
        }
    }
}
