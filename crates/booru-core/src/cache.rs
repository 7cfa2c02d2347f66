//! In-memory result cache for provider search responses.
//!
//! Entries are keyed by the normalized search key (see [`crate::query`]) and
//! leave the cache after a fixed TTL or when the least recently used entry is
//! pushed out by capacity, whichever comes first.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use moka::{future::Cache, policy::EvictionPolicy};

use crate::Result;

/// Immutable response body shared between the cache and its readers.
pub type Payload = Arc<[u8]>;

/// Cache seam used by the fetcher.
///
/// Errors are reported to the caller, which logs them and carries on: the
/// cache is an optimization and never decides whether a request succeeds.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Payload>>;
    async fn set(&self, key: &str, payload: Payload) -> Result<()>;
}

/// Bounded LRU + TTL cache backed by moka.
#[derive(Clone)]
pub struct ResultCache {
    entries: Cache<String, Payload>,
}

impl ResultCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        }
    }
}

#[cfg(test)]
impl ResultCache {
    /// Number of live entries (exact only after pending maintenance has run).
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }
}

#[async_trait]
impl ResponseCache for ResultCache {
    async fn get(&self, key: &str) -> Result<Option<Payload>> {
        Ok(self.entries.get(key).await)
    }

    async fn set(&self, key: &str, payload: Payload) -> Result<()> {
        self.entries.insert(key.to_string(), payload).await;
        Ok(())
    }
}
