//! Persistence of completed searches.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use placefinder_core::{EnrichedResult, SavedSearch, SavedSearchSummary};
use tokio::sync::RwLock;

/// Searches kept by [`MemoryHistoryStore::new`] before the oldest is evicted.
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// Store of completed searches. Writes happen after a search has been
/// assembled and never affect its outcome.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Records a search and returns its id.
    async fn save(&self, query: &str, location: &str, results: &[EnrichedResult]) -> Result<i64>;

    /// Summaries of every recorded search, newest first.
    async fn list(&self) -> Result<Vec<SavedSearchSummary>>;

    async fn get(&self, id: i64) -> Result<Option<SavedSearch>>;

    /// Removes a search. Returns `false` when no search had that id.
    async fn delete(&self, id: i64) -> Result<bool>;
}

#[derive(Debug, Default)]
struct Entries {
    next_id: i64,
    searches: BTreeMap<i64, SavedSearch>,
}

/// Process-local history keyed by an increasing id, holding at most
/// `capacity` searches.
#[derive(Debug)]
pub struct MemoryHistoryStore {
    capacity: usize,
    inner: RwLock<Entries>,
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl MemoryHistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that evicts its oldest search once more than `capacity` are
    /// recorded. A capacity of `0` is treated as `1`.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(Entries::default()),
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn save(&self, query: &str, location: &str, results: &[EnrichedResult]) -> Result<i64> {
        let mut entries = self.inner.write().await;
        entries.next_id += 1;
        let id = entries.next_id;
        entries.searches.insert(
            id,
            SavedSearch {
                summary: SavedSearchSummary {
                    id,
                    query: query.to_owned(),
                    location: location.to_owned(),
                    result_count: results.len(),
                    created_at: Utc::now(),
                },
                results: results.to_vec(),
            },
        );

        let mut evicted = 0usize;
        while entries.searches.len() > self.capacity {
            entries.searches.pop_first();
            evicted += 1;
        }
        tracing::debug!(
            id,
            query,
            location,
            result_count = results.len(),
            evicted,
            "search saved"
        );
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<SavedSearchSummary>> {
        let entries = self.inner.read().await;
        Ok(entries
            .searches
            .values()
            .rev()
            .map(|s| s.summary.clone())
            .collect())
    }

    async fn get(&self, id: i64) -> Result<Option<SavedSearch>> {
        Ok(self.inner.read().await.searches.get(&id).cloned())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.inner.write().await.searches.remove(&id).is_some())
    }
}
