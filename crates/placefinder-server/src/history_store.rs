use std::sync::Arc;

use async_trait::async_trait;
use placefinder_core::{AppConfig, EnrichedResult, SavedSearch, SavedSearchSummary};
use placefinder_db::PoolConfig;
use placefinder_places::{HistoryStore, MemoryHistoryStore};
use sqlx::SqlitePool;

/// `PLACEFINDER_DATABASE_URL` value that selects the in-process store.
const MEMORY_URL: &str = "memory";

/// History backed by the SQLite `searches` / `search_results` tables,
/// keeping at most `max_entries` searches.
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
    max_entries: usize,
}

impl SqliteHistoryStore {
    #[must_use]
    pub fn new(pool: SqlitePool, max_entries: usize) -> Self {
        Self {
            pool,
            max_entries: max_entries.max(1),
        }
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn save(
        &self,
        query: &str,
        location: &str,
        results: &[EnrichedResult],
    ) -> anyhow::Result<i64> {
        let id = placefinder_db::insert_search(&self.pool, query, location, results).await?;
        let pruned = placefinder_db::prune_searches(&self.pool, self.max_entries).await?;
        tracing::debug!(id, result_count = results.len(), pruned, "search saved");
        Ok(id)
    }

    async fn list(&self) -> anyhow::Result<Vec<SavedSearchSummary>> {
        Ok(placefinder_db::list_searches(&self.pool).await?)
    }

    async fn get(&self, id: i64) -> anyhow::Result<Option<SavedSearch>> {
        Ok(placefinder_db::get_search(&self.pool, id).await?)
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        Ok(placefinder_db::delete_search(&self.pool, id).await?)
    }
}

/// Opens the history store named by `config.database_url`, running
/// migrations for SQLite.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrated.
pub async fn open_history(config: &AppConfig) -> anyhow::Result<Arc<dyn HistoryStore>> {
    if config.database_url == MEMORY_URL {
        tracing::warn!("search history is kept in memory and lost on restart");
        return Ok(Arc::new(MemoryHistoryStore::with_capacity(
            config.history_max_entries,
        )));
    }

    let pool =
        placefinder_db::connect_pool(&config.database_url, PoolConfig::from_app_config(config))
            .await?;
    let applied = placefinder_db::run_migrations(&pool).await?;
    tracing::info!(
        applied,
        max_entries = config.history_max_entries,
        "search history database ready"
    );
    Ok(Arc::new(SqliteHistoryStore::new(
        pool,
        config.history_max_entries,
    )))
}

#[cfg(test)]
mod tests {
    use placefinder_core::{OpenStatus, NOT_AVAILABLE};
    use placefinder_db::{connect_pool, run_migrations};

    use super::*;

    async fn store(max_entries: usize) -> SqliteHistoryStore {
        let config = PoolConfig {
            max_connections: 1,
            min_connections: 1,
            acquire_timeout_secs: 5,
        };
        let pool = connect_pool("sqlite::memory:", config)
            .await
            .expect("connect in-memory sqlite");
        run_migrations(&pool).await.expect("migrations");
        SqliteHistoryStore::new(pool, max_entries)
    }

    fn result(name: &str) -> EnrichedResult {
        EnrichedResult {
            name: name.to_owned(),
            address: "1 Main St".to_owned(),
            rating: None,
            phone: NOT_AVAILABLE.to_owned(),
            website: NOT_AVAILABLE.to_owned(),
            open_now: OpenStatus::Open,
            photo_url: None,
        }
    }

    #[tokio::test]
    async fn sqlite_store_saves_lists_gets_and_deletes() {
        let store = store(10).await;
        let id = store
            .save("coffee", "Austin", &[result("A"), result("B")])
            .await
            .expect("save");

        let listed = store.list().await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].result_count, 2);

        let saved = store.get(id).await.expect("get").expect("saved search");
        assert_eq!(saved.results, vec![result("A"), result("B")]);

        assert!(store.delete(id).await.expect("delete"));
        assert!(store.get(id).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn sqlite_store_evicts_oldest_past_max_entries() {
        let store = store(2).await;
        let first = store.save("a", "x", &[result("A")]).await.expect("save");
        let second = store.save("b", "x", &[]).await.expect("save");
        let third = store.save("c", "x", &[]).await.expect("save");

        let ids: Vec<i64> = store
            .list()
            .await
            .expect("list")
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![third, second]);
        assert!(store.get(first).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn history_written_to_a_file_survives_reopening() {
        let path = std::env::temp_dir().join(format!(
            "placefinder-history-{}.db",
            uuid::Uuid::new_v4()
        ));
        let url = format!("sqlite://{}", path.display());
        let config = PoolConfig::default();

        let pool = connect_pool(&url, config).await.expect("open file db");
        run_migrations(&pool).await.expect("migrations");
        let id = SqliteHistoryStore::new(pool.clone(), 10)
            .save("coffee", "Austin", &[result("A")])
            .await
            .expect("save");
        pool.close().await;

        let reopened = connect_pool(&url, config).await.expect("reopen file db");
        run_migrations(&reopened).await.expect("migrations");
        let saved = SqliteHistoryStore::new(reopened.clone(), 10)
            .get(id)
            .await
            .expect("get")
            .expect("search persisted across pools");
        assert_eq!(saved.summary.query, "coffee");
        reopened.close().await;

        std::fs::remove_file(&path).ok();
    }
}
