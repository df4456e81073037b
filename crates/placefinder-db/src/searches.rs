//! Database operations for `searches` and `search_results`.

use chrono::{DateTime, Utc};
use placefinder_core::{EnrichedResult, OpenStatus, SavedSearch, SavedSearchSummary};
use sqlx::SqlitePool;

use crate::DbError;

/// A row from the `searches` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchRow {
    pub id: i64,
    pub query: String,
    pub location: String,
    pub result_count: i64,
    pub created_at: DateTime<Utc>,
}

impl SearchRow {
    #[must_use]
    pub fn into_summary(self) -> SavedSearchSummary {
        SavedSearchSummary {
            id: self.id,
            query: self.query,
            location: self.location,
            result_count: usize::try_from(self.result_count).unwrap_or(0),
            created_at: self.created_at,
        }
    }
}

/// A row from the `search_results` table, without its keys.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchResultRow {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub website: String,
    pub rating: Option<f64>,
    /// `Open` or `Closed`.
    pub status: String,
    pub photo_url: Option<String>,
}

impl From<SearchResultRow> for EnrichedResult {
    fn from(row: SearchResultRow) -> Self {
        Self {
            name: row.name,
            address: row.address,
            rating: row.rating,
            phone: row.phone,
            website: row.website,
            open_now: if row.status == "Open" {
                OpenStatus::Open
            } else {
                OpenStatus::Closed
            },
            photo_url: row.photo_url,
        }
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Inserts a search and its results in one transaction, keeping result
/// order. Returns the new search id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; nothing is written then.
pub async fn insert_search(
    pool: &SqlitePool,
    query: &str,
    location: &str,
    results: &[EnrichedResult],
) -> Result<i64, DbError> {
    let mut tx = pool.begin().await?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO searches (query, location, result_count, created_at) \
         VALUES (?, ?, ?, ?) \
         RETURNING id",
    )
    .bind(query)
    .bind(location)
    .bind(to_i64(results.len()))
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    for (position, result) in results.iter().enumerate() {
        sqlx::query(
            "INSERT INTO search_results \
             (search_id, position, name, address, phone, website, rating, status, photo_url) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(to_i64(position))
        .bind(&result.name)
        .bind(&result.address)
        .bind(&result.phone)
        .bind(&result.website)
        .bind(result.rating)
        .bind(result.open_now.to_string())
        .bind(result.photo_url.as_deref())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(id)
}

/// Deletes every search except the `keep` newest, together with their
/// results. Returns the number of searches removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn prune_searches(pool: &SqlitePool, keep: usize) -> Result<u64, DbError> {
    let result = sqlx::query(
        "DELETE FROM searches \
         WHERE id NOT IN (SELECT id FROM searches ORDER BY id DESC LIMIT ?)",
    )
    .bind(to_i64(keep))
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Lists every search, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_searches(pool: &SqlitePool) -> Result<Vec<SavedSearchSummary>, DbError> {
    let rows = sqlx::query_as::<_, SearchRow>(
        "SELECT id, query, location, result_count, created_at \
         FROM searches \
         ORDER BY id DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(SearchRow::into_summary).collect())
}

/// Fetches one search with its results in their original order.
///
/// Returns `None` when no search has that id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn get_search(pool: &SqlitePool, id: i64) -> Result<Option<SavedSearch>, DbError> {
    let Some(row) = sqlx::query_as::<_, SearchRow>(
        "SELECT id, query, location, result_count, created_at \
         FROM searches \
         WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let results = sqlx::query_as::<_, SearchResultRow>(
        "SELECT name, address, phone, website, rating, status, photo_url \
         FROM search_results \
         WHERE search_id = ? \
         ORDER BY position",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(Some(SavedSearch {
        summary: row.into_summary(),
        results: results.into_iter().map(EnrichedResult::from).collect(),
    }))
}

/// Deletes a search and its results. Returns `false` when no search had
/// that id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_search(pool: &SqlitePool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM searches WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
