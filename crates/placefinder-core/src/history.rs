use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::search::EnrichedResult;

/// Listing row for a recorded search, without its results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSearchSummary {
    pub id: i64,
    pub query: String,
    pub location: String,
    pub result_count: usize,
    pub created_at: DateTime<Utc>,
}

/// A recorded search together with the results it returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSearch {
    #[serde(flatten)]
    pub summary: SavedSearchSummary,
    pub results: Vec<EnrichedResult>,
}
