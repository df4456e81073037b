pub mod client;
pub mod enrich;
pub mod error;
pub mod geocode;
pub mod history;
pub mod orchestrator;
pub mod pagination;
pub mod retry;
pub mod types;

pub use client::PlacesClient;
pub use enrich::{Enrichment, EnrichmentBatcher, DEFAULT_PHOTO_MAX_WIDTH, ENRICHMENT_BATCH_SIZE};
pub use error::PlacesError;
pub use geocode::{CoordinateGeocoder, Geocoder};
pub use history::{HistoryStore, MemoryHistoryStore, DEFAULT_HISTORY_CAPACITY};
pub use orchestrator::{
    SearchError, SearchOrchestrator, SearchOutcome, SearchSettings, DEFAULT_SEARCH_RADIUS_METERS,
};
pub use pagination::{Aggregation, PageAggregator, PagingPolicy, MAX_PAGES, MAX_TOKEN_WAITS};
pub use retry::{fetch_envelope, fetch_ok, RetryPolicy};
pub use tokio_util::sync::CancellationToken;
pub use types::{ApiStatus, Envelope};
