//! End-to-end search: geocode, paginate, enrich, persist.

use std::sync::Arc;
use std::time::Duration;

use placefinder_core::{AppConfig, EnrichedResult, SearchRequest};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::client::PlacesClient;
use crate::enrich::{EnrichmentBatcher, DEFAULT_PHOTO_MAX_WIDTH, ENRICHMENT_BATCH_SIZE};
use crate::error::PlacesError;
use crate::geocode::Geocoder;
use crate::history::HistoryStore;
use crate::pagination::{PageAggregator, PagingPolicy};
use crate::retry::RetryPolicy;

pub const DEFAULT_SEARCH_RADIUS_METERS: u32 = 50_000;

/// Tunables for one orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub retry: RetryPolicy,
    pub paging: PagingPolicy,
    pub enrichment_batch_size: usize,
    pub photo_max_width: u32,
    pub search_radius_meters: u32,
    /// Overall budget for [`SearchOrchestrator::run`]. `None` means unbounded.
    pub deadline: Option<Duration>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            paging: PagingPolicy::default(),
            enrichment_batch_size: ENRICHMENT_BATCH_SIZE,
            photo_max_width: DEFAULT_PHOTO_MAX_WIDTH,
            search_radius_meters: DEFAULT_SEARCH_RADIUS_METERS,
            deadline: Some(Duration::from_secs(60)),
        }
    }
}

impl SearchSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_backoff_ms),
            ),
            paging: PagingPolicy {
                page_fetch_ceiling: config.page_fetch_ceiling,
                settle_delay: Duration::from_millis(config.settle_delay_ms),
                inter_page_delay: Duration::from_millis(config.inter_page_delay_ms),
                min_partial_results: config.min_partial_results,
            },
            enrichment_batch_size: config.enrichment_batch_size,
            photo_max_width: config.photo_max_width,
            search_radius_meters: config.search_radius_meters,
            deadline: (config.search_deadline_secs > 0)
                .then(|| Duration::from_secs(config.search_deadline_secs)),
        }
    }
}

/// A successful search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Complete(Vec<EnrichedResult>),
    /// Pagination or enrichment was cut short; these are the results that
    /// were gathered before it stopped.
    Partial(Vec<EnrichedResult>),
    NoResults,
}

impl SearchOutcome {
    #[must_use]
    pub fn results(&self) -> &[EnrichedResult] {
        match self {
            SearchOutcome::Complete(results) | SearchOutcome::Partial(results) => results,
            SearchOutcome::NoResults => &[],
        }
    }

    #[must_use]
    pub fn into_results(self) -> Vec<EnrichedResult> {
        match self {
            SearchOutcome::Complete(results) | SearchOutcome::Partial(results) => results,
            SearchOutcome::NoResults => Vec::new(),
        }
    }

    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, SearchOutcome::Partial(_))
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    /// `expected` describes the input the geocoder accepts, when it has a
    /// fixed format.
    #[error("location not found: {location}{}", expected_suffix(.expected.as_deref()))]
    LocationNotFound {
        location: String,
        expected: Option<&'static str>,
    },

    #[error("geocoding service failed: {message}")]
    Geocoding { message: String },

    /// Upstream failure. The display text stays generic; the provider status
    /// is reachable through `source()` for logs.
    #[error("the places provider could not complete the search")]
    Provider(#[source] PlacesError),

    #[error("search cancelled before any results were ready")]
    Cancelled,
}

fn expected_suffix(expected: Option<&str>) -> String {
    expected.map_or_else(String::new, |e| format!(" (expected {e})"))
}

impl From<PlacesError> for SearchError {
    fn from(err: PlacesError) -> Self {
        if err.is_cancelled() {
            SearchError::Cancelled
        } else {
            SearchError::Provider(err)
        }
    }
}

pub struct SearchOrchestrator {
    client: PlacesClient,
    geocoder: Arc<dyn Geocoder>,
    history: Option<Arc<dyn HistoryStore>>,
    settings: SearchSettings,
}

impl SearchOrchestrator {
    #[must_use]
    pub fn new(client: PlacesClient, geocoder: Arc<dyn Geocoder>, settings: SearchSettings) -> Self {
        Self {
            client,
            geocoder,
            history: None,
            settings,
        }
    }

    /// Builds the client and settings from application config.
    ///
    /// # Errors
    ///
    /// Returns [`PlacesError`] if the HTTP client cannot be constructed or
    /// the configured base URL is invalid.
    pub fn from_app_config(
        config: &AppConfig,
        geocoder: Arc<dyn Geocoder>,
    ) -> Result<Self, PlacesError> {
        let client = PlacesClient::with_base_url(
            &config.places_api_key,
            config.request_timeout_secs,
            &config.user_agent,
            &config.places_base_url,
        )?;
        Ok(Self::new(
            client,
            geocoder,
            SearchSettings::from_app_config(config),
        ))
    }

    #[must_use]
    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Runs a search under the configured deadline.
    ///
    /// When the deadline fires mid-run, whatever was gathered is returned as
    /// [`SearchOutcome::Partial`].
    ///
    /// # Errors
    ///
    /// See [`SearchOrchestrator::run_with_cancel`].
    pub async fn run(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        let cancel = CancellationToken::new();
        let timer = self.settings.deadline.map(|deadline| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                tracing::warn!(
                    deadline_secs = deadline.as_secs(),
                    "search deadline reached, cancelling"
                );
                token.cancel();
            })
        });

        let outcome = self.run_with_cancel(request, &cancel).await;
        if let Some(timer) = timer {
            timer.abort();
        }
        outcome
    }

    /// Runs a search that stops early when `cancel` fires.
    ///
    /// # Errors
    ///
    /// - [`SearchError::LocationNotFound`] when the geocoder returns no
    ///   candidates. No search request is issued.
    /// - [`SearchError::Geocoding`] when the geocoder itself fails.
    /// - [`SearchError::Provider`] when pagination fails before gathering
    ///   enough stubs to return a partial result.
    /// - [`SearchError::Cancelled`] when `cancel` fires before any result
    ///   could be enriched.
    pub async fn run_with_cancel(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, SearchError> {
        let location = request.location_text();
        let candidates = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SearchError::Cancelled),
            found = self.geocoder.geocode(location) => found.map_err(|e| SearchError::Geocoding {
                message: format!("{e:#}"),
            })?,
        };
        let Some(coordinates) = candidates.first().copied() else {
            tracing::info!(location, "geocoder found no candidates");
            return Err(SearchError::LocationNotFound {
                location: location.to_owned(),
                expected: self.geocoder.expected_input(),
            });
        };

        let search_url = self.client.text_search_url(
            request.business_query(),
            coordinates,
            self.settings.search_radius_meters,
        );
        let aggregation =
            PageAggregator::new(&self.client, self.settings.retry, self.settings.paging, cancel)
                .aggregate(&search_url, request.result_limit())
                .await?;

        if aggregation.stubs.is_empty() {
            tracing::info!(query = request.business_query(), location, "no results");
            return Ok(SearchOutcome::NoResults);
        }

        let enrichment = EnrichmentBatcher::new(&self.client, self.settings.retry, cancel)
            .with_batch_size(self.settings.enrichment_batch_size)
            .with_photo_max_width(self.settings.photo_max_width)
            .enrich(&aggregation.stubs)
            .await;

        if enrichment.results.is_empty() {
            if enrichment.cancelled {
                return Err(SearchError::Cancelled);
            }
            tracing::warn!(
                stubs = aggregation.stubs.len(),
                failed = enrichment.failed,
                "every place details lookup failed"
            );
            return Ok(SearchOutcome::NoResults);
        }

        self.persist(request, &enrichment.results);

        tracing::info!(
            query = request.business_query(),
            location,
            results = enrichment.results.len(),
            requests = aggregation.requests,
            token_waits = aggregation.token_waits,
            "search complete"
        );

        if aggregation.is_partial() || enrichment.cancelled {
            Ok(SearchOutcome::Partial(enrichment.results))
        } else {
            Ok(SearchOutcome::Complete(enrichment.results))
        }
    }

    /// Hands the results to the history store on a detached task.
    fn persist(&self, request: &SearchRequest, results: &[EnrichedResult]) {
        let Some(history) = self.history.clone() else {
            return;
        };
        let query = request.business_query().to_owned();
        let location = request.location_text().to_owned();
        let results = results.to_vec();
        tokio::spawn(async move {
            if let Err(e) = history.save(&query, &location, &results).await {
                tracing::error!(error = %e, query = %query, "failed to save search history");
            }
        });
    }
}
