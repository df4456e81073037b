//! Multi-page text-search aggregation.
//!
//! One [`PageAggregator::aggregate`] call owns an [`AggregationRun`] for the
//! lifetime of a single search: it follows `next_page_token` until the
//! effective limit is reached or no token remains, re-issuing a page when
//! the provider reports the token as not yet valid.

use std::collections::HashSet;
use std::time::Duration;

use placefinder_core::ResultStub;
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::client::PlacesClient;
use crate::error::PlacesError;
use crate::retry::{fetch_envelope, millis, pause, RetryPolicy};
use crate::types::{ApiStatus, TextSearchPage};

/// Safety guard against a provider that keeps issuing tokens.
pub const MAX_PAGES: usize = 200;

/// Consecutive not-ready waits allowed for a single page token.
pub const MAX_TOKEN_WAITS: u32 = 5;

pub const DEFAULT_PAGE_FETCH_CEILING: usize = 60;

/// Timing and bounds for one aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingPolicy {
    /// Upper bound on stubs gathered, regardless of the caller's limit.
    pub page_fetch_ceiling: usize,
    /// Wait before any request carrying a page token.
    pub settle_delay: Duration,
    /// Wait between accepting a page and starting the next one.
    pub inter_page_delay: Duration,
    /// Stubs required before a mid-run failure is returned as partial.
    pub min_partial_results: usize,
}

impl Default for PagingPolicy {
    fn default() -> Self {
        Self {
            page_fetch_ceiling: DEFAULT_PAGE_FETCH_CEILING,
            settle_delay: Duration::from_millis(2000),
            inter_page_delay: Duration::from_millis(100),
            min_partial_results: 1,
        }
    }
}

impl PagingPolicy {
    /// Clamps a caller's limit into `1..=page_fetch_ceiling`.
    #[must_use]
    pub fn effective_limit(&self, result_limit: usize) -> usize {
        result_limit.clamp(1, self.page_fetch_ceiling.max(1))
    }
}

/// What one aggregation run produced.
#[derive(Debug)]
pub struct Aggregation {
    /// Distinct stubs in provider order, never more than the effective limit.
    pub stubs: Vec<ResultStub>,
    /// Page requests issued, counting token re-issues but not rate-limit retries.
    pub requests: usize,
    pub token_waits: usize,
    /// The error that cut the run short, when stubs were salvaged.
    pub partial: Option<PlacesError>,
}

impl Aggregation {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.partial.is_some()
    }
}

/// Accumulator scoped to a single aggregation.
#[derive(Debug)]
struct AggregationRun {
    limit: usize,
    stubs: Vec<ResultStub>,
    seen: HashSet<String>,
    requests: usize,
    token_waits: usize,
}

impl AggregationRun {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            stubs: Vec::with_capacity(limit),
            seen: HashSet::new(),
            requests: 0,
            token_waits: 0,
        }
    }

    /// Appends unseen stubs until the limit is reached. Returns how many
    /// were accepted.
    fn absorb(&mut self, page: Vec<ResultStub>) -> usize {
        let before = self.stubs.len();
        for stub in page {
            if self.is_full() {
                break;
            }
            if self.seen.insert(stub.place_id.clone()) {
                self.stubs.push(stub);
            }
        }
        self.stubs.len() - before
    }

    fn is_full(&self) -> bool {
        self.stubs.len() >= self.limit
    }

    fn finish(self, partial: Option<PlacesError>) -> Aggregation {
        Aggregation {
            stubs: self.stubs,
            requests: self.requests,
            token_waits: self.token_waits,
            partial,
        }
    }
}

/// Drives successive text-search pages for one query.
pub struct PageAggregator<'a> {
    client: &'a PlacesClient,
    retry: RetryPolicy,
    paging: PagingPolicy,
    cancel: &'a CancellationToken,
}

impl<'a> PageAggregator<'a> {
    #[must_use]
    pub fn new(
        client: &'a PlacesClient,
        retry: RetryPolicy,
        paging: PagingPolicy,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            client,
            retry,
            paging,
            cancel,
        }
    }

    /// Gathers up to `result_limit` distinct stubs for `search_url`.
    ///
    /// `search_url` is the first-page URL from
    /// [`PlacesClient::text_search_url`]; tokens are appended per page.
    ///
    /// # Errors
    ///
    /// Returns the first unrecoverable [`PlacesError`] when fewer than
    /// `min_partial_results` stubs had been gathered. Otherwise the failure
    /// is attached to [`Aggregation::partial`] and the stubs are returned.
    pub async fn aggregate(
        &self,
        search_url: &Url,
        result_limit: usize,
    ) -> Result<Aggregation, PlacesError> {
        let limit = self.paging.effective_limit(result_limit);
        if limit < result_limit {
            tracing::info!(
                requested = result_limit,
                limit,
                "result limit clamped to page fetch ceiling"
            );
        }

        let mut run = AggregationRun::new(limit);
        match self.drive(search_url, &mut run).await {
            Ok(()) => {
                tracing::debug!(
                    stubs = run.stubs.len(),
                    requests = run.requests,
                    token_waits = run.token_waits,
                    "aggregation complete"
                );
                Ok(run.finish(None))
            }
            Err(err) => self.salvage(run, err),
        }
    }

    async fn drive(&self, search_url: &Url, run: &mut AggregationRun) -> Result<(), PlacesError> {
        let mut token: Option<String> = None;
        let mut page_count = 0usize;

        loop {
            page_count += 1;
            if page_count > MAX_PAGES {
                return Err(PlacesError::PaginationLimit {
                    max_pages: MAX_PAGES,
                });
            }

            let page = self.fetch_page(search_url, token.as_deref(), run).await?;
            let accepted = run.absorb(page.stubs());
            tracing::debug!(
                page = page_count,
                accepted,
                total = run.stubs.len(),
                "text search page accepted"
            );

            if run.is_full() {
                break;
            }
            token = page.next_token();
            if token.is_none() {
                break;
            }

            pause(self.cancel, self.paging.inter_page_delay).await?;
            pause(self.cancel, self.paging.settle_delay).await?;
        }

        Ok(())
    }

    /// Fetches one logical page, waiting out `INVALID_REQUEST` while the
    /// token settles.
    async fn fetch_page(
        &self,
        search_url: &Url,
        token: Option<&str>,
        run: &mut AggregationRun,
    ) -> Result<TextSearchPage, PlacesError> {
        let page_url = PlacesClient::page_url(search_url, token);
        let mut waits = 0u32;

        loop {
            run.requests += 1;
            let envelope =
                fetch_envelope(self.retry, self.cancel, || self.client.get_json(&page_url)).await?;

            if envelope.status == ApiStatus::InvalidRequest && token.is_some() {
                if waits >= MAX_TOKEN_WAITS {
                    tracing::warn!(waits, "page token never became valid");
                    return Err(envelope.into_provider_error());
                }
                waits += 1;
                run.token_waits += 1;
                tracing::debug!(
                    wait = waits,
                    delay_ms = millis(self.paging.settle_delay),
                    "page token not ready, re-issuing page"
                );
                pause(self.cancel, self.paging.settle_delay).await?;
                continue;
            }

            return envelope.ensure_success()?.decode("textsearch page");
        }
    }

    fn salvage(&self, run: AggregationRun, err: PlacesError) -> Result<Aggregation, PlacesError> {
        let threshold = self.paging.min_partial_results.max(1);
        if run.stubs.len() >= threshold {
            tracing::warn!(
                stubs = run.stubs.len(),
                requests = run.requests,
                error = %err,
                "pagination failed, returning partial results"
            );
            Ok(run.finish(Some(err)))
        } else {
            Err(err)
        }
    }
}
