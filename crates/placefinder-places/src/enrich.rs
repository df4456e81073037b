//! Per-place detail lookups in fixed-size concurrent batches.

use futures::future::join_all;
use placefinder_core::{EnrichedResult, OpenStatus, ResultStub, NOT_AVAILABLE};
use tokio_util::sync::CancellationToken;

use crate::client::PlacesClient;
use crate::error::PlacesError;
use crate::retry::{fetch_ok, RetryPolicy};
use crate::types::{DetailsResponse, PlaceDetails};

/// Details requests in flight at once.
pub const ENRICHMENT_BATCH_SIZE: usize = 5;

pub const DEFAULT_PHOTO_MAX_WIDTH: u32 = 400;

/// Output of one enrichment pass.
#[derive(Debug, Default)]
pub struct Enrichment {
    /// Successfully enriched places, in stub order.
    pub results: Vec<EnrichedResult>,
    pub failed: usize,
    /// Size of each batch that was started.
    pub batch_sizes: Vec<usize>,
    /// The run was cancelled before every batch finished.
    pub cancelled: bool,
}

pub struct EnrichmentBatcher<'a> {
    client: &'a PlacesClient,
    retry: RetryPolicy,
    batch_size: usize,
    photo_max_width: u32,
    cancel: &'a CancellationToken,
}

impl<'a> EnrichmentBatcher<'a> {
    #[must_use]
    pub fn new(client: &'a PlacesClient, retry: RetryPolicy, cancel: &'a CancellationToken) -> Self {
        Self {
            client,
            retry,
            batch_size: ENRICHMENT_BATCH_SIZE,
            photo_max_width: DEFAULT_PHOTO_MAX_WIDTH,
            cancel,
        }
    }

    /// Overrides the batch size. `0` is treated as `1`.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_photo_max_width(mut self, photo_max_width: u32) -> Self {
        self.photo_max_width = photo_max_width;
        self
    }

    /// Looks up details for every stub, one batch at a time.
    ///
    /// Failed lookups are logged and counted, never propagated. Once the
    /// cancellation token fires no further batch is started and the results
    /// gathered so far are returned with `cancelled` set.
    pub async fn enrich(&self, stubs: &[ResultStub]) -> Enrichment {
        let mut enrichment = Enrichment {
            results: Vec::with_capacity(stubs.len()),
            ..Enrichment::default()
        };

        for batch in stubs.chunks(self.batch_size) {
            if self.cancel.is_cancelled() {
                enrichment.cancelled = true;
                break;
            }
            enrichment.batch_sizes.push(batch.len());

            let outcomes = join_all(batch.iter().map(|stub| self.enrich_one(stub))).await;

            for (stub, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(result) => enrichment.results.push(result),
                    Err(PlacesError::Cancelled) => {
                        enrichment.cancelled = true;
                    }
                    Err(err) => {
                        tracing::warn!(
                            place_id = %stub.place_id,
                            error = %err,
                            "place details lookup failed, dropping result"
                        );
                        enrichment.failed += 1;
                    }
                }
            }

            if enrichment.cancelled {
                break;
            }
        }

        if enrichment.failed > 0 || enrichment.cancelled {
            tracing::info!(
                enriched = enrichment.results.len(),
                failed = enrichment.failed,
                cancelled = enrichment.cancelled,
                "enrichment finished with losses"
            );
        }
        enrichment
    }

    async fn enrich_one(&self, stub: &ResultStub) -> Result<EnrichedResult, PlacesError> {
        let url = self.client.details_url(&stub.place_id);
        let details: DetailsResponse = fetch_ok(self.retry, self.cancel, || {
            self.client.get_json(&url)
        })
        .await?
        .decode("place details")?;
        Ok(self.derive(stub, details.result))
    }

    fn derive(&self, stub: &ResultStub, details: PlaceDetails) -> EnrichedResult {
        let photo_url = details
            .photos
            .iter()
            .map(|p| p.photo_reference.as_str())
            .find(|r| !r.is_empty())
            .map(|r| self.client.photo_url(r, self.photo_max_width));

        EnrichedResult {
            name: details
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| stub.name.clone()),
            address: or_not_available(details.formatted_address),
            rating: details.rating,
            phone: or_not_available(details.formatted_phone_number),
            website: or_not_available(details.website),
            open_now: OpenStatus::from_flag(details.opening_hours.and_then(|h| h.open_now)),
            photo_url,
        }
    }
}

fn or_not_available(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_owned())
}
