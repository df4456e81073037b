//! HTTP client for the Google Places web service.
//!
//! Wraps `reqwest` with endpoint construction, API key handling, and JSON
//! decoding. The client performs exactly one request per call; retry and
//! status classification live in [`crate::retry`].

use std::time::Duration;

use placefinder_core::Coordinates;
use reqwest::{Client, StatusCode, Url};

use crate::error::PlacesError;

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place/";

/// Detail fields requested for every enrichment lookup.
const DETAIL_FIELDS: &str =
    "name,formatted_address,rating,formatted_phone_number,website,opening_hours,photos";

/// Client for the Places text-search, details, and photo endpoints.
///
/// Use [`PlacesClient::new`] for production or [`PlacesClient::with_base_url`]
/// to point at a mock server in tests.
#[derive(Clone)]
pub struct PlacesClient {
    client: Client,
    api_key: String,
    text_search_endpoint: Url,
    details_endpoint: Url,
    photo_endpoint: Url,
}

impl std::fmt::Debug for PlacesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacesClient")
            .field("api_key", &"[redacted]")
            .field("text_search_endpoint", &self.text_search_endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl PlacesClient {
    /// Creates a new client pointed at the production Places API.
    ///
    /// # Errors
    ///
    /// Returns [`PlacesError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, PlacesError> {
        Self::with_base_url(api_key, timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`PlacesError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`PlacesError::InvalidBaseUrl`] if
    /// `base_url` is not a valid URL base.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, PlacesError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Exactly one trailing slash so `join` appends rather than replacing
        // the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let invalid = |reason: String| PlacesError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason,
        };
        let base = Url::parse(&normalised).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("URL cannot be used as a base".to_owned()));
        }
        let join = |path: &str| base.join(path).map_err(|e| invalid(e.to_string()));

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            text_search_endpoint: join("textsearch/json")?,
            details_endpoint: join("details/json")?,
            photo_endpoint: join("photo")?,
        })
    }

    /// Builds the first-page text-search URL for `query` around `location`.
    #[must_use]
    pub fn text_search_url(&self, query: &str, location: Coordinates, radius_meters: u32) -> Url {
        let mut url = self.text_search_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("location", &location.to_string())
            .append_pair("radius", &radius_meters.to_string())
            .append_pair("key", &self.api_key);
        url
    }

    /// Appends `pagetoken` to a text-search URL when a token is present.
    #[must_use]
    pub fn page_url(search_url: &Url, page_token: Option<&str>) -> Url {
        let mut url = search_url.clone();
        if let Some(token) = page_token {
            url.query_pairs_mut().append_pair("pagetoken", token);
        }
        url
    }

    /// Builds the details URL for one place.
    #[must_use]
    pub fn details_url(&self, place_id: &str) -> Url {
        let mut url = self.details_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("place_id", place_id)
            .append_pair("fields", DETAIL_FIELDS)
            .append_pair("key", &self.api_key);
        url
    }

    /// Builds a bounded-width photo URL for a photo reference.
    #[must_use]
    pub fn photo_url(&self, photo_reference: &str, max_width: u32) -> String {
        let mut url = self.photo_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("maxwidth", &max_width.to_string())
            .append_pair("photo_reference", photo_reference)
            .append_pair("key", &self.api_key);
        url.into()
    }

    /// Sends a GET request and parses the response body as JSON.
    ///
    /// # Errors
    ///
    /// - [`PlacesError::Throttled`] on HTTP 429.
    /// - [`PlacesError::Http`] on network failure or any other non-2xx status.
    /// - [`PlacesError::Deserialize`] if the body is not valid JSON.
    pub async fn get_json(&self, url: &Url) -> Result<serde_json::Value, PlacesError> {
        let response = self.client.get(url.clone()).send().await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(PlacesError::Throttled);
        }
        let response = response.error_for_status()?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| PlacesError::Deserialize {
            context: url.path().to_owned(),
            source: e,
        })
    }
}
