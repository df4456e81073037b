use thiserror::Error;

/// Errors returned by the Places API client and the aggregation engine.
#[derive(Debug, Error)]
pub enum PlacesError {
    /// Network or TLS failure, or a non-2xx HTTP status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered HTTP 429; treated like a rate-limit status.
    #[error("HTTP 429 from places API")]
    Throttled,

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The response body is JSON but carries no `status` field.
    #[error("malformed response envelope for {context}: missing status")]
    MalformedEnvelope { context: String },

    /// Rate-limit signals persisted through every retry.
    #[error("places API rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// The API returned a terminal status other than `OK` / `ZERO_RESULTS`.
    #[error("places API error: {status}{}", detail_suffix(.message))]
    Provider {
        status: String,
        message: Option<String>,
    },

    /// Guard against cycling page tokens.
    #[error("pagination limit reached: exceeded {max_pages} pages")]
    PaginationLimit { max_pages: usize },

    #[error("invalid places base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The run's cancellation token fired before the operation finished.
    #[error("operation cancelled")]
    Cancelled,
}

#[allow(clippy::ref_option)]
fn detail_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" - {m}"))
        .unwrap_or_default()
}

impl PlacesError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PlacesError::Cancelled)
    }
}
