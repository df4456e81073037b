//! Places API response types.
//!
//! Every Places response is a JSON object with a top-level `status` string
//! and an optional `error_message`. [`Envelope`] reads those two fields and
//! keeps the rest of the body for typed decoding once the status has been
//! classified.

use placefinder_core::ResultStub;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::PlacesError;

/// Envelope `status` values the engine distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiStatus {
    Ok,
    ZeroResults,
    OverQueryLimit,
    ResourceExhausted,
    InvalidRequest,
    RequestDenied,
    NotFound,
    UnknownError,
    Other(String),
}

impl ApiStatus {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "OK" => ApiStatus::Ok,
            "ZERO_RESULTS" => ApiStatus::ZeroResults,
            "OVER_QUERY_LIMIT" => ApiStatus::OverQueryLimit,
            "RESOURCE_EXHAUSTED" => ApiStatus::ResourceExhausted,
            "INVALID_REQUEST" => ApiStatus::InvalidRequest,
            "REQUEST_DENIED" => ApiStatus::RequestDenied,
            "NOT_FOUND" => ApiStatus::NotFound,
            "UNKNOWN_ERROR" => ApiStatus::UnknownError,
            other => ApiStatus::Other(other.to_owned()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ApiStatus::Ok => "OK",
            ApiStatus::ZeroResults => "ZERO_RESULTS",
            ApiStatus::OverQueryLimit => "OVER_QUERY_LIMIT",
            ApiStatus::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ApiStatus::InvalidRequest => "INVALID_REQUEST",
            ApiStatus::RequestDenied => "REQUEST_DENIED",
            ApiStatus::NotFound => "NOT_FOUND",
            ApiStatus::UnknownError => "UNKNOWN_ERROR",
            ApiStatus::Other(raw) => raw,
        }
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiStatus::OverQueryLimit | ApiStatus::ResourceExhausted)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ApiStatus::Ok | ApiStatus::ZeroResults)
    }
}

impl std::fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded response body with its classified status.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub status: ApiStatus,
    pub error_message: Option<String>,
    body: serde_json::Value,
}

impl Envelope {
    /// Reads `status` and `error_message` from a response body.
    ///
    /// # Errors
    ///
    /// Returns [`PlacesError::MalformedEnvelope`] if `status` is missing or
    /// not a string.
    pub fn from_body(body: serde_json::Value, context: &str) -> Result<Self, PlacesError> {
        let status = body
            .get("status")
            .and_then(serde_json::Value::as_str)
            .map(ApiStatus::parse)
            .ok_or_else(|| PlacesError::MalformedEnvelope {
                context: context.to_owned(),
            })?;
        let error_message = body
            .get("error_message")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned);
        Ok(Self {
            status,
            error_message,
            body,
        })
    }

    /// Converts a non-success envelope into [`PlacesError::Provider`].
    ///
    /// # Errors
    ///
    /// Returns [`PlacesError::Provider`] unless the status is `OK` or
    /// `ZERO_RESULTS`.
    pub fn ensure_success(self) -> Result<Self, PlacesError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(self.into_provider_error())
        }
    }

    #[must_use]
    pub fn into_provider_error(self) -> PlacesError {
        PlacesError::Provider {
            status: self.status.as_str().to_owned(),
            message: self.error_message,
        }
    }

    /// Deserializes the full body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`PlacesError::Deserialize`] if the body does not match `T`.
    pub fn decode<T: DeserializeOwned>(self, context: &str) -> Result<T, PlacesError> {
        serde_json::from_value(self.body).map_err(|e| PlacesError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}

// ---------------------------------------------------------------------------
// textsearch
// ---------------------------------------------------------------------------

/// One page of a text search.
///
/// `results` is kept as raw JSON so a single malformed entry (no
/// `place_id`) is skipped instead of failing the whole page.
#[derive(Debug, Deserialize)]
pub struct TextSearchPage {
    #[serde(default)]
    results: Vec<serde_json::Value>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl TextSearchPage {
    /// Stubs on this page, in provider order, skipping unusable entries.
    #[must_use]
    pub fn stubs(&self) -> Vec<ResultStub> {
        self.results
            .iter()
            .filter_map(|v| serde_json::from_value::<ResultStub>(v.clone()).ok())
            .filter(|stub| !stub.place_id.is_empty())
            .collect()
    }

    /// The next-page token, treating an empty string as absent.
    #[must_use]
    pub fn next_token(&self) -> Option<String> {
        self.next_page_token.clone().filter(|t| !t.is_empty())
    }
}

// ---------------------------------------------------------------------------
// details
// ---------------------------------------------------------------------------

/// Wrapper for the details response: `{ "result": { ... } }`.
#[derive(Debug, Deserialize)]
pub struct DetailsResponse {
    pub result: PlaceDetails,
}

#[derive(Debug, Deserialize)]
pub struct PlaceDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub formatted_phone_number: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub opening_hours: Option<OpeningHours>,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
pub struct OpeningHours {
    #[serde(default)]
    pub open_now: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct Photo {
    #[serde(default)]
    pub photo_reference: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_parse_round_trips_known_values() {
        for raw in [
            "OK",
            "ZERO_RESULTS",
            "OVER_QUERY_LIMIT",
            "RESOURCE_EXHAUSTED",
            "INVALID_REQUEST",
            "REQUEST_DENIED",
            "NOT_FOUND",
            "UNKNOWN_ERROR",
        ] {
            assert_eq!(ApiStatus::parse(raw).as_str(), raw);
        }
        assert_eq!(
            ApiStatus::parse("SOMETHING_NEW"),
            ApiStatus::Other("SOMETHING_NEW".to_owned())
        );
    }

    #[test]
    fn rate_limit_statuses_are_classified() {
        assert!(ApiStatus::OverQueryLimit.is_rate_limited());
        assert!(ApiStatus::ResourceExhausted.is_rate_limited());
        assert!(!ApiStatus::InvalidRequest.is_rate_limited());
        assert!(ApiStatus::ZeroResults.is_success());
        assert!(!ApiStatus::RequestDenied.is_success());
    }

    #[test]
    fn envelope_without_status_is_malformed() {
        let result = Envelope::from_body(json!({"results": []}), "test");
        assert!(matches!(
            result,
            Err(PlacesError::MalformedEnvelope { .. })
        ));
    }

    #[test]
    fn ensure_success_carries_provider_message() {
        let envelope = Envelope::from_body(
            json!({"status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}),
            "test",
        )
        .unwrap();
        match envelope.ensure_success() {
            Err(PlacesError::Provider { status, message }) => {
                assert_eq!(status, "REQUEST_DENIED");
                assert_eq!(
                    message.as_deref(),
                    Some("The provided API key is invalid.")
                );
            }
            other => panic!("expected Provider error, got {other:?}"),
        }
    }

    #[test]
    fn text_search_page_skips_entries_without_place_id() {
        let page: TextSearchPage = serde_json::from_value(json!({
            "status": "OK",
            "results": [
                {"place_id": "a", "name": "Alpha"},
                {"name": "No Id"},
                {"place_id": "", "name": "Blank"},
                {"place_id": "b", "name": "Beta"}
            ],
            "next_page_token": ""
        }))
        .unwrap();
        let ids: Vec<String> = page.stubs().into_iter().map(|s| s.place_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(page.next_token().is_none());
    }

    #[test]
    fn place_details_tolerate_missing_optional_fields() {
        let details: DetailsResponse = serde_json::from_value(json!({
            "status": "OK",
            "result": {"name": "Bare Minimum"}
        }))
        .unwrap();
        assert_eq!(details.result.name.as_deref(), Some("Bare Minimum"));
        assert!(details.result.rating.is_none());
        assert!(details.result.opening_hours.is_none());
        assert!(details.result.photos.is_empty());
    }
}
