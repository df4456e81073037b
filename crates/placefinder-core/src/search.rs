//! Domain types shared by the search engine, the HTTP server, and the CLI.

use serde::{Deserialize, Serialize};

/// Result limit used when the caller does not supply one (or supplies `0`).
pub const DEFAULT_RESULT_LIMIT: usize = 10;

/// Largest result limit a caller may request.
pub const MAX_RESULT_LIMIT: usize = 200;

/// Placeholder for contact fields the provider did not return.
pub const NOT_AVAILABLE: &str = "Not available";

/// Placeholder emitted in place of a missing rating.
pub const NOT_RATED: &str = "Not rated";

/// Normalizes a caller-supplied result limit into `1..=MAX_RESULT_LIMIT`.
///
/// `None` and `0` fall back to [`DEFAULT_RESULT_LIMIT`].
#[must_use]
pub fn normalize_result_limit(limit: Option<usize>) -> usize {
    match limit {
        None | Some(0) => DEFAULT_RESULT_LIMIT,
        Some(n) => n.min(MAX_RESULT_LIMIT),
    }
}

/// A single business search as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    business_query: String,
    location_text: String,
    result_limit: usize,
}

impl SearchRequest {
    #[must_use]
    pub fn new(
        business_query: impl Into<String>,
        location_text: impl Into<String>,
        result_limit: Option<usize>,
    ) -> Self {
        Self {
            business_query: business_query.into().trim().to_owned(),
            location_text: location_text.into().trim().to_owned(),
            result_limit: normalize_result_limit(result_limit),
        }
    }

    #[must_use]
    pub fn business_query(&self) -> &str {
        &self.business_query
    }

    #[must_use]
    pub fn location_text(&self) -> &str {
        &self.location_text
    }

    #[must_use]
    pub fn result_limit(&self) -> usize {
        self.result_limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Minimal identity of a place as returned by one text-search page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultStub {
    pub place_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenStatus {
    Open,
    Closed,
}

impl OpenStatus {
    /// `Open` only when the provider explicitly reports the place as open.
    #[must_use]
    pub fn from_flag(open_now: Option<bool>) -> Self {
        if open_now == Some(true) {
            OpenStatus::Open
        } else {
            OpenStatus::Closed
        }
    }
}

impl std::fmt::Display for OpenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenStatus::Open => write!(f, "Open"),
            OpenStatus::Closed => write!(f, "Closed"),
        }
    }
}

/// A place after its detail lookup succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedResult {
    pub name: String,
    pub address: String,
    /// Serialized as [`NOT_RATED`] when the provider has no rating.
    #[serde(default, with = "rating_or_placeholder")]
    pub rating: Option<f64>,
    pub phone: String,
    pub website: String,
    pub open_now: OpenStatus,
    pub photo_url: Option<String>,
}

/// Display form of an optional rating: one decimal, or [`NOT_RATED`].
#[must_use]
pub fn rating_label(rating: Option<f64>) -> String {
    rating.map_or_else(|| NOT_RATED.to_owned(), |v| format!("{v:.1}"))
}

mod rating_or_placeholder {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::NOT_RATED;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Number(f64),
        Text(String),
    }

    #[allow(clippy::ref_option)]
    pub(super) fn serialize<S: Serializer>(rating: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        match rating {
            Some(v) => s.serialize_f64(*v),
            None => s.serialize_str(NOT_RATED),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Option::<Stored>::deserialize(d)? {
            Some(Stored::Number(v)) => Some(v),
            Some(Stored::Text(_)) | None => None,
        })
    }
}
