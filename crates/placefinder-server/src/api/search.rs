use axum::{extract::State, Extension, Json};
use placefinder_core::{EnrichedResult, SearchRequest};
use placefinder_places::{SearchError, SearchOutcome};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct SearchBody {
    #[serde(default)]
    business: String,
    #[serde(default)]
    location: String,
    /// Accepts a number or a numeric string; anything else uses the default.
    #[serde(default)]
    limit: Option<serde_json::Value>,
}

fn parse_limit(raw: Option<&serde_json::Value>) -> Option<usize> {
    match raw? {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(super) async fn run_search(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<SearchBody>,
) -> Result<Json<ApiResponse<Vec<EnrichedResult>>>, ApiError> {
    let request = SearchRequest::new(body.business, body.location, parse_limit(body.limit.as_ref()));
    if request.business_query().is_empty() || request.location_text().is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "business and location are required",
        ));
    }

    tracing::info!(
        request_id = %req_id.0,
        query = request.business_query(),
        location = request.location_text(),
        limit = request.result_limit(),
        "search requested"
    );

    let outcome = state
        .orchestrator
        .run(&request)
        .await
        .map_err(|e| map_search_error(req_id.0.clone(), &e))?;

    let partial = outcome.is_partial();
    if matches!(outcome, SearchOutcome::NoResults) {
        return Err(ApiError::new(
            req_id.0,
            "no_results",
            "no businesses found for this search",
        ));
    }

    let mut meta = ResponseMeta::new(req_id.0);
    meta.partial = Some(partial);
    Ok(Json(ApiResponse {
        data: outcome.into_results(),
        meta,
    }))
}

fn map_search_error(request_id: String, error: &SearchError) -> ApiError {
    match error {
        SearchError::LocationNotFound { .. } => {
            ApiError::new(request_id, "location_not_found", error.to_string())
        }
        SearchError::Geocoding { .. } => {
            tracing::error!(error = %error, "geocoding failed");
            ApiError::new(request_id, "provider_error", "location lookup failed")
        }
        SearchError::Provider(source) => {
            tracing::error!(error = %source, "places provider failed");
            ApiError::new(request_id, "provider_error", error.to_string())
        }
        SearchError::Cancelled => {
            ApiError::new(request_id, "timeout", "search did not finish in time")
        }
    }
}
