use axum::{
    extract::{Path, State},
    Extension, Json,
};
use placefinder_core::{SavedSearch, SavedSearchSummary};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct DeletedData {
    deleted: bool,
}

fn not_found(request_id: String, id: i64) -> ApiError {
    ApiError::new(request_id, "not_found", format!("search {id} not found"))
}

fn storage_error(request_id: String, err: &anyhow::Error) -> ApiError {
    tracing::error!(error = %err, "search history storage failed");
    ApiError::new(request_id, "internal_error", "search history is unavailable")
}

pub(super) async fn list_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<SavedSearchSummary>>>, ApiError> {
    let searches = state
        .history
        .list()
        .await
        .map_err(|e| storage_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: searches,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SavedSearch>>, ApiError> {
    let saved = state
        .history
        .get(id)
        .await
        .map_err(|e| storage_error(req_id.0.clone(), &e))?
        .ok_or_else(|| not_found(req_id.0.clone(), id))?;

    Ok(Json(ApiResponse {
        data: saved,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn delete_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DeletedData>>, ApiError> {
    let deleted = state
        .history
        .delete(id)
        .await
        .map_err(|e| storage_error(req_id.0.clone(), &e))?;
    if !deleted {
        return Err(not_found(req_id.0, id));
    }
    tracing::info!(id, "search history entry deleted");

    Ok(Json(ApiResponse {
        data: DeletedData { deleted: true },
        meta: ResponseMeta::new(req_id.0),
    }))
}
