//! Twin read and on-demand sync handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult, SyncError};
use crate::pipeline::RunReport;
use axum::{
    extract::{Path, State},
    Json,
};
use herdsync_types::TwinId;
use serde::Serialize;
use serde_json::Value;

/// Read API response, one twin wrapped in a list
#[derive(Debug, Serialize)]
pub struct CowsResponse {
    pub cows: Vec<Value>,
}

/// Fetch a twin as stored; no pipeline involvement
pub async fn get_cow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CowsResponse>> {
    let snapshot = state.orchestrator.store().get(&TwinId::new(id)).await?;
    Ok(Json(CowsResponse {
        cows: vec![snapshot.to_document()],
    }))
}

/// Run the pipeline for one twin and return its report
pub async fn sync_cow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RunReport>> {
    let report = state
        .orchestrator
        .run_with_cancel(&TwinId::new(id), state.cancel.clone())
        .await;

    if let Some(error @ SyncError::LeaseTimeout { .. }) = report.error() {
        return Err(ApiError::Conflict(error.to_string()));
    }
    Ok(Json(report))
}
