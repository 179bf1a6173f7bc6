//! `POST /`: ingest one feed into one table.
//!
//! A completed batch answers 200 with per-entry results, including entries
//! that failed. Non-2xx statuses are reserved for requests aborted before
//! any entry was processed. Entries stored before a client disconnect or
//! the request deadline stay stored; nothing is rolled back.

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use feedtable_core::{IngestRequest, IngestionOutcome};
use serde::Serialize;
use tracing::Instrument;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct IngestSummary {
    #[serde(flatten)]
    pub outcome: IngestionOutcome,
    pub first_failure: Option<String>,
}

pub(super) async fn ingest(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<IngestSummary>>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        ApiError::new(req_id.0.clone(), "validation_error", rejection.body_text())
    })?;

    let span = tracing::info_span!(
        "ingest",
        request_id = %req_id.0,
        url = request.url.as_deref().unwrap_or_default(),
        account = request.account.as_deref().unwrap_or_default(),
        table = request.table.as_deref().unwrap_or_default(),
    );
    let outcome = state
        .handler
        .handle(request)
        .instrument(span)
        .await
        .map_err(|e| ApiError::new(req_id.0.clone(), e.code(), e.to_string()))?;

    let first_failure = outcome.first_failure();
    Ok(Json(ApiResponse {
        data: IngestSummary {
            outcome,
            first_failure,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
