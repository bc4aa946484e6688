//! Report and dispute letter read API
//!
//! - GET /api/reports/{report_id}: the report record plus its letters
//! - GET /api/disputes/{letter_id}: one dispute letter

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::db::{letters, reports};
use crate::error::{ApiError, ApiResult};
use crate::models::{DisputeLetter, Report};
use crate::AppState;

/// GET /api/reports/{report_id} response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    #[serde(flatten)]
    pub report: Report,
    pub dispute_letters: Vec<DisputeLetter>,
}

/// GET /api/reports/{report_id}
pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> ApiResult<Json<ReportResponse>> {
    let report = reports::get_report(&state.db, &report_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Report {} not found", report_id)))?;

    let dispute_letters = letters::list_for_report(&state.db, &report_id).await?;

    Ok(Json(ReportResponse {
        report,
        dispute_letters,
    }))
}

/// GET /api/disputes/{letter_id}
pub async fn get_dispute(
    State(state): State<AppState>,
    Path(letter_id): Path<String>,
) -> ApiResult<Json<DisputeLetter>> {
    let letter = letters::get_letter(&state.db, &letter_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Dispute letter {} not found", letter_id)))?;

    Ok(Json(letter))
}

/// Build report read routes
pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports/:report_id", get(get_report))
        .route("/api/disputes/:letter_id", get(get_dispute))
}
