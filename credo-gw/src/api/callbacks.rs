//! Callback receiver API handlers
//!
//! Three inbound endpoints the (simulated) remote analysis service calls to
//! reconcile asynchronous work into the store:
//! - POST /api/ai/callbacks/analysis-complete
//! - POST /api/ai/callbacks/dispute-status-update
//! - POST /api/ai/callbacks/report-processed
//!
//! All three validate their payload before touching the store, merge-write on
//! success, and apply report statuses only through the monotonic lattice,
//! so a stale callback is acknowledged but not applied. When a callback token
//! is
//! configured, a shared-secret middleware rejects unauthenticated callers
//! before validation runs.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use credo_common::events::GatewayEvent;

use crate::db::reports::{ReportMerge, TransitionOutcome};
use crate::db::{letters, reports};
use crate::error::{ApiError, ApiResult};
use crate::models::{DisputeLetter, ReportStatus};
use crate::AppState;

/// Header carrying the shared callback secret
pub const CALLBACK_TOKEN_HEADER: &str = "X-Callback-Token";

/// Outcome reported by the analysis-complete callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallbackStatus {
    Success,
    Failure,
}

/// Outcome reported by the report-processed (ingestion) callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IngestionStatus {
    Success,
    Failure,
    Partial,
}

/// One generated letter carried in the analysis-complete payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterPayload {
    pub letter_id: String,
    pub content: String,
}

/// POST /api/ai/callbacks/analysis-complete request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCompleteCallback {
    pub report_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub status: CallbackStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_letters: Option<Vec<LetterPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Defaults to the receive time when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// POST /api/ai/callbacks/dispute-status-update request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeStatusUpdateCallback {
    pub dispute_id: String,
    pub report_id: String,
    pub user_id: String,
    pub new_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference_id: Option<String>,
}

/// POST /api/ai/callbacks/report-processed request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportProcessedCallback {
    pub report_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub status: IngestionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_data_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Build the callback router with the shared-secret middleware attached
pub fn callback_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/ai/callbacks/analysis-complete", post(analysis_complete))
        .route(
            "/api/ai/callbacks/dispute-status-update",
            post(dispute_status_update),
        )
        .route("/api/ai/callbacks/report-processed", post(report_processed))
        .layer(middleware::from_fn_with_state(state, require_callback_token))
}

/// Shared-secret check for callback endpoints.
///
/// Authentication, not validation: runs before the body is even read. When no
/// token is configured the check is skipped (warned about at startup).
pub async fn require_callback_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = &state.config.callback_token {
        let presented = request
            .headers()
            .get(CALLBACK_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            warn!(path = %request.uri().path(), "Callback rejected: bad or missing token");
            return Err(ApiError::Unauthorized(
                "Missing or invalid callback token".to_string(),
            ));
        }
    }
    Ok(next.run(request).await)
}

/// Unwrap the JSON body, turning extractor rejections into 400s with detail
fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => Err(ApiError::BadRequest {
            message: "Invalid request body".to_string(),
            details: Some(json!({ "body": rejection.body_text() })),
        }),
    }
}

fn require_field(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest {
            message: "Invalid request body".to_string(),
            details: Some(json!({ field: "must be a non-empty string" })),
        });
    }
    Ok(())
}

/// POST /api/ai/callbacks/analysis-complete
///
/// Merges the analysis outcome into the report and persists one dispute
/// letter per payload letter. Replaying an identical payload converges on the
/// same state; a stale callback is acknowledged without mutation.
pub async fn analysis_complete(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisCompleteCallback>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let data = parse_body(payload)?;
    require_field(&data.report_id, "reportId")?;

    let new_status = match data.status {
        CallbackStatus::Success => ReportStatus::SuccessExternalAnalysisComplete,
        CallbackStatus::Failure => ReportStatus::FailureExternalAnalysisFailed,
    };
    let analysis_timestamp = data.timestamp.unwrap_or_else(Utc::now);

    let merge = ReportMerge {
        user_id: data.user_id.clone(),
        analysis_summary: data.summary.clone(),
        analysis_recommendations: data.recommendations.clone(),
        analysis_error: data.error.clone(),
        analysis_timestamp: Some(analysis_timestamp),
        ..Default::default()
    };

    match reports::apply_transition(&state.db, &data.report_id, new_status, merge).await? {
        TransitionOutcome::Applied(applied) => {
            if let Some(letters_payload) = &data.dispute_letters {
                for letter in letters_payload {
                    let letter_id = if letter.letter_id.trim().is_empty() {
                        Uuid::new_v4().to_string()
                    } else {
                        letter.letter_id.clone()
                    };
                    let now = Utc::now();
                    letters::upsert_letter(
                        &state.db,
                        &DisputeLetter {
                            letter_id,
                            report_id: data.report_id.clone(),
                            user_id: data.user_id.clone(),
                            content: letter.content.clone(),
                            status: "Generated_External".to_string(),
                            details: None,
                            external_reference_id: None,
                            source: "external".to_string(),
                            created_at: now,
                            updated_at: now,
                        },
                    )
                    .await?;
                }
            }

            state.event_bus.publish(GatewayEvent::ReportStatusChanged {
                report_id: data.report_id.clone(),
                status: applied.as_str().to_string(),
                timestamp: Utc::now(),
            });
            info!(
                report_id = %data.report_id,
                status = %applied,
                letters = data.dispute_letters.as_ref().map(|l| l.len()).unwrap_or(0),
                "Analysis-complete callback applied"
            );
        }
        TransitionOutcome::Stale { current, incoming } => {
            warn!(
                report_id = %data.report_id,
                current = %current,
                incoming = %incoming,
                "Stale analysis-complete callback acknowledged without mutation"
            );
        }
        TransitionOutcome::NotFound => {
            return Err(ApiError::NotFound(format!(
                "Report {} not found",
                data.report_id
            )));
        }
    }

    Ok(Json(json!({
        "message": "Callback received successfully",
        "reportId": data.report_id,
    })))
}

/// POST /api/ai/callbacks/dispute-status-update
///
/// Lenient by design: an update for an unknown letter is logged and
/// acknowledged, never created.
pub async fn dispute_status_update(
    State(state): State<AppState>,
    payload: Result<Json<DisputeStatusUpdateCallback>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let data = parse_body(payload)?;
    require_field(&data.dispute_id, "disputeId")?;
    require_field(&data.report_id, "reportId")?;
    require_field(&data.user_id, "userId")?;
    require_field(&data.new_status, "newStatus")?;

    let updated_at = data.updated_at.unwrap_or_else(Utc::now);
    let updated = letters::update_status(
        &state.db,
        &data.dispute_id,
        &data.new_status,
        data.details.as_deref(),
        data.external_reference_id.as_deref(),
        updated_at,
    )
    .await?;

    if updated {
        state.event_bus.publish(GatewayEvent::DisputeStatusChanged {
            letter_id: data.dispute_id.clone(),
            report_id: data.report_id.clone(),
            status: data.new_status.clone(),
            timestamp: Utc::now(),
        });
        info!(
            dispute_id = %data.dispute_id,
            status = %data.new_status,
            "Dispute-status-update callback applied"
        );
    } else {
        warn!(
            dispute_id = %data.dispute_id,
            "Dispute letter not found for status update; acknowledged without mutation"
        );
    }

    Ok(Json(json!({
        "message": "Callback received successfully",
        "disputeId": data.dispute_id,
    })))
}

/// POST /api/ai/callbacks/report-processed
///
/// Ingestion-stage callback; ranks below analysis in the status lattice, so a
/// late arrival can never clobber a completed analysis.
pub async fn report_processed(
    State(state): State<AppState>,
    payload: Result<Json<ReportProcessedCallback>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let data = parse_body(payload)?;
    require_field(&data.report_id, "reportId")?;
    if let Some(url) = &data.structured_data_url {
        if reqwest::Url::parse(url).is_err() {
            return Err(ApiError::BadRequest {
                message: "Invalid request body".to_string(),
                details: Some(json!({ "structuredDataUrl": "must be a valid URL" })),
            });
        }
    }

    let new_status = match data.status {
        IngestionStatus::Success => ReportStatus::SuccessExternalIngestionComplete,
        IngestionStatus::Partial => ReportStatus::PartialExternalIngestion,
        IngestionStatus::Failure => ReportStatus::FailureExternalIngestion,
    };
    let ingestion_timestamp = data.timestamp.unwrap_or_else(Utc::now);

    let merge = ReportMerge {
        user_id: data.user_id.clone(),
        ingestion_message: data.message.clone(),
        ingestion_error: data.error.clone(),
        ingestion_timestamp: Some(ingestion_timestamp),
        structured_data_url: data.structured_data_url.clone(),
        ..Default::default()
    };

    match reports::apply_transition(&state.db, &data.report_id, new_status, merge).await? {
        TransitionOutcome::Applied(applied) => {
            state.event_bus.publish(GatewayEvent::ReportStatusChanged {
                report_id: data.report_id.clone(),
                status: applied.as_str().to_string(),
                timestamp: Utc::now(),
            });
            info!(
                report_id = %data.report_id,
                status = %applied,
                "Report-processed callback applied"
            );
        }
        TransitionOutcome::Stale { current, incoming } => {
            warn!(
                report_id = %data.report_id,
                current = %current,
                incoming = %incoming,
                "Stale report-processed callback acknowledged without mutation"
            );
        }
        TransitionOutcome::NotFound => {
            return Err(ApiError::NotFound(format!(
                "Report {} not found",
                data.report_id
            )));
        }
    }

    Ok(Json(json!({
        "message": "Callback received successfully",
        "reportId": data.report_id,
    })))
}
