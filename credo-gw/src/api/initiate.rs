//! Report processing initiation API
//!
//! POST /api/credit/initiate routes one request down one of two channels:
//! - internal: the synchronous pipeline runs in-process and the results come
//!   back in the response body, nothing persisted
//! - external: a report record is persisted first, then a handoff job is
//!   enqueued; the response is an acknowledgement carrying the report id

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use credo_common::events::GatewayEvent;

use crate::db::reports::{self, ReportMerge};
use crate::error::{ApiError, ApiResult};
use crate::models::{Jurisdiction, ProcessingChannel, Report, ReportStatus};
use crate::pipeline::{PipelineError, PipelineRequest};
use crate::services::handoff::HandoffJob;
use crate::AppState;

/// POST /api/credit/initiate request body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    /// Opaque subject identifier (e.g. an SSN surrogate or NI number)
    pub identifier: String,
    pub user_information: Option<String>,
    #[serde(default)]
    pub jurisdiction: Jurisdiction,
    #[serde(default)]
    pub processing_channel: ProcessingChannel,
    pub user_id: Option<String>,
}

/// Nested summary result, matching the shape clients already consume
#[derive(Debug, Clone, Serialize)]
pub struct SummaryResult {
    pub summary: String,
}

/// Nested letters result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeLettersResult {
    pub dispute_letters: Vec<String>,
}

/// POST /api/credit/initiate response body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_letters: Option<DisputeLettersResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    pub processing_channel: ProcessingChannel,
    pub jurisdiction: Jurisdiction,
}

/// POST /api/credit/initiate
pub async fn initiate(
    State(state): State<AppState>,
    payload: Result<Json<InitiateRequest>, JsonRejection>,
) -> ApiResult<Json<InitiateResponse>> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return Err(ApiError::BadRequest {
                message: "Invalid request body".to_string(),
                details: Some(json!({ "body": rejection.body_text() })),
            })
        }
    };

    if request.identifier.trim().is_empty() {
        return Err(ApiError::BadRequest {
            message: "Invalid request body".to_string(),
            details: Some(json!({ "identifier": "must be a non-empty string" })),
        });
    }

    info!(
        channel = %request.processing_channel,
        jurisdiction = %request.jurisdiction,
        "Credit report processing initiated"
    );

    match request.processing_channel {
        ProcessingChannel::Internal => run_internal(&state, request).await,
        ProcessingChannel::External => start_external(&state, request).await,
    }
}

/// Synchronous in-process run; results are returned, never persisted
async fn run_internal(state: &AppState, request: InitiateRequest) -> ApiResult<Json<InitiateResponse>> {
    let pipeline_request = PipelineRequest {
        identifier: request.identifier,
        user_information: request.user_information,
        jurisdiction: request.jurisdiction,
    };
    let outcome = state.pipeline.run(&pipeline_request).await;

    if outcome.is_total_failure() {
        let message = outcome
            .error_text()
            .unwrap_or_else(|| "Internal processing failed".to_string());
        error!(error = %message, "Internal processing produced no results");
        state.record_error(&message).await;
        return Err(ApiError::Internal(message));
    }

    // Letters are suppressed entirely when identification itself failed;
    // an empty list means the report came back clean
    let identification_failed = outcome
        .errors
        .iter()
        .any(|e| matches!(e, PipelineError::IdentificationFailed(_)));

    let status_message = if outcome.errors.is_empty() {
        "Internal processing completed."
    } else {
        "Internal processing completed with some errors."
    };

    Ok(Json(InitiateResponse {
        summary: outcome
            .summary
            .clone()
            .map(|summary| SummaryResult { summary }),
        dispute_letters: if identification_failed {
            None
        } else {
            Some(DisputeLettersResult {
                dispute_letters: outcome.dispute_letters.clone(),
            })
        },
        error: outcome.error_text(),
        status_message: Some(status_message.to_string()),
        report_id: None,
        processing_channel: ProcessingChannel::Internal,
        jurisdiction: pipeline_request.jurisdiction,
    }))
}

/// Persist the report record, then enqueue the handoff job.
///
/// Ordering matters: the record must exist before any background work starts,
/// otherwise a fast callback could race an absent row. A persistence failure
/// is fatal and schedules nothing; a full queue is recorded on the report as
/// a terminal failure and surfaced as 503.
async fn start_external(state: &AppState, request: InitiateRequest) -> ApiResult<Json<InitiateResponse>> {
    let report = Report::new_external(
        request.identifier.clone(),
        request.user_id.clone(),
        request.jurisdiction,
    );

    reports::save_initiated(&state.db, &report).await.map_err(|e| {
        error!(error = %e, "Failed to persist initiated report; nothing scheduled");
        ApiError::Internal(format!("Failed to persist report record: {}", e))
    })?;

    state.event_bus.publish(GatewayEvent::ReportInitiated {
        report_id: report.report_id.clone(),
        processing_channel: ProcessingChannel::External.as_str().to_string(),
        jurisdiction: request.jurisdiction.as_str().to_string(),
        timestamp: report.requested_at,
    });

    let job = HandoffJob {
        report_id: report.report_id.clone(),
        identifier: request.identifier,
        user_information: request.user_information,
        jurisdiction: request.jurisdiction,
        user_id: request.user_id,
    };

    if state.handoff.enqueue(job).is_err() {
        let detail = "Handoff queue full; report not scheduled".to_string();
        warn!(report_id = %report.report_id, "{}", detail);
        let merge = ReportMerge {
            external_error: Some(detail.clone()),
            ..Default::default()
        };
        if let Err(e) = reports::apply_transition(
            &state.db,
            &report.report_id,
            ReportStatus::FailureExternalCallbackException,
            merge,
        )
        .await
        {
            error!(report_id = %report.report_id, error = %e, "Failed to record queue rejection");
        }
        state.record_error(&detail).await;
        return Err(ApiError::Unavailable(detail));
    }

    info!(report_id = %report.report_id, "External handoff job enqueued");

    Ok(Json(InitiateResponse {
        summary: None,
        dispute_letters: None,
        error: None,
        status_message: Some(
            "External processing initiated. Results will be delivered via callback.".to_string(),
        ),
        report_id: Some(report.report_id),
        processing_channel: ProcessingChannel::External,
        jurisdiction: request.jurisdiction,
    }))
}

/// Build initiation routes
pub fn initiate_routes() -> Router<AppState> {
    Router::new().route("/api/credit/initiate", post(initiate))
}
