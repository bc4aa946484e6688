//! External handoff worker
//!
//! Plays the remote analysis service: each job waits a randomized delay,
//! synthesizes an analysis result, and delivers it back to this gateway's
//! analysis-complete receiver over HTTP, exactly as a real remote worker
//! would. Jobs run on a bounded queue with a fixed number of consumers and
//! an overall per-job deadline.
//!
//! Delivery failures never vanish: every failure mode is written to the
//! report as a terminal status before the job ends.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use sqlx::SqlitePool;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use credo_common::config::GatewayConfig;
use credo_common::events::{EventBus, GatewayEvent};

use crate::api::callbacks::{AnalysisCompleteCallback, CallbackStatus, LetterPayload};
use crate::db::reports::{self, ReportMerge, TransitionOutcome};
use crate::models::{Jurisdiction, ReportStatus};

/// One unit of delegated work, enqueued at initiation time
#[derive(Debug, Clone)]
pub struct HandoffJob {
    pub report_id: String,
    pub identifier: String,
    pub user_information: Option<String>,
    pub jurisdiction: Jurisdiction,
    pub user_id: Option<String>,
}

/// Worker settings, extracted from the gateway configuration
#[derive(Debug, Clone)]
pub struct HandoffSettings {
    pub public_base_url: Option<String>,
    pub callback_token: Option<String>,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub queue_capacity: usize,
    pub concurrency: usize,
    pub job_timeout_secs: u64,
}

impl From<&GatewayConfig> for HandoffSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            public_base_url: config.public_base_url.clone(),
            callback_token: config.callback_token.clone(),
            delay_min_ms: config.handoff.delay_min_ms,
            delay_max_ms: config.handoff.delay_max_ms,
            queue_capacity: config.handoff.queue_capacity,
            concurrency: config.handoff.concurrency,
            job_timeout_secs: config.handoff.job_timeout_secs,
        }
    }
}

/// Cloneable handle for enqueueing handoff jobs
#[derive(Clone)]
pub struct HandoffHandle {
    tx: mpsc::Sender<HandoffJob>,
}

impl HandoffHandle {
    /// Enqueue a job without blocking. Fails when the bounded queue is full
    /// or the worker has shut down; the caller records the failure.
    pub fn enqueue(&self, job: HandoffJob) -> Result<(), HandoffJob> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => {
                warn!(report_id = %job.report_id, "Handoff queue full, rejecting job");
                job
            }
            mpsc::error::TrySendError::Closed(job) => {
                error!(report_id = %job.report_id, "Handoff worker is not running");
                job
            }
        })
    }
}

struct WorkerContext {
    pool: SqlitePool,
    event_bus: EventBus,
    http: reqwest::Client,
    settings: HandoffSettings,
}

/// The bounded handoff worker pool
pub struct HandoffWorker;

impl HandoffWorker {
    /// Spawn the worker tasks and return the enqueue handle
    pub fn spawn(settings: HandoffSettings, pool: SqlitePool, event_bus: EventBus) -> HandoffHandle {
        let (tx, rx) = mpsc::channel::<HandoffJob>(settings.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        let ctx = Arc::new(WorkerContext {
            pool,
            event_bus,
            http: reqwest::Client::new(),
            settings: settings.clone(),
        });

        for worker_id in 0..settings.concurrency.max(1) {
            let rx = Arc::clone(&rx);
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let Some(job) = job else {
                        info!(worker_id, "Handoff worker shutting down");
                        break;
                    };
                    run_job(&ctx, job).await;
                }
            });
        }

        HandoffHandle { tx }
    }
}

struct DeliveryFailure {
    status: ReportStatus,
    detail: String,
}

/// Execute one job under the overall deadline, recording any failure
async fn run_job(ctx: &WorkerContext, job: HandoffJob) {
    let deadline = Duration::from_secs(ctx.settings.job_timeout_secs);
    info!(report_id = %job.report_id, "Handoff job started");

    let result = tokio::time::timeout(deadline, deliver(ctx, &job)).await;
    match result {
        Ok(Ok(())) => {
            info!(report_id = %job.report_id, "Handoff callback delivered");
        }
        Ok(Err(failure)) => {
            record_failure(ctx, &job, failure.status, failure.detail).await;
        }
        Err(_) => {
            record_failure(
                ctx,
                &job,
                ReportStatus::FailureExternalTimedOut,
                format!(
                    "Handoff job exceeded {}s deadline",
                    ctx.settings.job_timeout_secs
                ),
            )
            .await;
        }
    }
}

/// The simulated remote worker: delay, synthesize, call back
async fn deliver(ctx: &WorkerContext, job: &HandoffJob) -> Result<(), DeliveryFailure> {
    // Unknown remote processing time, drawn uniformly from the configured window
    let delay_ms = {
        let mut rng = rand::thread_rng();
        rng.gen_range(ctx.settings.delay_min_ms..=ctx.settings.delay_max_ms)
    };
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    let payload = synthesize_result(job);

    let Some(base_url) = &ctx.settings.public_base_url else {
        return Err(DeliveryFailure {
            status: ReportStatus::FailureExternalCallbackUrlMissing,
            detail: "public_base_url not configured; cannot deliver callback".to_string(),
        });
    };

    let url = format!("{}/api/ai/callbacks/analysis-complete", base_url);
    let mut request = ctx.http.post(&url).json(&payload);
    if let Some(token) = &ctx.settings.callback_token {
        request = request.header("X-Callback-Token", token);
    }

    match request.send().await {
        Ok(response) if response.status().is_success() => Ok(()),
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DeliveryFailure {
                status: ReportStatus::FailureExternalCallbackFailed,
                detail: format!("Callback rejected by gateway with {}: {}", status, body),
            })
        }
        Err(e) => Err(DeliveryFailure {
            status: ReportStatus::FailureExternalCallbackException,
            detail: format!("Callback transport error: {}", e),
        }),
    }
}

/// Fixed-shape simulated analysis result: one summary plus two letters
fn synthesize_result(job: &HandoffJob) -> AnalysisCompleteCallback {
    let context = job
        .user_information
        .as_deref()
        .unwrap_or("no additional user information");

    let summary = format!(
        "AI-generated summary for report {} (identifier: {}, jurisdiction: {}). \
         Key issues identified: multiple late payments and a misreported account \
         closure. Context considered: {}.",
        job.report_id, job.identifier, job.jurisdiction, context
    );

    let letter1 = format!(
        "[Dispute Letter 1 for Report {} - {}]\nTo Whom It May Concern,\n\
         I am writing to dispute the late payment reported on Account XYZ dated \
         2023-01-15 for identifier {}. The payment was made on time and the \
         entry should be corrected.",
        job.report_id, job.jurisdiction, job.identifier
    );
    let letter2 = format!(
        "[Dispute Letter 2 for Report {} - {}]\nDear Credit Bureau,\n\
         Please investigate item ABC (Account Number: {}-002) on my report. \
         This account is reported inaccurately and should be rectified.",
        job.report_id, job.jurisdiction, job.identifier
    );

    AnalysisCompleteCallback {
        report_id: job.report_id.clone(),
        user_id: job.user_id.clone(),
        status: CallbackStatus::Success,
        summary: Some(summary),
        dispute_letters: Some(vec![
            LetterPayload {
                letter_id: Uuid::new_v4().to_string(),
                content: letter1,
            },
            LetterPayload {
                letter_id: Uuid::new_v4().to_string(),
                content: letter2,
            },
        ]),
        recommendations: None,
        error: None,
        timestamp: Some(Utc::now()),
    }
}

/// Durably record a delivery failure on the report
async fn record_failure(ctx: &WorkerContext, job: &HandoffJob, status: ReportStatus, detail: String) {
    error!(
        report_id = %job.report_id,
        status = %status,
        detail = %detail,
        "Handoff job failed; recording failure status"
    );

    let merge = ReportMerge {
        external_error: Some(detail),
        ..Default::default()
    };
    match reports::apply_transition(&ctx.pool, &job.report_id, status, merge).await {
        Ok(TransitionOutcome::Applied(applied)) => {
            ctx.event_bus.publish(GatewayEvent::ReportStatusChanged {
                report_id: job.report_id.clone(),
                status: applied.as_str().to_string(),
                timestamp: Utc::now(),
            });
        }
        Ok(outcome) => {
            warn!(
                report_id = %job.report_id,
                ?outcome,
                "Handoff failure status not applied"
            );
        }
        Err(e) => {
            // Nothing left to try; the failure is at least in the log
            error!(
                report_id = %job.report_id,
                error = %e,
                "Failed to record handoff failure status"
            );
        }
    }
}
