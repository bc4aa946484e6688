//! Data models for credo-gw (credit-dispute gateway)
//!
//! Reports progress through a status lattice ordered by processing phase:
//! initiated → ingestion → analysis/terminal. Callbacks may only move a
//! report forward through the lattice (or re-apply the same phase), never
//! backward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Legal jurisdiction a report is processed under. Immutable after creation.
///
/// Only these two variants exist; any other value is rejected at the API
/// boundary and never reaches strategy lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Jurisdiction {
    US,
    UK,
}

impl Jurisdiction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Jurisdiction::US => "US",
            Jurisdiction::UK => "UK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "US" => Some(Jurisdiction::US),
            "UK" => Some(Jurisdiction::UK),
            _ => None,
        }
    }
}

impl Default for Jurisdiction {
    fn default() -> Self {
        Jurisdiction::US
    }
}

impl std::fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution path chosen for a report. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingChannel {
    /// Synchronous in-process pipeline; results returned directly, never
    /// persisted
    Internal,
    /// Delegated to the (simulated) remote service; tracked via the store
    External,
}

impl ProcessingChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingChannel::Internal => "internal",
            ProcessingChannel::External => "external",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "internal" => Some(ProcessingChannel::Internal),
            "external" => Some(ProcessingChannel::External),
            _ => None,
        }
    }
}

impl Default for ProcessingChannel {
    fn default() -> Self {
        ProcessingChannel::Internal
    }
}

impl std::fmt::Display for ProcessingChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted report status vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    /// Gateway handed the report off and is waiting for callbacks
    ProcessingExternalInitiated,

    /// Ingestion-stage callback outcomes
    SuccessExternalIngestionComplete,
    PartialExternalIngestion,
    FailureExternalIngestion,

    /// Analysis-stage callback outcomes
    SuccessExternalAnalysisComplete,
    FailureExternalAnalysisFailed,

    /// Handoff self-reported delivery failures (terminal)
    FailureExternalCallbackUrlMissing,
    FailureExternalCallbackFailed,
    FailureExternalCallbackException,

    /// Handoff job exceeded its overall deadline (terminal)
    FailureExternalTimedOut,
}

impl ReportStatus {
    /// Processing phase rank: initiated = 0, ingestion = 1,
    /// analysis/terminal = 2. Updates are applied only when the incoming
    /// rank is >= the stored rank; equal rank keeps identical-payload
    /// replays idempotent.
    pub fn phase_rank(&self) -> u8 {
        match self {
            ReportStatus::ProcessingExternalInitiated => 0,
            ReportStatus::SuccessExternalIngestionComplete
            | ReportStatus::PartialExternalIngestion
            | ReportStatus::FailureExternalIngestion => 1,
            ReportStatus::SuccessExternalAnalysisComplete
            | ReportStatus::FailureExternalAnalysisFailed
            | ReportStatus::FailureExternalCallbackUrlMissing
            | ReportStatus::FailureExternalCallbackFailed
            | ReportStatus::FailureExternalCallbackException
            | ReportStatus::FailureExternalTimedOut => 2,
        }
    }

    /// Whether a transition from `self` to `next` moves forward (or stays)
    /// in the lattice
    pub fn allows(&self, next: ReportStatus) -> bool {
        next.phase_rank() >= self.phase_rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::ProcessingExternalInitiated => "PROCESSING_EXTERNAL_INITIATED",
            ReportStatus::SuccessExternalIngestionComplete => "SUCCESS_EXTERNAL_INGESTION_COMPLETE",
            ReportStatus::PartialExternalIngestion => "PARTIAL_EXTERNAL_INGESTION",
            ReportStatus::FailureExternalIngestion => "FAILURE_EXTERNAL_INGESTION",
            ReportStatus::SuccessExternalAnalysisComplete => "SUCCESS_EXTERNAL_ANALYSIS_COMPLETE",
            ReportStatus::FailureExternalAnalysisFailed => "FAILURE_EXTERNAL_ANALYSIS_FAILED",
            ReportStatus::FailureExternalCallbackUrlMissing => {
                "FAILURE_EXTERNAL_CALLBACK_URL_MISSING"
            }
            ReportStatus::FailureExternalCallbackFailed => "FAILURE_EXTERNAL_CALLBACK_FAILED",
            ReportStatus::FailureExternalCallbackException => "FAILURE_EXTERNAL_CALLBACK_EXCEPTION",
            ReportStatus::FailureExternalTimedOut => "FAILURE_EXTERNAL_TIMED_OUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PROCESSING_EXTERNAL_INITIATED" => Some(ReportStatus::ProcessingExternalInitiated),
            "SUCCESS_EXTERNAL_INGESTION_COMPLETE" => {
                Some(ReportStatus::SuccessExternalIngestionComplete)
            }
            "PARTIAL_EXTERNAL_INGESTION" => Some(ReportStatus::PartialExternalIngestion),
            "FAILURE_EXTERNAL_INGESTION" => Some(ReportStatus::FailureExternalIngestion),
            "SUCCESS_EXTERNAL_ANALYSIS_COMPLETE" => {
                Some(ReportStatus::SuccessExternalAnalysisComplete)
            }
            "FAILURE_EXTERNAL_ANALYSIS_FAILED" => Some(ReportStatus::FailureExternalAnalysisFailed),
            "FAILURE_EXTERNAL_CALLBACK_URL_MISSING" => {
                Some(ReportStatus::FailureExternalCallbackUrlMissing)
            }
            "FAILURE_EXTERNAL_CALLBACK_FAILED" => Some(ReportStatus::FailureExternalCallbackFailed),
            "FAILURE_EXTERNAL_CALLBACK_EXCEPTION" => {
                Some(ReportStatus::FailureExternalCallbackException)
            }
            "FAILURE_EXTERNAL_TIMED_OUT" => Some(ReportStatus::FailureExternalTimedOut),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of credit-report analysis work and its accumulated state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub report_id: String,
    /// Caller-supplied subject identifier (opaque)
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub status: ReportStatus,
    pub processing_channel: ProcessingChannel,
    pub jurisdiction: Jurisdiction,
    pub requested_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,

    // Populated by the analysis-complete callback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub analysis_recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_timestamp: Option<DateTime<Utc>>,

    // Populated by the report-processed (ingestion) callback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingestion_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingestion_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingestion_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_data_url: Option<String>,

    // Populated by the handoff worker on delivery failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_error: Option<String>,

    /// Optimistic concurrency token, incremented on every write
    pub version: i64,
}

impl Report {
    /// Create a report record for a freshly initiated external handoff
    pub fn new_external(
        identifier: String,
        user_id: Option<String>,
        jurisdiction: Jurisdiction,
    ) -> Self {
        let now = Utc::now();
        Self {
            report_id: Uuid::new_v4().to_string(),
            identifier,
            user_id,
            status: ReportStatus::ProcessingExternalInitiated,
            processing_channel: ProcessingChannel::External,
            jurisdiction,
            requested_at: now,
            last_updated_at: now,
            analysis_summary: None,
            analysis_recommendations: Vec::new(),
            analysis_error: None,
            analysis_timestamp: None,
            ingestion_message: None,
            ingestion_error: None,
            ingestion_timestamp: None,
            structured_data_url: None,
            external_error: None,
            version: 0,
        }
    }
}

/// One generated remediation letter tied to a Report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeLetter {
    pub letter_id: String,
    /// Non-owning back-reference to the report
    pub report_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub content: String,
    /// Free-form status, advanced only by the dispute-status-update callback
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference_id: Option<String>,
    /// Which path produced this letter (e.g. "external")
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
