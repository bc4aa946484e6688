//! Report database operations
//!
//! Status-bearing updates go through `apply_transition`, which enforces the
//! monotonic status lattice and uses the version column as an optimistic
//! concurrency token (compare-and-swap with a bounded retry).

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::warn;

use credo_common::{Error, Result};

use crate::models::{Jurisdiction, ProcessingChannel, Report, ReportStatus};

/// How many times a lost CAS race is retried against fresh state
const TRANSITION_ATTEMPTS: u32 = 3;

/// Outcome of a guarded status transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Update applied; returns the new status
    Applied(ReportStatus),
    /// Incoming status is behind the stored phase; nothing written
    Stale {
        current: ReportStatus,
        incoming: ReportStatus,
    },
    /// No report with this id exists
    NotFound,
}

/// Fields merged into a report by a callback or handoff failure.
/// `None` leaves the stored value untouched (per-field merge semantics).
#[derive(Debug, Clone, Default)]
pub struct ReportMerge {
    pub user_id: Option<String>,
    pub analysis_summary: Option<String>,
    pub analysis_recommendations: Option<Vec<String>>,
    pub analysis_error: Option<String>,
    pub analysis_timestamp: Option<DateTime<Utc>>,
    pub ingestion_message: Option<String>,
    pub ingestion_error: Option<String>,
    pub ingestion_timestamp: Option<DateTime<Utc>>,
    pub structured_data_url: Option<String>,
    pub external_error: Option<String>,
}

/// Persist a freshly initiated external report
pub async fn save_initiated(pool: &SqlitePool, report: &Report) -> Result<()> {
    let recommendations = serde_json::to_string(&report.analysis_recommendations)
        .map_err(|e| Error::Internal(format!("Failed to serialize recommendations: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO reports (
            report_id, identifier, user_id, status, processing_channel,
            jurisdiction, requested_at, last_updated_at,
            analysis_recommendations, version
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(report_id) DO UPDATE SET
            identifier = excluded.identifier,
            user_id = COALESCE(excluded.user_id, user_id),
            status = excluded.status,
            last_updated_at = excluded.last_updated_at,
            version = version + 1
        "#,
    )
    .bind(&report.report_id)
    .bind(&report.identifier)
    .bind(&report.user_id)
    .bind(report.status.as_str())
    .bind(report.processing_channel.as_str())
    .bind(report.jurisdiction.as_str())
    .bind(report.requested_at.to_rfc3339())
    .bind(report.last_updated_at.to_rfc3339())
    .bind(&recommendations)
    .bind(report.version)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a report by id
pub async fn get_report(pool: &SqlitePool, report_id: &str) -> Result<Option<Report>> {
    let row = sqlx::query(
        r#"
        SELECT report_id, identifier, user_id, status, processing_channel,
               jurisdiction, requested_at, last_updated_at,
               analysis_summary, analysis_recommendations, analysis_error,
               analysis_timestamp, ingestion_message, ingestion_error,
               ingestion_timestamp, structured_data_url, external_error,
               version
        FROM reports
        WHERE report_id = ?
        "#,
    )
    .bind(report_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(row_to_report(&row)?)),
        None => Ok(None),
    }
}

/// Apply a status-bearing merge to a report, guarded by the status lattice
/// and the version token.
///
/// A stale callback (incoming phase behind the stored phase) is reported,
/// not written. Concurrent writers race on the version column; a lost race
/// is retried against fresh state up to `TRANSITION_ATTEMPTS` times.
pub async fn apply_transition(
    pool: &SqlitePool,
    report_id: &str,
    new_status: ReportStatus,
    merge: ReportMerge,
) -> Result<TransitionOutcome> {
    for _ in 0..TRANSITION_ATTEMPTS {
        let row = sqlx::query("SELECT status, version FROM reports WHERE report_id = ?")
            .bind(report_id)
            .fetch_optional(pool)
            .await?;

        let Some(row) = row else {
            return Ok(TransitionOutcome::NotFound);
        };

        let status_str: String = row.get("status");
        let version: i64 = row.get("version");
        let current = parse_status(&status_str)?;

        if !current.allows(new_status) {
            warn!(
                report_id = %report_id,
                current = %current,
                incoming = %new_status,
                "Stale status transition rejected"
            );
            return Ok(TransitionOutcome::Stale {
                current,
                incoming: new_status,
            });
        }

        let recommendations = match &merge.analysis_recommendations {
            Some(list) => Some(serde_json::to_string(list).map_err(|e| {
                Error::Internal(format!("Failed to serialize recommendations: {}", e))
            })?),
            None => None,
        };

        let result = sqlx::query(
            r#"
            UPDATE reports SET
                status = ?,
                last_updated_at = ?,
                user_id = COALESCE(?, user_id),
                analysis_summary = COALESCE(?, analysis_summary),
                analysis_recommendations = COALESCE(?, analysis_recommendations),
                analysis_error = COALESCE(?, analysis_error),
                analysis_timestamp = COALESCE(?, analysis_timestamp),
                ingestion_message = COALESCE(?, ingestion_message),
                ingestion_error = COALESCE(?, ingestion_error),
                ingestion_timestamp = COALESCE(?, ingestion_timestamp),
                structured_data_url = COALESCE(?, structured_data_url),
                external_error = COALESCE(?, external_error),
                version = version + 1
            WHERE report_id = ? AND version = ?
            "#,
        )
        .bind(new_status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(&merge.user_id)
        .bind(&merge.analysis_summary)
        .bind(&recommendations)
        .bind(&merge.analysis_error)
        .bind(merge.analysis_timestamp.map(|t| t.to_rfc3339()))
        .bind(&merge.ingestion_message)
        .bind(&merge.ingestion_error)
        .bind(merge.ingestion_timestamp.map(|t| t.to_rfc3339()))
        .bind(&merge.structured_data_url)
        .bind(&merge.external_error)
        .bind(report_id)
        .bind(version)
        .execute(pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(TransitionOutcome::Applied(new_status));
        }
        // Lost the CAS race; re-read and re-check the lattice
    }

    Err(Error::Internal(format!(
        "Report {} transition contention exceeded {} attempts",
        report_id, TRANSITION_ATTEMPTS
    )))
}

fn parse_status(s: &str) -> Result<ReportStatus> {
    ReportStatus::parse(s).ok_or_else(|| Error::Internal(format!("Unknown report status: {}", s)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp '{}': {}", s, e)))
}

fn parse_optional_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(s) => Ok(Some(parse_timestamp(&s)?)),
        None => Ok(None),
    }
}

fn row_to_report(row: &sqlx::sqlite::SqliteRow) -> Result<Report> {
    let status: String = row.get("status");
    let channel: String = row.get("processing_channel");
    let jurisdiction: String = row.get("jurisdiction");
    let requested_at: String = row.get("requested_at");
    let last_updated_at: String = row.get("last_updated_at");
    let recommendations: String = row.get("analysis_recommendations");

    Ok(Report {
        report_id: row.get("report_id"),
        identifier: row.get("identifier"),
        user_id: row.get("user_id"),
        status: parse_status(&status)?,
        processing_channel: ProcessingChannel::parse(&channel)
            .ok_or_else(|| Error::Internal(format!("Unknown processing channel: {}", channel)))?,
        jurisdiction: Jurisdiction::parse(&jurisdiction)
            .ok_or_else(|| Error::Internal(format!("Unknown jurisdiction: {}", jurisdiction)))?,
        requested_at: parse_timestamp(&requested_at)?,
        last_updated_at: parse_timestamp(&last_updated_at)?,
        analysis_summary: row.get("analysis_summary"),
        analysis_recommendations: serde_json::from_str(&recommendations)
            .map_err(|e| Error::Internal(format!("Invalid stored recommendations: {}", e)))?,
        analysis_error: row.get("analysis_error"),
        analysis_timestamp: parse_optional_timestamp(row.get("analysis_timestamp"))?,
        ingestion_message: row.get("ingestion_message"),
        ingestion_error: row.get("ingestion_error"),
        ingestion_timestamp: parse_optional_timestamp(row.get("ingestion_timestamp"))?,
        structured_data_url: row.get("structured_data_url"),
        external_error: row.get("external_error"),
        version: row.get("version"),
    })
}
