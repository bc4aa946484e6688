//! Dispute letter database operations

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use credo_common::{Error, Result};

use crate::models::DisputeLetter;

/// Upsert a dispute letter keyed by letter_id.
///
/// Replaying a callback with the same letter ids rewrites the same rows
/// instead of duplicating them.
pub async fn upsert_letter(pool: &SqlitePool, letter: &DisputeLetter) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO dispute_letters (
            letter_id, report_id, user_id, content, status, details,
            external_reference_id, source, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(letter_id) DO UPDATE SET
            report_id = excluded.report_id,
            user_id = COALESCE(excluded.user_id, user_id),
            content = excluded.content,
            status = excluded.status,
            source = excluded.source,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&letter.letter_id)
    .bind(&letter.report_id)
    .bind(&letter.user_id)
    .bind(&letter.content)
    .bind(&letter.status)
    .bind(&letter.details)
    .bind(&letter.external_reference_id)
    .bind(&letter.source)
    .bind(letter.created_at.to_rfc3339())
    .bind(letter.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Update a letter's status and optional detail fields.
///
/// Returns false when no letter with this id exists (the caller decides
/// whether that is an error; the status-update callback is lenient).
pub async fn update_status(
    pool: &SqlitePool,
    letter_id: &str,
    new_status: &str,
    details: Option<&str>,
    external_reference_id: Option<&str>,
    updated_at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE dispute_letters SET
            status = ?,
            details = COALESCE(?, details),
            external_reference_id = COALESCE(?, external_reference_id),
            updated_at = ?
        WHERE letter_id = ?
        "#,
    )
    .bind(new_status)
    .bind(details)
    .bind(external_reference_id)
    .bind(updated_at.to_rfc3339())
    .bind(letter_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Load a dispute letter by id
pub async fn get_letter(pool: &SqlitePool, letter_id: &str) -> Result<Option<DisputeLetter>> {
    let row = sqlx::query(
        r#"
        SELECT letter_id, report_id, user_id, content, status, details,
               external_reference_id, source, created_at, updated_at
        FROM dispute_letters
        WHERE letter_id = ?
        "#,
    )
    .bind(letter_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(row_to_letter(&row)?)),
        None => Ok(None),
    }
}

/// List all letters attached to a report, oldest first
pub async fn list_for_report(pool: &SqlitePool, report_id: &str) -> Result<Vec<DisputeLetter>> {
    let rows = sqlx::query(
        r#"
        SELECT letter_id, report_id, user_id, content, status, details,
               external_reference_id, source, created_at, updated_at
        FROM dispute_letters
        WHERE report_id = ?
        ORDER BY created_at, letter_id
        "#,
    )
    .bind(report_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_letter).collect()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp '{}': {}", s, e)))
}

fn row_to_letter(row: &sqlx::sqlite::SqliteRow) -> Result<DisputeLetter> {
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(DisputeLetter {
        letter_id: row.get("letter_id"),
        report_id: row.get("report_id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        status: row.get("status"),
        details: row.get("details"),
        external_reference_id: row.get("external_reference_id"),
        source: row.get("source"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}
