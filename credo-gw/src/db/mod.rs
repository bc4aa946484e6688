//! Database access for credo-gw
//!
//! SQLite-backed document store for reports and dispute letters. All writes
//! are merge-writes: absent fields leave stored values untouched.

pub mod letters;
pub mod reports;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create gateway tables if they don't exist
///
/// Also used by tests against `sqlite::memory:` pools.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            report_id TEXT PRIMARY KEY,
            identifier TEXT NOT NULL,
            user_id TEXT,
            status TEXT NOT NULL,
            processing_channel TEXT NOT NULL,
            jurisdiction TEXT NOT NULL,
            requested_at TEXT NOT NULL,
            last_updated_at TEXT NOT NULL,
            analysis_summary TEXT,
            analysis_recommendations TEXT NOT NULL DEFAULT '[]',
            analysis_error TEXT,
            analysis_timestamp TEXT,
            ingestion_message TEXT,
            ingestion_error TEXT,
            ingestion_timestamp TEXT,
            structured_data_url TEXT,
            external_error TEXT,
            version INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dispute_letters (
            letter_id TEXT PRIMARY KEY,
            report_id TEXT NOT NULL,
            user_id TEXT,
            content TEXT NOT NULL,
            status TEXT NOT NULL,
            details TEXT,
            external_reference_id TEXT,
            source TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_dispute_letters_report ON dispute_letters(report_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
