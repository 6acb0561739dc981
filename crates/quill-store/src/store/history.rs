//! Run history: one record per generated article.

use super::Store;
use chrono::{DateTime, SecondsFormat, Utc};
use quill_core::{error::QuillError, model::RunRecord};
use uuid::Uuid;

type HistoryRow = (String, String, String, String, i64, String, Option<f64>, i64, i64, String);

fn to_record(row: HistoryRow) -> Result<RunRecord, QuillError> {
    let (id, timestamp, subject, url, word_count, grade, term_coverage, issues, warnings, output_file) =
        row;
    Ok(RunRecord {
        id: Uuid::parse_str(&id).map_err(|e| QuillError::Store(format!("bad run id {id}: {e}")))?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| QuillError::Store(format!("bad run timestamp {timestamp}: {e}")))?
            .with_timezone(&Utc),
        subject,
        url,
        word_count: usize::try_from(word_count).unwrap_or(0),
        grade,
        term_coverage,
        issues: usize::try_from(issues).unwrap_or(0),
        warnings: usize::try_from(warnings).unwrap_or(0),
        output_file,
    })
}

impl Store {
    /// Timestamps are stored as fixed-width RFC 3339 so they sort as text.
    pub async fn append_run_record(&self, record: &RunRecord) -> Result<(), QuillError> {
        sqlx::query(
            "INSERT INTO run_history \
             (id, timestamp, subject, url, word_count, grade, term_coverage, issues, warnings, output_file) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(&record.subject)
        .bind(&record.url)
        .bind(record.word_count as i64)
        .bind(&record.grade)
        .bind(record.term_coverage)
        .bind(record.issues as i64)
        .bind(record.warnings as i64)
        .bind(&record.output_file)
        .execute(&self.pool)
        .await
        .map_err(|e| QuillError::Store(format!("append run record failed: {e}")))?;
        Ok(())
    }

    /// Most recent runs first.
    pub async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, QuillError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT id, timestamp, subject, url, word_count, grade, term_coverage, issues, warnings, output_file \
             FROM run_history ORDER BY timestamp DESC, rowid DESC LIMIT ?",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| QuillError::Store(format!("read run history failed: {e}")))?;
        rows.into_iter().map(to_record).collect()
    }
}
