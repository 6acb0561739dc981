//! Queue entries and compare-and-set status transitions.

use super::Store;
use quill_core::{
    error::QuillError,
    model::{QueueEntry, QueueStatus},
    slug::slug_from_url,
};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

type QueueRow = (String, String, Option<String>, String, i64, Option<String>, String);

const SELECT_ENTRY: &str =
    "SELECT slug, url, draft_url, status, attempts, last_error, updated_at FROM queue";

fn to_entry(row: QueueRow) -> Result<QueueEntry, QuillError> {
    let (slug, url, draft_url, status, attempts, last_error, updated_at) = row;
    Ok(QueueEntry {
        status: status
            .parse::<QueueStatus>()
            .map_err(|e| QuillError::Store(format!("{slug}: {e}")))?,
        slug,
        url,
        draft_url,
        attempts: u32::try_from(attempts).unwrap_or(0),
        last_error,
        updated_at,
    })
}

/// Result of a CSV import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    /// Rows whose slug was already queued.
    pub duplicates: usize,
    /// Rows without a usable URL.
    pub invalid: usize,
}

impl Store {
    /// Add a page to the queue. Returns `false` when its slug is already queued.
    pub async fn enqueue(&self, url: &str, draft_url: Option<&str>) -> Result<bool, QuillError> {
        let url = url.trim();
        let slug = slug_from_url(url);
        if slug.is_empty() {
            return Err(QuillError::Store(format!("cannot derive a slug from {url:?}")));
        }
        let result = sqlx::query("INSERT OR IGNORE INTO queue (slug, url, draft_url) VALUES (?, ?, ?)")
            .bind(&slug)
            .bind(url)
            .bind(draft_url.map(str::trim).filter(|d| !d.is_empty()))
            .execute(&self.pool)
            .await
            .map_err(|e| QuillError::Store(format!("enqueue {slug} failed: {e}")))?;
        Ok(result.rows_affected() == 1)
    }

    /// Pending entries, oldest first.
    pub async fn read_queue(&self) -> Result<Vec<QueueEntry>, QuillError> {
        let rows: Vec<QueueRow> = sqlx::query_as(&format!(
            "{SELECT_ENTRY} WHERE status = 'pending' ORDER BY created_at, rowid"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| QuillError::Store(format!("read queue failed: {e}")))?;
        rows.into_iter().map(to_entry).collect()
    }

    /// Every entry regardless of status, oldest first.
    pub async fn read_full_queue(&self) -> Result<Vec<QueueEntry>, QuillError> {
        let rows: Vec<QueueRow> =
            sqlx::query_as(&format!("{SELECT_ENTRY} ORDER BY created_at, rowid"))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| QuillError::Store(format!("read queue failed: {e}")))?;
        rows.into_iter().map(to_entry).collect()
    }

    pub async fn get_entry(&self, slug: &str) -> Result<Option<QueueEntry>, QuillError> {
        let row: Option<QueueRow> = sqlx::query_as(&format!("{SELECT_ENTRY} WHERE slug = ?"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| QuillError::Store(format!("get {slug} failed: {e}")))?;
        row.map(to_entry).transpose()
    }

    /// Move `slug` to `status`.
    ///
    /// The transition is checked and applied in one statement, so of two
    /// concurrent writers racing for the same entry exactly one succeeds.
    pub async fn update_status(&self, slug: &str, status: QueueStatus) -> Result<(), QuillError> {
        let from = status.allowed_from();
        let placeholders = vec!["?"; from.len()].join(", ");
        let sql = format!(
            "UPDATE queue SET status = ?, updated_at = datetime('now'), \
             attempts = attempts + (CASE WHEN ? = 'processing' THEN 1 ELSE 0 END) \
             WHERE slug = ? AND status IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(status.as_str())
            .bind(slug);
        for s in from {
            query = query.bind(s.as_str());
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| QuillError::Store(format!("update {slug} failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(match self.get_entry(slug).await? {
                None => QuillError::Store(format!("no queue entry for {slug}")),
                Some(entry) => QuillError::Store(format!(
                    "cannot move {slug} from {} to {status}",
                    entry.status
                )),
            });
        }
        Ok(())
    }

    /// Return a processing entry to pending with the failure reason.
    pub async fn record_failure(&self, slug: &str, reason: &str) -> Result<(), QuillError> {
        let result = sqlx::query(
            "UPDATE queue SET status = 'pending', last_error = ?, updated_at = datetime('now') \
             WHERE slug = ? AND status = 'processing'",
        )
        .bind(reason)
        .bind(slug)
        .execute(&self.pool)
        .await
        .map_err(|e| QuillError::Store(format!("record failure for {slug} failed: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(QuillError::Store(format!("{slug} is not being processed")));
        }
        warn!("{slug}: returned to queue: {reason}");
        Ok(())
    }

    /// Explicit regeneration: move a done entry back to pending.
    /// Returns `false` when the entry is not done.
    pub async fn requeue(&self, slug: &str) -> Result<bool, QuillError> {
        let result = sqlx::query(
            "UPDATE queue SET status = 'pending', last_error = NULL, updated_at = datetime('now') \
             WHERE slug = ? AND status = 'done'",
        )
        .bind(slug)
        .execute(&self.pool)
        .await
        .map_err(|e| QuillError::Store(format!("requeue {slug} failed: {e}")))?;
        Ok(result.rows_affected() == 1)
    }

    /// Import pages from a CSV with a URL column and an optional draft column.
    pub async fn import_csv(&self, path: &Path) -> Result<ImportSummary, QuillError> {
        let rows = read_pages_csv(path)?;
        let mut summary = ImportSummary::default();
        for (url, draft) in rows {
            if !url.starts_with("http") || slug_from_url(&url).is_empty() {
                summary.invalid += 1;
                continue;
            }
            if self.enqueue(&url, draft.as_deref()).await? {
                summary.added += 1;
            } else {
                summary.duplicates += 1;
            }
        }
        info!(
            "queue import from {}: {} added, {} duplicates, {} invalid",
            path.display(),
            summary.added,
            summary.duplicates,
            summary.invalid
        );
        Ok(summary)
    }
}

const URL_COLUMNS: &[&str] = &["url", "page url", "page", "landing page"];
const DRAFT_COLUMNS: &[&str] = &["draft_url", "draft", "clearscope draft", "draft url"];

/// `(url, draft)` pairs from a pages CSV. Column names are matched case-insensitively.
fn read_pages_csv(path: &Path) -> Result<Vec<(String, Option<String>)>, QuillError> {
    let err = |e: csv::Error| QuillError::DataLoad(format!("{}: {e}", path.display()));
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(err)?;
    let columns: HashMap<String, usize> = reader
        .headers()
        .map_err(err)?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let name = h.trim_start_matches('\u{feff}').trim().to_lowercase();
            (name, i)
        })
        .collect();

    let find = |names: &[&str]| names.iter().find_map(|n| columns.get(*n).copied());
    let url_col = find(URL_COLUMNS).ok_or_else(|| {
        QuillError::DataLoad(format!("{}: no URL column", path.display()))
    })?;
    let draft_col = find(DRAFT_COLUMNS);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(err)?;
        let url = record.get(url_col).unwrap_or_default().trim().to_string();
        if url.is_empty() {
            continue;
        }
        let draft = draft_col
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from);
        rows.push((url, draft));
    }
    Ok(rows)
}
