//! SQLite-backed work queue and run history.
//!
//! Split into focused submodules:
//! - `queue`: queue entries and their status transitions
//! - `history`: per-article run records

mod history;
mod queue;

pub use queue::ImportSummary;

use async_trait::async_trait;
use quill_core::{
    config::StoreConfig,
    error::QuillError,
    model::{QueueEntry, QueueStatus, RunRecord},
    shellexpand,
    traits::WorkQueue,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Queue and history store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the database, running migrations on first use.
    pub async fn open(config: &StoreConfig) -> Result<Self, QuillError> {
        let db_path = shellexpand(&config.db_path);

        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| QuillError::Store(format!("failed to create data dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| QuillError::Store(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| QuillError::Store(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("store initialized at {db_path}");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), QuillError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| QuillError::Store(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] = &[
            ("001_queue", include_str!("../../migrations/001_queue.sql")),
            (
                "002_run_history",
                include_str!("../../migrations/002_run_history.sql"),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        QuillError::Store(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| QuillError::Store(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    QuillError::Store(format!("failed to record migration {name}: {e}"))
                })?;
        }
        Ok(())
    }
}

#[async_trait]
impl WorkQueue for Store {
    async fn read_queue(&self) -> Result<Vec<QueueEntry>, QuillError> {
        Store::read_queue(self).await
    }

    async fn update_status(&self, slug: &str, status: QueueStatus) -> Result<(), QuillError> {
        Store::update_status(self, slug, status).await
    }

    async fn append_run_record(&self, record: &RunRecord) -> Result<(), QuillError> {
        Store::append_run_record(self, record).await
    }
}
