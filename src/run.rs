//! Batch runner: drains the work queue through the pipeline, validates,
//! persists, and summarises.

use crate::pipeline::Pipeline;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use quill_core::{
    config::ValidationConfig,
    error::QuillError,
    model::{Article, QueueEntry, QueueStatus, RunRecord},
    slug::{slug_base, subject_from_slug},
};
use quill_sources::SourceLoader;
use quill_store::{ArticleWriter, Store};
use quill_validate::{ensure_html, format_report, validate, ValidationReport};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Selection and behaviour of one `generate` run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub limit: Option<usize>,
    /// Exact slug bases (`python`, `vue-js`).
    pub tech: Vec<String>,
    /// Substring of the page URL.
    pub page: Option<String>,
    pub no_cache: bool,
    pub dry_run: bool,
    pub jobs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Succeeded,
    Skipped,
    Failed,
}

/// What happened to one subject.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectOutcome {
    pub slug: String,
    pub subject: String,
    pub url: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_coverage: Option<f64>,
    pub issues: usize,
    pub warnings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_path: Option<String>,
}

impl SubjectOutcome {
    fn new(entry: &QueueEntry, status: OutcomeStatus, reason: Option<String>) -> Self {
        Self {
            slug: entry.slug.clone(),
            subject: subject_from_slug(&entry.slug),
            url: entry.url.clone(),
            status,
            reason,
            grade: None,
            word_count: None,
            term_coverage: None,
            issues: 0,
            warnings: 0,
            article_path: None,
        }
    }

    fn skipped(entry: &QueueEntry, reason: impl Into<String>) -> Self {
        Self::new(entry, OutcomeStatus::Skipped, Some(reason.into()))
    }

    fn failed(entry: &QueueEntry, reason: impl Into<String>) -> Self {
        Self::new(entry, OutcomeStatus::Failed, Some(reason.into()))
    }
}

/// Aggregate of one run, written to `_summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub succeeded: Vec<SubjectOutcome>,
    pub skipped: Vec<SubjectOutcome>,
    pub failed: Vec<SubjectOutcome>,
}

impl RunSummary {
    fn new(started_at: DateTime<Utc>, dry_run: bool, outcomes: Vec<SubjectOutcome>) -> Self {
        let mut summary = Self {
            started_at,
            finished_at: Utc::now(),
            dry_run,
            succeeded: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        };
        for outcome in outcomes {
            match outcome.status {
                OutcomeStatus::Succeeded => summary.succeeded.push(outcome),
                OutcomeStatus::Skipped => summary.skipped.push(outcome),
                OutcomeStatus::Failed => summary.failed.push(outcome),
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }
}

/// Everything a run needs, built once from configuration.
pub struct Runner {
    pub store: Store,
    pub loader: SourceLoader,
    pub pipeline: Pipeline,
    pub writer: ArticleWriter,
    pub validation: ValidationConfig,
    pub skip_done: bool,
}

impl Runner {
    /// Process the selected queue entries.
    ///
    /// Subject failures are recorded in the summary; only configuration
    /// errors abort the batch.
    pub async fn run(&self, opts: &RunOptions) -> Result<RunSummary, QuillError> {
        let started_at = Utc::now();
        let entries = self.select(opts).await?;
        if entries.is_empty() {
            return Ok(RunSummary::new(started_at, opts.dry_run, Vec::new()));
        }
        info!(
            "processing {} subject(s) with {} job(s){}",
            entries.len(),
            opts.jobs.max(1),
            if opts.dry_run { " (dry run)" } else { "" }
        );

        let total = entries.len();
        let mut results: Vec<(usize, Result<SubjectOutcome, QuillError>)> =
            stream::iter(entries.iter().enumerate())
                .map(|(i, entry)| async move {
                    info!("[{}/{total}] {}", i + 1, entry.slug);
                    (i, self.process(entry, opts).await)
                })
                .buffer_unordered(opts.jobs.max(1))
                .collect()
                .await;
        results.sort_by_key(|(i, _)| *i);

        let mut outcomes = Vec::with_capacity(results.len());
        for (_, result) in results {
            outcomes.push(result?);
        }
        let summary = RunSummary::new(started_at, opts.dry_run, outcomes);
        self.writer.write_summary(&summary)?;
        Ok(summary)
    }

    /// Pending entries matching the filters, oldest first.
    async fn select(&self, opts: &RunOptions) -> Result<Vec<QueueEntry>, QuillError> {
        let mut entries = self.store.read_queue().await?;

        if !opts.tech.is_empty() {
            let wanted: BTreeSet<String> =
                opts.tech.iter().map(|t| t.trim().to_lowercase()).collect();
            entries.retain(|e| wanted.contains(slug_base(&e.slug)));
            if entries.is_empty() {
                entries = self.regenerate_done(&wanted, opts).await?;
            }
        }
        if let Some(page) = &opts.page {
            entries.retain(|e| e.url.contains(page.as_str()));
        }
        if let Some(limit) = opts.limit.filter(|l| *l > 0) {
            entries.truncate(limit);
        }
        if entries.is_empty() {
            println!("No pending pages to process.");
        }
        Ok(entries)
    }

    /// Requested subjects that are already done: requeued only with `--no-cache`.
    async fn regenerate_done(
        &self,
        wanted: &BTreeSet<String>,
        opts: &RunOptions,
    ) -> Result<Vec<QueueEntry>, QuillError> {
        let done: Vec<QueueEntry> = self
            .store
            .read_full_queue()
            .await?
            .into_iter()
            .filter(|e| e.status == QueueStatus::Done && wanted.contains(slug_base(&e.slug)))
            .collect();
        if done.is_empty() {
            return Ok(Vec::new());
        }

        let names: Vec<&str> = done.iter().map(|e| slug_base(&e.slug)).collect();
        if !opts.no_cache || opts.dry_run {
            println!(
                "{} already generated. Use --no-cache to regenerate.",
                names.join(", ")
            );
            return Ok(Vec::new());
        }

        for entry in &done {
            self.store.requeue(&entry.slug).await?;
        }
        println!("Regenerating {} article(s) (--no-cache)", done.len());
        let slugs: BTreeSet<&str> = done.iter().map(|e| e.slug.as_str()).collect();
        let mut entries = self.store.read_queue().await?;
        entries.retain(|e| slugs.contains(e.slug.as_str()));
        Ok(entries)
    }

    /// One subject through the whole pipeline. `Err` only for batch-fatal errors.
    async fn process(
        &self,
        entry: &QueueEntry,
        opts: &RunOptions,
    ) -> Result<SubjectOutcome, QuillError> {
        let slug = entry.slug.as_str();

        if opts.dry_run {
            return Ok(self.dry_run(entry).await);
        }
        if self.skip_done && !opts.no_cache && self.writer.exists(slug) {
            info!("{slug}: article already exists, skipping");
            return Ok(SubjectOutcome::skipped(entry, "article already exists"));
        }
        if let Err(e) = self.store.update_status(slug, QueueStatus::Processing).await {
            warn!("{slug}: could not claim queue entry: {e}");
            return Ok(SubjectOutcome::skipped(entry, e.to_string()));
        }

        match self.generate(entry, opts).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_fatal() => {
                self.release(slug, &e).await;
                Err(e)
            }
            Err(e) => {
                error!("{slug}: {e}");
                self.release(slug, &e).await;
                Ok(match e {
                    QuillError::DataLoad(_) | QuillError::TemplateLoad(_) => {
                        SubjectOutcome::skipped(entry, e.to_string())
                    }
                    _ => SubjectOutcome::failed(entry, e.to_string()),
                })
            }
        }
    }

    async fn generate(
        &self,
        entry: &QueueEntry,
        opts: &RunOptions,
    ) -> Result<SubjectOutcome, QuillError> {
        let slug = entry.slug.as_str();
        let record = self.loader.load(&entry.url, opts.no_cache).await?;
        let generated = self.pipeline.run(&record).await?;

        let article = Article {
            body: ensure_html(&generated.body),
            ..generated
        };
        let report = validate(&article, &record, &self.validation);
        println!("\n{}", format_report(&report));

        let article_path = self.writer.write_article(&article)?;
        self.writer.write_report(slug, &report)?;
        let output_file = article_path.display().to_string();

        self.store.update_status(slug, QueueStatus::Done).await?;
        self.store
            .append_run_record(&run_record(entry, &report, &output_file))
            .await?;
        info!(
            "{slug}: grade {} ({} issues, {} warnings) -> {output_file}",
            report.grade,
            report.issues.len(),
            report.warnings.len()
        );

        Ok(SubjectOutcome {
            grade: Some(report.grade.clone()),
            word_count: Some(report.metrics.word_count),
            term_coverage: report.metrics.term_coverage,
            issues: report.issues.len(),
            warnings: report.warnings.len(),
            article_path: Some(output_file),
            ..SubjectOutcome::new(entry, OutcomeStatus::Succeeded, None)
        })
    }

    /// Load sources and assemble prompts without generating or claiming.
    async fn dry_run(&self, entry: &QueueEntry) -> SubjectOutcome {
        match self.loader.load(&entry.url, false).await {
            Ok(record) => {
                let preview = self.pipeline.preview(&record);
                let detail = format!(
                    "dry run: {} keywords, {} headers, {} questions, {} queries, {} SEO terms, \
                     {} case studies; prompts {} + {} chars",
                    record.templates.keywords.len(),
                    record.templates.headers.len(),
                    record.templates.questions.len(),
                    record.queries.len(),
                    record.seo_terms.len(),
                    record.case_studies.len(),
                    preview.system_prompt_chars,
                    preview.user_prompt_chars
                );
                info!("{}: {detail}", entry.slug);
                SubjectOutcome::new(entry, OutcomeStatus::Succeeded, Some(detail))
            }
            Err(e) => {
                warn!("{}: {e}", entry.slug);
                SubjectOutcome::skipped(entry, e.to_string())
            }
        }
    }

    /// Return a claimed entry to pending.
    async fn release(&self, slug: &str, err: &QuillError) {
        if let Err(e) = self.store.record_failure(slug, &err.to_string()).await {
            warn!("{slug}: failed to release queue entry: {e}");
        }
    }
}

fn run_record(entry: &QueueEntry, report: &ValidationReport, output_file: &str) -> RunRecord {
    RunRecord {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        subject: report.subject.clone(),
        url: entry.url.clone(),
        word_count: report.metrics.word_count,
        grade: report.grade.clone(),
        term_coverage: report.metrics.term_coverage,
        issues: report.issues.len(),
        warnings: report.warnings.len(),
        output_file: output_file.to_string(),
    }
}

/// Print the run summary for the terminal.
pub fn print_summary(summary: &RunSummary) {
    println!("\n{}", "=".repeat(60));
    println!("SUMMARY");
    println!("{}", "=".repeat(60));
    for outcome in &summary.succeeded {
        match (&outcome.grade, &outcome.reason) {
            (Some(grade), _) => {
                let status = if outcome.issues == 0 {
                    "ok".to_string()
                } else {
                    format!("{} issues", outcome.issues)
                };
                println!(
                    "  {}: {} words, grade {grade} {status}",
                    outcome.subject,
                    outcome.word_count.unwrap_or_default()
                );
            }
            (None, Some(detail)) => println!("  {}: {detail}", outcome.subject),
            (None, None) => println!("  {}: ok", outcome.subject),
        }
    }
    for outcome in &summary.skipped {
        println!(
            "  {}: skipped ({})",
            outcome.subject,
            outcome.reason.as_deref().unwrap_or("no reason")
        );
    }
    for outcome in &summary.failed {
        println!(
            "  {}: FAILED ({})",
            outcome.subject,
            outcome.reason.as_deref().unwrap_or("no reason")
        );
    }
    println!(
        "\n{} succeeded, {} skipped, {} failed",
        summary.succeeded.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
}
