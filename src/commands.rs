//! Queue, history, validation and status commands. None of them call the model.
//!
//! Each handler returns the text to print.

use quill_core::{
    config::{Config, ValidationConfig},
    error::QuillError,
    model::{QueueStatus, TemplateCategory},
    slug::slug_from_url,
};
use quill_sources::{SourceLoader, TemplateStore};
use quill_store::{ArticleWriter, Store};
use quill_validate::{format_report, validate};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Re-validate a persisted article against freshly loaded source data.
///
/// Accepts a slug or the page URL. The new report replaces the persisted one.
/// Without a configured freshness cutoff, the cutoff recorded in the persisted
/// report is reused, so the result does not drift across a year boundary;
/// `fallback_cutoff` applies only when neither exists.
pub async fn validate_article(
    loader: &SourceLoader,
    writer: &ArticleWriter,
    validation: &ValidationConfig,
    slug_or_url: &str,
    fallback_cutoff: i32,
) -> Result<String, QuillError> {
    let slug = slug_from_url(slug_or_url.trim());
    let article = writer.read_article(&slug)?;
    let previous = match writer.read_report(&slug) {
        Ok(previous) => previous,
        Err(e) => {
            warn!("{slug}: ignoring unreadable report: {e}");
            None
        }
    };
    let record = loader.load(&article.page_url, false).await?;

    let mut validation = validation.clone();
    if validation.stale_before_year.is_none() {
        validation.stale_before_year = Some(
            previous
                .as_ref()
                .and_then(|p| p.stale_before_year)
                .unwrap_or(fallback_cutoff),
        );
    }
    let report = validate(&article, &record, &validation);

    let mut out = format_report(&report);
    if previous.is_some_and(|p| p != report) {
        out.push_str("\n\nReport differs from the persisted one (source data or thresholds changed).");
    }
    let path = writer.write_report(&slug, &report)?;
    out.push_str(&format!("\n\nReport saved to {}", path.display()));
    Ok(out)
}

pub async fn queue_add(store: &Store, url: &str, draft: Option<&str>) -> Result<String, QuillError> {
    let slug = slug_from_url(url.trim());
    Ok(if store.enqueue(url, draft).await? {
        format!("Queued {slug}")
    } else {
        format!("{slug} is already queued")
    })
}

pub async fn queue_import(store: &Store, path: &Path) -> Result<String, QuillError> {
    let summary = store.import_csv(path).await?;
    Ok(format!(
        "Imported {}: {} added, {} already queued, {} invalid",
        path.display(),
        summary.added,
        summary.duplicates,
        summary.invalid
    ))
}

pub async fn queue_list(store: &Store) -> Result<String, QuillError> {
    let entries = store.read_full_queue().await?;
    if entries.is_empty() {
        return Ok("Queue is empty.".to_string());
    }
    let mut lines = Vec::with_capacity(entries.len() + 2);
    for entry in &entries {
        let mut line = format!(
            "  {:<10} {:<36} attempts={}",
            entry.status.as_str(),
            entry.slug,
            entry.attempts
        );
        if let Some(err) = &entry.last_error {
            line.push_str(&format!("  last error: {err}"));
        }
        lines.push(line);
    }
    lines.push(String::new());
    lines.push(count_line(entries.iter().map(|e| e.status)));
    Ok(lines.join("\n"))
}

fn count_line(statuses: impl Iterator<Item = QueueStatus>) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for status in statuses {
        *counts.entry(status.as_str()).or_default() += 1;
    }
    [QueueStatus::Pending, QueueStatus::Processing, QueueStatus::Done]
        .iter()
        .map(|s| format!("{} {}", counts.get(s.as_str()).copied().unwrap_or(0), s))
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn history(store: &Store, limit: usize) -> Result<String, QuillError> {
    let runs = store.recent_runs(limit).await?;
    if runs.is_empty() {
        return Ok("No runs recorded yet.".to_string());
    }
    let lines: Vec<String> = runs
        .iter()
        .map(|r| {
            let coverage = r
                .term_coverage
                .map(|c| format!("{:.0}%", c * 100.0))
                .unwrap_or_else(|| "n/a".to_string());
            format!(
                "  {}  {:<16} {:>5} words  grade {:<2}  SEO {:>4}  {} issues, {} warnings  {}",
                r.timestamp.format("%Y-%m-%d %H:%M"),
                r.subject,
                r.word_count,
                r.grade,
                coverage,
                r.issues,
                r.warnings,
                r.output_file
            )
        })
        .collect();
    Ok(lines.join("\n"))
}

/// Configuration and data availability check.
pub async fn status(config: &Config, config_path: &str) -> Result<String, QuillError> {
    let mut out = vec![
        "Quill status".to_string(),
        String::new(),
        format!("Config: {config_path}"),
        format!(
            "Provider: {}",
            if config.provider.api_key.trim().is_empty() {
                "missing api_key"
            } else {
                "configured"
            }
        ),
        format!(
            "  models: writer={} selector={} researcher={}",
            config.provider.writer_model,
            config.provider.selector_model,
            config.provider.researcher_model
        ),
        format!(
            "Research: {}",
            if config.research.enabled {
                format!("enabled (max {} searches)", config.research.max_uses)
            } else {
                "disabled".to_string()
            }
        ),
        format!(
            "Search Console: {}",
            if config.search_console.access_token.is_empty() {
                "cached data only"
            } else {
                "live"
            }
        ),
        String::new(),
    ];

    let templates = TemplateStore::new(
        config.quill.templates_dir(),
        config.generation.placeholder.clone(),
    );
    for category in TemplateCategory::ALL {
        let line = match templates.load(category) {
            Ok(rows) => format!("  {}: {} templates", category.as_str(), rows.len()),
            Err(e) => format!("  {}: {e}", category.as_str()),
        };
        out.push(line);
    }
    out.push(format!(
        "  SEO term files: {}",
        count_files(&config.quill.seo_terms_dir())
    ));
    out.push(format!(
        "  search console caches: {}",
        count_files(&config.quill.search_console_dir())
    ));
    out.push(format!(
        "  case studies: {}",
        if config.quill.case_studies_dir().join("case_studies.json").exists() {
            "cached"
        } else {
            "missing"
        }
    ));

    out.push(String::new());
    match Store::open(&config.store).await {
        Ok(store) => {
            let entries = store.read_full_queue().await?;
            out.push(format!(
                "Queue: {}",
                count_line(entries.iter().map(|e| e.status))
            ));
        }
        Err(e) => out.push(format!("Queue: {e}")),
    }
    out.push(format!(
        "Articles: {} in {}",
        count_files_with_suffix(&config.quill.output_path(), ".html"),
        config.quill.output_path().display()
    ));
    Ok(out.join("\n"))
}

fn count_files(dir: &Path) -> usize {
    count_files_with_suffix(dir, "")
}

fn count_files_with_suffix(dir: &Path, suffix: &str) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().is_file())
                .filter(|e| e.file_name().to_string_lossy().ends_with(suffix))
                .count()
        })
        .unwrap_or(0)
}
