//! Article output directory: body, metadata, and validation report per slug.

use quill_core::{
    error::QuillError,
    model::{Article, ArticleMeta},
};
use quill_validate::ValidationReport;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes and reads `<slug>.html`, `<slug>.meta.json`, `<slug>.validation.json`.
#[derive(Debug, Clone)]
pub struct ArticleWriter {
    dir: PathBuf,
}

impl ArticleWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn html_path(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.html"))
    }

    pub fn meta_path(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.meta.json"))
    }

    pub fn report_path(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.validation.json"))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join("_summary.json")
    }

    /// An article body exists for `slug`.
    pub fn exists(&self, slug: &str) -> bool {
        self.html_path(slug).exists()
    }

    /// Persist the body as produced plus its metadata. Returns the body path.
    pub fn write_article(&self, article: &Article) -> Result<PathBuf, QuillError> {
        let path = self.html_path(&article.slug);
        write_atomic(&path, &article.body)?;
        write_atomic(
            &self.meta_path(&article.slug),
            &serde_json::to_string_pretty(&article.meta())?,
        )?;
        debug!("wrote {}", path.display());
        Ok(path)
    }

    pub fn write_report(&self, slug: &str, report: &ValidationReport) -> Result<PathBuf, QuillError> {
        let path = self.report_path(slug);
        write_atomic(&path, &report.to_json()?)?;
        Ok(path)
    }

    /// Load a previously written article.
    ///
    /// A body without metadata is an error: the subject and URL are needed to validate it.
    pub fn read_article(&self, slug: &str) -> Result<Article, QuillError> {
        let body_path = self.html_path(slug);
        let body = std::fs::read_to_string(&body_path).map_err(|e| {
            QuillError::Store(format!("no article at {}: {e}", body_path.display()))
        })?;
        let meta_path = self.meta_path(slug);
        let meta_text = std::fs::read_to_string(&meta_path).map_err(|e| {
            QuillError::Store(format!("no metadata at {}: {e}", meta_path.display()))
        })?;
        let meta: ArticleMeta = serde_json::from_str(&meta_text).map_err(|e| {
            QuillError::Store(format!("corrupt metadata {}: {e}", meta_path.display()))
        })?;
        Ok(Article::from_parts(meta, body))
    }

    pub fn read_report(&self, slug: &str) -> Result<Option<ValidationReport>, QuillError> {
        let path = self.report_path(slug);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        let report = serde_json::from_str(&text)
            .map_err(|e| QuillError::Store(format!("corrupt report {}: {e}", path.display())))?;
        Ok(Some(report))
    }

    /// Batch summary, replaced on every run.
    pub fn write_summary<T: Serialize>(&self, summary: &T) -> Result<PathBuf, QuillError> {
        let path = self.summary_path();
        write_atomic(&path, &serde_json::to_string_pretty(summary)?)?;
        Ok(path)
    }
}

/// Write through a sibling temp file so readers never see a partial file.
fn write_atomic(path: &Path, content: &str) -> Result<(), QuillError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
