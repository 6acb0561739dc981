//! # quill-sources
//!
//! Template store and external data loaders. Everything known about a
//! subject before generation is gathered here into a `SourceRecord`.

pub mod cache;
pub mod case_studies;
pub mod search_console;
pub mod seo_terms;
pub mod templates;

use quill_core::{
    config::Config,
    error::QuillError,
    model::SourceRecord,
    slug::{slug_from_url, subject_from_slug},
    traits::SearchAnalytics,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

pub use cache::JsonCache;
pub use case_studies::CaseStudyLibrary;
pub use search_console::{SearchConsoleClient, SearchConsoleLoader};
pub use templates::TemplateStore;

/// Aggregates every data source for one subject.
pub struct SourceLoader {
    templates: TemplateStore,
    seo_terms_dir: PathBuf,
    case_studies_dir: PathBuf,
    search: SearchConsoleLoader,
}

impl SourceLoader {
    pub fn new(
        templates: TemplateStore,
        seo_terms_dir: PathBuf,
        case_studies_dir: PathBuf,
        search: SearchConsoleLoader,
    ) -> Self {
        Self {
            templates,
            seo_terms_dir,
            case_studies_dir,
            search,
        }
    }

    /// Wire loaders from configuration. Live search analytics are used only
    /// when an access token is configured.
    pub fn from_config(config: &Config) -> Self {
        let analytics = SearchConsoleClient::from_config(&config.search_console)
            .map(|c| Arc::new(c) as Arc<dyn SearchAnalytics>);
        let search = SearchConsoleLoader::new(
            JsonCache::new(config.quill.search_console_dir()),
            analytics,
            config.search_console.row_limit,
        );
        Self::new(
            TemplateStore::new(
                config.quill.templates_dir(),
                config.generation.placeholder.clone(),
            ),
            config.quill.seo_terms_dir(),
            config.quill.case_studies_dir(),
            search,
        )
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// Load the `SourceRecord` for a page.
    ///
    /// Template and malformed-file failures are errors. Absent data yields
    /// empty sections, each listed in `notes`.
    pub async fn load(&self, page_url: &str, refresh: bool) -> Result<SourceRecord, QuillError> {
        let slug = slug_from_url(page_url);
        let subject = subject_from_slug(&slug);
        let templates = self.templates.for_subject(&subject)?;
        let queries = self.search.load(page_url, refresh).await?;
        let seo_terms = seo_terms::load(&self.seo_terms_dir, &slug)?;
        let library = case_studies::load(&self.case_studies_dir)?;

        let mut notes = Vec::new();
        if queries.is_empty() {
            notes.push("no search analytics queries".to_string());
        }
        if seo_terms.is_empty() {
            notes.push(format!("no SEO terms for {slug}"));
        }
        if library.case_studies.is_empty() && library.testimonials.is_empty() {
            notes.push("no case studies or testimonials".to_string());
        }
        for note in &notes {
            warn!("{slug}: {note}");
        }

        Ok(SourceRecord {
            slug,
            page_url: page_url.to_string(),
            subject,
            templates,
            queries,
            seo_terms,
            case_studies: library.case_studies,
            testimonials: library.testimonials,
            notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&root);
        let templates = root.join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join("keywords.csv"), "keyword\nhire {TECH} developers\n").unwrap();
        std::fs::write(templates.join("headers.csv"), "header\nWhy {TECH}\n").unwrap();
        std::fs::write(templates.join("questions.csv"), "question\nIs {TECH} hard?\n").unwrap();
        root
    }

    fn loader(root: &std::path::Path) -> SourceLoader {
        SourceLoader::new(
            TemplateStore::new(root.join("templates"), "{TECH}"),
            root.join("clearscope"),
            root.join("case_studies"),
            SearchConsoleLoader::new(JsonCache::new(root.join("search_console")), None, 50),
        )
    }

    #[tokio::test]
    async fn test_partial_data_still_loads() {
        let root = fixture("__quill_test_source_partial__");
        let record = loader(&root)
            .load("https://lemon.io/hire/node-js-developers/", false)
            .await
            .unwrap();
        assert_eq!(record.slug, "node-js-developers");
        assert_eq!(record.subject, "Node.js");
        assert_eq!(record.templates.keywords, vec!["hire Node.js developers"]);
        assert!(record.seo_terms.is_empty());
        assert_eq!(record.notes.len(), 3);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_mismatched_slug_means_missing_data() {
        let root = fixture("__quill_test_source_mismatch__");
        std::fs::create_dir_all(root.join("clearscope")).unwrap();
        std::fs::write(
            root.join("clearscope/python-developers.json"),
            r#"[{"term": "django", "importance": 9}]"#,
        )
        .unwrap();

        let l = loader(&root);
        let python = l.load("https://lemon.io/hire/python-developers/", false).await.unwrap();
        assert_eq!(python.seo_terms.len(), 1);
        let java = l.load("https://lemon.io/hire/java-developers/", false).await.unwrap();
        assert!(java.seo_terms.is_empty());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_missing_templates_is_error() {
        let root = std::env::temp_dir().join("__quill_test_source_no_templates__");
        let _ = std::fs::remove_dir_all(&root);
        let err = loader(&root)
            .load("https://lemon.io/hire/go-developers/", false)
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::TemplateLoad(_)));
    }

    #[tokio::test]
    async fn test_malformed_seo_file_is_data_error() {
        let root = fixture("__quill_test_source_malformed__");
        std::fs::create_dir_all(root.join("clearscope")).unwrap();
        std::fs::write(root.join("clearscope/go-developers.json"), "{oops").unwrap();
        let err = loader(&root)
            .load("https://lemon.io/hire/go-developers/", false)
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::DataLoad(_)));
        let _ = std::fs::remove_dir_all(&root);
    }
}
