use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Template file categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateCategory {
    Keywords,
    Headers,
    Questions,
}

impl TemplateCategory {
    pub const ALL: [TemplateCategory; 3] = [Self::Keywords, Self::Headers, Self::Questions];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keywords => "keywords",
            Self::Headers => "headers",
            Self::Questions => "questions",
        }
    }

    /// Backing file name inside the templates directory.
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.as_str())
    }
}

/// Templates rendered for one subject. Order follows the template files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSet {
    pub subject: String,
    pub keywords: Vec<String>,
    pub headers: Vec<String>,
    pub questions: Vec<String>,
}

/// One search-analytics row for a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub ctr: f64,
    #[serde(default)]
    pub position: f64,
}

/// An SEO term recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoTerm {
    pub term: String,
    #[serde(default)]
    pub variants: Vec<String>,
    /// 1-10.
    #[serde(default)]
    pub importance: u8,
    #[serde(default)]
    pub uses_min: u32,
    #[serde(default)]
    pub uses_max: u32,
}

impl SeoTerm {
    /// The term followed by its variants.
    pub fn forms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.term.as_str()).chain(self.variants.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseStudy {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub stats: Vec<String>,
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub quote_author: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Testimonial {
    pub quote: String,
    #[serde(default)]
    pub author: String,
}

/// Everything known about one subject before generation.
///
/// Absent sections are empty; `notes` lists what was missing so reports can
/// say why a coverage check was vacuous.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub slug: String,
    pub page_url: String,
    pub subject: String,
    pub templates: TemplateSet,
    #[serde(default)]
    pub queries: Vec<SearchQuery>,
    #[serde(default)]
    pub seo_terms: Vec<SeoTerm>,
    #[serde(default)]
    pub case_studies: Vec<CaseStudy>,
    #[serde(default)]
    pub testimonials: Vec<Testimonial>,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// A factual claim with its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub text: String,
    pub source_url: String,
}

/// Output of the research stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchBrief {
    pub claims: Vec<Claim>,
    pub context: String,
    /// Research failed and the brief is empty.
    #[serde(default)]
    pub degraded: bool,
}

impl ResearchBrief {
    /// Empty brief standing in for a failed research call.
    pub fn degraded() -> Self {
        Self {
            degraded: true,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty() && self.context.trim().is_empty()
    }
}

/// A generated article. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub slug: String,
    pub subject: String,
    pub page_url: String,
    /// Markdown or HTML as produced by the writer.
    pub body: String,
    /// H2 headers the writer was asked to use.
    #[serde(default)]
    pub selected_headers: Vec<String>,
    #[serde(default)]
    pub model: String,
    pub generated_at: DateTime<Utc>,
    /// Research failed and the article was written without a brief.
    #[serde(default)]
    pub research_degraded: bool,
}

impl Article {
    /// Metadata persisted next to the article body.
    pub fn meta(&self) -> ArticleMeta {
        ArticleMeta {
            slug: self.slug.clone(),
            subject: self.subject.clone(),
            page_url: self.page_url.clone(),
            selected_headers: self.selected_headers.clone(),
            model: self.model.clone(),
            generated_at: self.generated_at,
            research_degraded: self.research_degraded,
        }
    }

    /// Rebuild an article from persisted body and metadata.
    pub fn from_parts(meta: ArticleMeta, body: String) -> Self {
        Self {
            slug: meta.slug,
            subject: meta.subject,
            page_url: meta.page_url,
            body,
            selected_headers: meta.selected_headers,
            model: meta.model,
            generated_at: meta.generated_at,
            research_degraded: meta.research_degraded,
        }
    }
}

/// `Article` without its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleMeta {
    pub slug: String,
    pub subject: String,
    pub page_url: String,
    #[serde(default)]
    pub selected_headers: Vec<String>,
    #[serde(default)]
    pub model: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub research_degraded: bool,
}

/// Work-queue status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Done,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
        }
    }

    /// Statuses from which `self` may be entered by a normal update.
    ///
    /// `done → pending` is not listed; it only happens through an explicit requeue.
    pub fn allowed_from(&self) -> &'static [QueueStatus] {
        match self {
            Self::Pending => &[Self::Processing],
            Self::Processing => &[Self::Pending],
            Self::Done => &[Self::Processing],
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            other => Err(format!("unknown queue status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub slug: String,
    pub url: String,
    pub draft_url: Option<String>,
    pub status: QueueStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub updated_at: String,
}

/// One row of run history, appended after each generated article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub subject: String,
    pub url: String,
    pub word_count: usize,
    pub grade: String,
    /// SEO term coverage, 0.0-1.0. `None` when no terms were supplied.
    pub term_coverage: Option<f64>,
    pub issues: usize,
    pub warnings: usize,
    pub output_file: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_status_parse() {
        assert_eq!("".parse::<QueueStatus>().unwrap(), QueueStatus::Pending);
        assert_eq!(" Done ".parse::<QueueStatus>().unwrap(), QueueStatus::Done);
        assert!("archived".parse::<QueueStatus>().is_err());
    }

    #[test]
    fn test_queue_transitions() {
        assert_eq!(QueueStatus::Processing.allowed_from(), &[QueueStatus::Pending]);
        assert_eq!(QueueStatus::Done.allowed_from(), &[QueueStatus::Processing]);
        assert!(!QueueStatus::Pending.allowed_from().contains(&QueueStatus::Done));
    }

    #[test]
    fn test_seo_term_forms() {
        let term = SeoTerm {
            term: "python developers".into(),
            variants: vec!["python developer".into()],
            importance: 9,
            uses_min: 2,
            uses_max: 5,
        };
        let forms: Vec<&str> = term.forms().collect();
        assert_eq!(forms, vec!["python developers", "python developer"]);
    }

    #[test]
    fn test_article_meta_round_trip() {
        let article = Article {
            slug: "python-developers".into(),
            subject: "Python".into(),
            page_url: "https://lemon.io/hire/python-developers/".into(),
            body: "Body".into(),
            selected_headers: vec!["Why hire Python developers".into()],
            model: "claude-opus-4-6".into(),
            generated_at: Utc::now(),
            research_degraded: true,
        };
        let rebuilt = Article::from_parts(article.meta(), article.body.clone());
        assert_eq!(rebuilt, article);
    }
}
