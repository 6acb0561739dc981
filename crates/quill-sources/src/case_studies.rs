//! Cached customer case studies and testimonials.

use quill_core::{
    error::QuillError,
    model::{CaseStudy, Testimonial},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::cache::JsonCache;

const CACHE_KEY: &str = "case_studies";

/// Contents of `case_studies.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseStudyLibrary {
    #[serde(default)]
    pub case_studies: Vec<CaseStudy>,
    #[serde(default)]
    pub testimonials: Vec<Testimonial>,
}

/// Scraper output shape. Quotes are a plain list without attribution.
#[derive(Deserialize)]
struct RawLibrary {
    #[serde(default)]
    case_studies: Vec<RawCaseStudy>,
    #[serde(default)]
    testimonials: Vec<Testimonial>,
}

#[derive(Deserialize)]
struct RawCaseStudy {
    #[serde(default)]
    company: String,
    #[serde(default)]
    industry: String,
    #[serde(default)]
    headline: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    stats: Vec<String>,
    #[serde(default)]
    quote: String,
    #[serde(default)]
    quote_author: String,
    #[serde(default)]
    customer_quotes: Vec<String>,
    #[serde(default)]
    technologies: Vec<String>,
    #[serde(default)]
    url: String,
}

impl From<RawCaseStudy> for CaseStudy {
    fn from(raw: RawCaseStudy) -> Self {
        let (quote, quote_author) = if raw.quote.is_empty() {
            let quote = raw.customer_quotes.into_iter().next().unwrap_or_default();
            (quote, raw.company.clone())
        } else {
            (raw.quote, raw.quote_author)
        };
        CaseStudy {
            headline: if raw.headline.is_empty() {
                raw.title
            } else {
                raw.headline
            },
            company: raw.company,
            industry: raw.industry,
            stats: raw.stats,
            quote,
            quote_author,
            technologies: raw.technologies,
            url: raw.url,
        }
    }
}

/// Load the library from `<dir>/case_studies.json`. Missing file → empty library.
pub fn load(dir: &Path) -> Result<CaseStudyLibrary, QuillError> {
    let Some(raw) = JsonCache::new(dir).read::<RawLibrary>(CACHE_KEY)? else {
        warn!("case studies: no cache at {}", dir.display());
        return Ok(CaseStudyLibrary::default());
    };
    let library = CaseStudyLibrary {
        case_studies: raw.case_studies.into_iter().map(CaseStudy::from).collect(),
        testimonials: raw
            .testimonials
            .into_iter()
            .filter(|t| !t.quote.trim().is_empty())
            .collect(),
    };
    info!(
        "case studies: {} studies, {} testimonials",
        library.case_studies.len(),
        library.testimonials.len()
    );
    Ok(library)
}

/// Replace the cached library.
pub fn cache(dir: &Path, library: &CaseStudyLibrary) -> Result<(), QuillError> {
    JsonCache::new(dir).write(CACHE_KEY, library)
}
