use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::QuillError;


/// Top-level Quill configuration.
///
/// Loaded once at startup and passed by reference into every component; nothing
/// reads configuration from ambient state after `load` returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub quill: QuillConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub brand: BrandConfig,
    #[serde(default)]
    pub search_console: SearchConsoleConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

/// General settings: where data lives and where articles go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuillConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for QuillConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            output_dir: default_output_dir(),
            log_level: default_log_level(),
        }
    }
}

impl QuillConfig {
    fn data_path(&self, child: &str) -> PathBuf {
        Path::new(&shellexpand(&self.data_dir)).join(child)
    }

    /// `keywords.csv`, `headers.csv`, `questions.csv`.
    pub fn templates_dir(&self) -> PathBuf {
        self.data_path("templates")
    }

    /// SEO term exports (`<slug>.json` or `<slug>.csv`).
    pub fn seo_terms_dir(&self) -> PathBuf {
        self.data_path("clearscope")
    }

    pub fn search_console_dir(&self) -> PathBuf {
        self.data_path("search_console")
    }

    pub fn case_studies_dir(&self) -> PathBuf {
        self.data_path("case_studies")
    }

    /// Per-stage generation cache.
    pub fn stage_cache_dir(&self) -> PathBuf {
        self.data_path("cache")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_path("logs")
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(shellexpand(&self.output_dir))
    }
}

/// Anthropic Messages API settings shared by all three stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Article writing model.
    #[serde(default = "default_writer_model")]
    pub writer_model: String,
    /// Fast model used for header selection.
    #[serde(default = "default_selector_model")]
    pub selector_model: String,
    /// Model used for the web research step.
    #[serde(default = "default_researcher_model")]
    pub researcher_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: default_api_url(),
            writer_model: default_writer_model(),
            selector_model: default_selector_model(),
            researcher_model: default_researcher_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

/// Backoff for overload (529) and rate-limit (429) responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped.
    pub fn delay_secs(&self, attempt: u32) -> u64 {
        let factor = 2u64.saturating_pow(attempt);
        self.base_delay_secs
            .saturating_mul(factor)
            .min(self.max_delay_secs)
    }
}

/// Web research stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum web searches per research request.
    #[serde(default = "default_search_max_uses")]
    pub max_uses: u32,
    #[serde(default = "default_research_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_uses: default_search_max_uses(),
            max_tokens: default_research_max_tokens(),
        }
    }
}

/// Article generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Number of H2 headers picked by the selection stage.
    #[serde(default = "default_header_count")]
    pub header_count: usize,
    /// Token substituted with the subject term in every template.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    /// Optional file whose content replaces the built-in system prompt entirely.
    #[serde(default)]
    pub system_prompt_path: Option<String>,
    /// Year quoted in prompts ("use 2026 data"). Filled from the clock when unset.
    #[serde(default)]
    pub year: Option<i32>,
    /// Maximum search queries listed in the user prompt.
    #[serde(default = "default_query_limit")]
    pub query_limit: usize,
    /// Maximum writing attempts; each attempt re-runs the stage with identical input.
    #[serde(default = "default_writing_attempts")]
    pub writing_attempts: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            header_count: default_header_count(),
            placeholder: default_placeholder(),
            system_prompt_path: None,
            year: None,
            query_limit: default_query_limit(),
            writing_attempts: default_writing_attempts(),
        }
    }
}

/// A suggested link: `(anchor, url)`.
pub type LinkSuggestion = (String, String);

/// Brand identity injected into prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandConfig {
    #[serde(default = "default_brand_name")]
    pub name: String,
    #[serde(default = "default_brand_homepage")]
    pub homepage: String,
    /// Internal link pool, anchor → URL.
    #[serde(default = "default_internal_links")]
    pub internal_links: BTreeMap<String, String>,
    /// Official documentation links keyed by lowercase subject.
    #[serde(default = "default_official_links")]
    pub official_links: BTreeMap<String, Vec<LinkSuggestion>>,
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            name: default_brand_name(),
            homepage: default_brand_homepage(),
            internal_links: default_internal_links(),
            official_links: default_official_links(),
        }
    }
}

/// Search analytics collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConsoleConfig {
    #[serde(default = "default_sc_site")]
    pub site_url: String,
    /// OAuth bearer token. Empty means "cached data only".
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_sc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_sc_days")]
    pub days: i64,
    #[serde(default = "default_sc_row_limit")]
    pub row_limit: usize,
}

impl Default for SearchConsoleConfig {
    fn default() -> Self {
        Self {
            site_url: default_sc_site(),
            access_token: String::new(),
            endpoint: default_sc_endpoint(),
            days: default_sc_days(),
            row_limit: default_sc_row_limit(),
        }
    }
}

/// Inclusive `[min, max]` bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: usize,
    pub max: usize,
}

impl Bounds {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: usize) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// One row of the grade table. A row matches when both counts are within its limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRule {
    pub grade: String,
    pub max_issues: usize,
    /// `None` = any number of warnings.
    #[serde(default)]
    pub max_warnings: Option<usize>,
}

/// Ordered issue-count → letter-grade mapping; first matching row wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeTable {
    #[serde(default = "default_grade_rules")]
    pub rules: Vec<GradeRule>,
    /// Grade when no row matches.
    #[serde(default = "default_fallback_grade")]
    pub fallback: String,
}

impl Default for GradeTable {
    fn default() -> Self {
        Self {
            rules: default_grade_rules(),
            fallback: default_fallback_grade(),
        }
    }
}

/// Thresholds for every validation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_word_count")]
    pub word_count: Bounds,
    /// Above `word_count.max` but at most this is a warning; beyond is an issue.
    #[serde(default = "default_word_count_ceiling")]
    pub word_count_ceiling: usize,
    #[serde(default = "default_header_bounds")]
    pub header_count: Bounds,
    #[serde(default = "default_banned_headers")]
    pub banned_headers: Vec<String>,
    /// Token counted as a brand mention (case-insensitive).
    #[serde(default = "default_brand_token")]
    pub brand_token: String,
    #[serde(default = "default_brand_mentions_min")]
    pub brand_mentions_min: usize,
    /// Word that must not describe the brand's people.
    #[serde(default = "default_brand_descriptor")]
    pub forbidden_brand_descriptor: String,
    #[serde(default = "default_subject_mentions_min")]
    pub subject_mentions_min: usize,
    /// Host suffix identifying internal links.
    #[serde(default = "default_internal_domain")]
    pub internal_domain: String,
    #[serde(default = "default_internal_links_bounds")]
    pub internal_links: Bounds,
    #[serde(default = "default_external_links_bounds")]
    pub external_links: Bounds,
    #[serde(default = "default_competitors")]
    pub competitor_domains: Vec<String>,
    #[serde(default = "default_header_coverage_issue")]
    pub header_coverage_issue_below: f64,
    #[serde(default = "default_header_coverage_warning")]
    pub header_coverage_warning_below: f64,
    /// Share of significant template words an article header must contain.
    #[serde(default = "default_header_word_overlap")]
    pub header_word_overlap: f64,
    #[serde(default = "default_term_threshold")]
    pub term_coverage_threshold: f64,
    /// Below this coverage a miss is an issue; between this and the threshold, a warning.
    #[serde(default = "default_term_issue")]
    pub term_coverage_issue_below: f64,
    /// Minimum SEO importance listed as "high" in the report.
    #[serde(default = "default_high_importance")]
    pub high_importance: u8,
    #[serde(default = "default_keyword_min")]
    pub keyword_min_found: usize,
    #[serde(default = "default_keyword_target")]
    pub keyword_target_found: usize,
    /// Maximum token distance between a statistic and its citation.
    #[serde(default = "default_stat_distance")]
    pub statistic_max_distance: usize,
    /// Uncited statistics tolerated before the miss becomes an issue.
    #[serde(default = "default_stat_uncited")]
    pub statistic_max_uncited: usize,
    /// Years strictly before this are flagged as outdated. `None` skips the check.
    #[serde(default)]
    pub stale_before_year: Option<i32>,
    #[serde(default)]
    pub grades: GradeTable,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            word_count: default_word_count(),
            word_count_ceiling: default_word_count_ceiling(),
            header_count: default_header_bounds(),
            banned_headers: default_banned_headers(),
            brand_token: default_brand_token(),
            brand_mentions_min: default_brand_mentions_min(),
            forbidden_brand_descriptor: default_brand_descriptor(),
            subject_mentions_min: default_subject_mentions_min(),
            internal_domain: default_internal_domain(),
            internal_links: default_internal_links_bounds(),
            external_links: default_external_links_bounds(),
            competitor_domains: default_competitors(),
            header_coverage_issue_below: default_header_coverage_issue(),
            header_coverage_warning_below: default_header_coverage_warning(),
            header_word_overlap: default_header_word_overlap(),
            term_coverage_threshold: default_term_threshold(),
            term_coverage_issue_below: default_term_issue(),
            high_importance: default_high_importance(),
            keyword_min_found: default_keyword_min(),
            keyword_target_found: default_keyword_target(),
            statistic_max_distance: default_stat_distance(),
            statistic_max_uncited: default_stat_uncited(),
            stale_before_year: None,
            grades: GradeTable::default(),
        }
    }
}

/// SQLite queue and run history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Work-queue policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Skip subjects whose article already exists on disk.
    #[serde(default = "default_true")]
    pub skip_done: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { skip_done: true }
    }
}

impl Config {
    /// Fail fast when generation cannot possibly run.
    pub fn require_generation(&self) -> Result<(), QuillError> {
        if self.provider.api_key.trim().is_empty() {
            return Err(QuillError::Config(
                "provider.api_key is empty. Set it in quill.toml or the ANTHROPIC_API_KEY env var."
                    .into(),
            ));
        }
        if self.generation.header_count == 0 {
            return Err(QuillError::Config(
                "generation.header_count must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Fill secrets left empty in the file from the environment.
    fn apply_env(&mut self) {
        if self.provider.api_key.is_empty() {
            if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
                self.provider.api_key = key;
            }
        }
        if self.search_console.access_token.is_empty() {
            if let Ok(token) = std::env::var("SEARCH_CONSOLE_TOKEN") {
                self.search_console.access_token = token;
            }
        }
    }
}

// --- Default value functions ---

fn default_data_dir() -> String {
    "data".to_string()
}
fn default_output_dir() -> String {
    "output/articles".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}
fn default_writer_model() -> String {
    "claude-opus-4-6".to_string()
}
fn default_selector_model() -> String {
    "claude-haiku-4-5-20251001".to_string()
}
fn default_researcher_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}
fn default_max_tokens() -> u32 {
    16_000
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    600
}
fn default_max_retries() -> u32 {
    5
}
fn default_base_delay_secs() -> u64 {
    4
}
fn default_max_delay_secs() -> u64 {
    120
}
fn default_search_max_uses() -> u32 {
    3
}
fn default_research_max_tokens() -> u32 {
    4096
}
fn default_header_count() -> usize {
    8
}
fn default_placeholder() -> String {
    "{TECH}".to_string()
}
fn default_query_limit() -> usize {
    50
}
fn default_writing_attempts() -> u32 {
    1
}
fn default_brand_name() -> String {
    "Lemon.io".to_string()
}
fn default_brand_homepage() -> String {
    "https://lemon.io/".to_string()
}
fn default_internal_links() -> BTreeMap<String, String> {
    [
        ("AI engineers", "https://lemon.io/hire/ai-engineers/"),
        ("full-stack developers", "https://lemon.io/hire/full-stack-developers/"),
        ("front-end developers", "https://lemon.io/hire/front-end-developers/"),
        ("back-end developers", "https://lemon.io/hire/back-end-developers/"),
        ("mobile developers", "https://lemon.io/hire/mobile-developers/"),
        ("DevOps engineers", "https://lemon.io/hire/devops/"),
        ("Python developers", "https://lemon.io/hire/python-developers/"),
        ("JavaScript developers", "https://lemon.io/hire/javascript-developers/"),
        ("Node.js developers", "https://lemon.io/hire/node-js-developers/"),
        ("React developers", "https://lemon.io/hire/react-developers/"),
        ("Django developers", "https://lemon.io/hire/django-developers/"),
    ]
    .into_iter()
    .map(|(a, u)| (a.to_string(), u.to_string()))
    .collect()
}
fn default_official_links() -> BTreeMap<String, Vec<LinkSuggestion>> {
    let table: &[(&str, &[(&str, &str)])] = &[
        (
            "python",
            &[
                ("Python", "https://www.python.org/"),
                ("Python documentation", "https://docs.python.org/"),
                ("Django", "https://www.djangoproject.com/"),
                ("FastAPI", "https://fastapi.tiangolo.com/"),
            ],
        ),
        (
            "react",
            &[
                ("React", "https://react.dev/"),
                ("Next.js", "https://nextjs.org/"),
            ],
        ),
        (
            "node.js",
            &[
                ("Node.js", "https://nodejs.org/"),
                ("npm", "https://www.npmjs.com/"),
            ],
        ),
        (
            "typescript",
            &[("TypeScript", "https://www.typescriptlang.org/")],
        ),
    ];
    table
        .iter()
        .map(|(subject, links)| {
            (
                subject.to_string(),
                links
                    .iter()
                    .map(|(a, u)| (a.to_string(), u.to_string()))
                    .collect(),
            )
        })
        .collect()
}
fn default_sc_site() -> String {
    "sc-domain:lemon.io".to_string()
}
fn default_sc_endpoint() -> String {
    "https://searchconsole.googleapis.com/webmasters/v3".to_string()
}
fn default_sc_days() -> i64 {
    30
}
fn default_sc_row_limit() -> usize {
    1000
}
fn default_word_count() -> Bounds {
    Bounds::new(2800, 3200)
}
fn default_word_count_ceiling() -> usize {
    3500
}
fn default_header_bounds() -> Bounds {
    Bounds::new(5, 10)
}
fn default_banned_headers() -> Vec<String> {
    vec!["introduction".into(), "conclusion".into()]
}
fn default_brand_token() -> String {
    "lemon.io".to_string()
}
fn default_brand_mentions_min() -> usize {
    3
}
fn default_brand_descriptor() -> String {
    "freelancer".to_string()
}
fn default_subject_mentions_min() -> usize {
    5
}
fn default_internal_domain() -> String {
    "lemon.io".to_string()
}
fn default_internal_links_bounds() -> Bounds {
    Bounds::new(2, 4)
}
fn default_external_links_bounds() -> Bounds {
    Bounds::new(2, 6)
}
fn default_competitors() -> Vec<String> {
    [
        "toptal.com",
        "upwork.com",
        "fiverr.com",
        "arc.dev",
        "turing.com",
        "gun.io",
        "hired.com",
        "andela.com",
        "x-team.com",
        "codementor.io",
        "freelancer.com",
        "peopleperhour.com",
        "guru.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_header_coverage_issue() -> f64 {
    0.25
}
fn default_header_coverage_warning() -> f64 {
    0.40
}
fn default_header_word_overlap() -> f64 {
    0.6
}
fn default_term_threshold() -> f64 {
    0.90
}
fn default_term_issue() -> f64 {
    0.85
}
fn default_high_importance() -> u8 {
    8
}
fn default_keyword_min() -> usize {
    5
}
fn default_keyword_target() -> usize {
    7
}
fn default_stat_distance() -> usize {
    40
}
fn default_stat_uncited() -> usize {
    3
}
fn default_grade_rules() -> Vec<GradeRule> {
    [
        ("A+", 0, Some(0)),
        ("A", 0, None),
        ("A-", 1, None),
        ("B+", 2, None),
        ("B", 3, None),
        ("C", 5, None),
    ]
    .into_iter()
    .map(|(grade, max_issues, max_warnings)| GradeRule {
        grade: grade.to_string(),
        max_issues,
        max_warnings,
    })
    .collect()
}
fn default_fallback_grade() -> String {
    "D".to_string()
}
fn default_db_path() -> String {
    "data/quill.db".to_string()
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Empty secrets are
/// filled from the environment either way.
pub fn load(path: &str) -> Result<Config, QuillError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QuillError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        parse(&content)?
    } else {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };
    config.apply_env();
    Ok(config)
}

/// Parse configuration text without touching the environment.
pub fn parse(content: &str) -> Result<Config, QuillError> {
    toml::from_str(content).map_err(|e| QuillError::Config(format!("failed to parse config: {e}")))
}
