//! Check registry.
//!
//! Every check is a plain function over a shared read-only [`CheckContext`].
//! Checks never fail: one that cannot evaluate returns [`Verdict::Vacuous`].

use quill_core::{
    config::ValidationConfig,
    model::{Article, SeoTerm, SourceRecord},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::document::{count_mentions, host_matches, Document, Link};

/// Words ignored when comparing header wording.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "to", "for", "of", "in", "on", "with", "and", "or", "is", "are", "do",
    "does", "how", "what", "when", "where", "why", "i", "you", "your", "my", "it", "can",
    "should", "must", "that", "this", "from",
];

/// Oldest year considered when looking for stale data.
const FRESHNESS_FLOOR: i32 = 2010;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Issue,
    Warning,
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// Severity of the failure, or the check's nominal severity when it passed.
    pub severity: Severity,
    pub detail: String,
    /// The check had nothing to evaluate and passed by default.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub vacuous: bool,
}

/// What a check function decides.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass(String),
    Vacuous(String),
    Warning(String),
    Issue(String),
}

/// Read-only inputs shared by all checks.
pub struct CheckContext<'a> {
    pub article: &'a Article,
    pub source: &'a SourceRecord,
    pub config: &'a ValidationConfig,
    pub doc: &'a Document,
}

impl CheckContext<'_> {
    pub fn subject(&self) -> &str {
        if self.article.subject.is_empty() {
            &self.source.subject
        } else {
            &self.article.subject
        }
    }

    pub fn is_internal(&self, link: &Link) -> bool {
        link.host
            .as_deref()
            .is_some_and(|h| host_matches(h, &self.config.internal_domain))
    }

    pub fn is_competitor(&self, link: &Link) -> bool {
        link.host.as_deref().is_some_and(|h| {
            self.config
                .competitor_domains
                .iter()
                .any(|d| host_matches(h, d))
        })
    }

    pub fn internal_links(&self) -> impl Iterator<Item = &Link> {
        self.doc.links.iter().filter(|l| self.is_internal(l))
    }

    /// Absolute links that are neither internal nor to a competitor.
    pub fn external_links(&self) -> impl Iterator<Item = &Link> {
        self.doc
            .links
            .iter()
            .filter(|l| l.host.is_some() && !self.is_internal(l) && !self.is_competitor(l))
    }
}

/// A named entry in the registry.
#[derive(Clone, Copy)]
pub struct Check {
    pub name: &'static str,
    /// Severity reported when the check passes.
    pub severity: Severity,
    pub run: fn(&CheckContext) -> Verdict,
}

impl Check {
    pub const fn new(name: &'static str, severity: Severity, run: fn(&CheckContext) -> Verdict) -> Self {
        Self { name, severity, run }
    }

    pub fn evaluate(&self, ctx: &CheckContext) -> CheckResult {
        let (passed, severity, detail, vacuous) = match (self.run)(ctx) {
            Verdict::Pass(d) => (true, self.severity, d, false),
            Verdict::Vacuous(d) => (true, self.severity, d, true),
            Verdict::Warning(d) => (false, Severity::Warning, d, false),
            Verdict::Issue(d) => (false, Severity::Issue, d, false),
        };
        CheckResult {
            name: self.name.to_string(),
            passed,
            severity,
            detail,
            vacuous,
        }
    }
}

/// The full battery, in report order.
pub fn default_checks() -> Vec<Check> {
    use Severity::{Issue, Warning};
    vec![
        Check::new("word_count", Issue, word_count),
        Check::new("header_count", Issue, header_count),
        Check::new("opening_structure", Issue, opening_structure),
        Check::new("banned_headers", Issue, banned_headers),
        Check::new("subheader_spacing", Warning, subheader_spacing),
        Check::new("brand_mentions", Issue, brand_mentions),
        Check::new("brand_descriptor", Issue, brand_descriptor),
        Check::new("subject_mentions", Issue, subject_mentions),
        Check::new("internal_links", Issue, internal_links),
        Check::new("external_links", Issue, external_links),
        Check::new("competitor_links", Issue, competitor_links),
        Check::new("header_coverage", Issue, header_coverage),
        Check::new("term_coverage", Issue, term_coverage),
        Check::new("keyword_coverage", Issue, keyword_coverage),
        Check::new("statistic_attribution", Issue, statistic_attribution),
        Check::new("data_freshness", Warning, data_freshness),
    ]
}

pub fn word_count(ctx: &CheckContext) -> Verdict {
    let n = ctx.doc.word_count;
    let bounds = ctx.config.word_count;
    if n < bounds.min {
        Verdict::Issue(format!("Too short: {n} words (target {bounds})"))
    } else if n > ctx.config.word_count_ceiling {
        Verdict::Issue(format!(
            "Too long: {n} words (target {bounds}, ceiling {})",
            ctx.config.word_count_ceiling
        ))
    } else if n > bounds.max {
        Verdict::Warning(format!("Slightly long: {n} words (target {bounds})"))
    } else {
        Verdict::Pass(format!("{n} words"))
    }
}

pub fn header_count(ctx: &CheckContext) -> Verdict {
    let n = ctx.doc.headings_at(2).count();
    let bounds = ctx.config.header_count;
    if bounds.contains(n) {
        Verdict::Pass(format!("{n} H2 headers"))
    } else if n < bounds.min {
        Verdict::Issue(format!("Too few H2 headers: {n} (target {bounds})"))
    } else {
        Verdict::Issue(format!("Too many H2 headers: {n} (target {bounds})"))
    }
}

pub fn opening_structure(ctx: &CheckContext) -> Verdict {
    match ctx.doc.markdown.lines().map(str::trim).find(|l| !l.is_empty()) {
        None => Verdict::Issue("Article is empty".into()),
        Some(first) if first.starts_with('#') => {
            Verdict::Issue("Article starts with a header instead of a paragraph".into())
        }
        Some(_) => Verdict::Pass("Opens with a paragraph".into()),
    }
}

fn normalize_header(text: &str) -> String {
    text.trim().trim_end_matches(':').trim().to_lowercase()
}

pub fn banned_headers(ctx: &CheckContext) -> Verdict {
    let banned: HashSet<String> = ctx
        .config
        .banned_headers
        .iter()
        .map(|h| normalize_header(h))
        .collect();
    let found: Vec<&str> = ctx
        .doc
        .headings
        .iter()
        .filter(|h| banned.contains(&normalize_header(&h.text)))
        .map(|h| h.text.as_str())
        .collect();
    if found.is_empty() {
        Verdict::Pass("No banned headers".into())
    } else {
        Verdict::Issue(format!("Banned header(s): {}", found.join(", ")))
    }
}

pub fn subheader_spacing(ctx: &CheckContext) -> Verdict {
    let lines: Vec<&str> = ctx.doc.markdown.lines().collect();
    let crowded: Vec<&str> = ctx
        .doc
        .headings_at(2)
        .filter(|h| {
            lines[h.line + 1..]
                .iter()
                .map(|l| l.trim())
                .find(|l| !l.is_empty())
                .is_some_and(|next| next.starts_with("### "))
        })
        .map(|h| h.text.as_str())
        .collect();
    if crowded.is_empty() {
        Verdict::Pass("Every H2 opens with body text".into())
    } else {
        Verdict::Warning(format!(
            "H2 immediately followed by H3 without body text: {}",
            crowded.join(", ")
        ))
    }
}

pub fn brand_mentions(ctx: &CheckContext) -> Verdict {
    let token = &ctx.config.brand_token;
    if token.trim().is_empty() {
        return Verdict::Vacuous("No brand token configured".into());
    }
    let n = count_mentions(&ctx.doc.plain, token);
    let min = ctx.config.brand_mentions_min;
    if n >= min {
        Verdict::Pass(format!("{n} mentions of {token}"))
    } else {
        Verdict::Issue(format!("Too few {token} mentions: {n} (need {min}+)"))
    }
}

pub fn brand_descriptor(ctx: &CheckContext) -> Verdict {
    let token = ctx.config.brand_token.trim();
    let word = ctx.config.forbidden_brand_descriptor.trim();
    if token.is_empty() || word.is_empty() {
        return Verdict::Vacuous("No brand descriptor rule configured".into());
    }
    let stem = token.split('.').next().unwrap_or(token);
    let pattern = format!(
        r"(?i)\b(?:{}|{})\s+(?:\w+\s+){{0,5}}{}",
        regex::escape(token),
        regex::escape(stem),
        regex::escape(word)
    );
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => return Verdict::Vacuous(format!("Brand descriptor rule unusable: {e}")),
    };
    let found: Vec<&str> = re.find_iter(&ctx.doc.prose).map(|m| m.as_str()).collect();
    if found.is_empty() {
        Verdict::Pass(format!("{token} never described as \"{word}\""))
    } else {
        Verdict::Issue(format!(
            "{token} described as \"{word}\": {}",
            found.join(" | ")
        ))
    }
}

pub fn subject_mentions(ctx: &CheckContext) -> Verdict {
    let subject = ctx.subject();
    if subject.trim().is_empty() {
        return Verdict::Vacuous("No subject to count".into());
    }
    let n = count_mentions(&ctx.doc.plain, subject);
    let min = ctx.config.subject_mentions_min;
    if n >= min {
        Verdict::Pass(format!("{subject} mentioned {n} times"))
    } else {
        Verdict::Issue(format!("{subject} only mentioned {n} times (need {min}+)"))
    }
}

pub fn internal_links(ctx: &CheckContext) -> Verdict {
    let n = ctx.internal_links().count();
    let bounds = ctx.config.internal_links;
    if n < bounds.min {
        Verdict::Issue(format!("Only {n} internal links (target {bounds})"))
    } else if n > bounds.max {
        Verdict::Warning(format!("Too many internal links: {n} (target {bounds})"))
    } else {
        Verdict::Pass(format!("{n} internal links"))
    }
}

pub fn external_links(ctx: &CheckContext) -> Verdict {
    let n = ctx.external_links().count();
    let bounds = ctx.config.external_links;
    if n < bounds.min {
        Verdict::Issue(format!("Only {n} external links (target {bounds})"))
    } else if n > bounds.max {
        Verdict::Issue(format!("Too many external links: {n} (max {})", bounds.max))
    } else {
        Verdict::Pass(format!("{n} external links"))
    }
}

pub fn competitor_links(ctx: &CheckContext) -> Verdict {
    let found: Vec<&str> = ctx
        .doc
        .links
        .iter()
        .filter(|l| ctx.is_competitor(l))
        .map(|l| l.url.as_str())
        .collect();
    if found.is_empty() {
        Verdict::Pass("No competitor links".into())
    } else {
        Verdict::Issue(format!("Competitor links: {}", found.join(", ")))
    }
}

fn significant_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_lowercase())
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .map(String::from)
        .collect()
}

/// Selected headers that appear among the article's H2/H3 headings.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCoverage {
    pub found: usize,
    pub total: usize,
    pub missing: Vec<String>,
}

impl HeaderCoverage {
    pub fn ratio(&self) -> f64 {
        self.found as f64 / self.total as f64
    }
}

/// `None` when no headers were selected.
pub fn measure_header_coverage(ctx: &CheckContext) -> Option<HeaderCoverage> {
    let selected = &ctx.article.selected_headers;
    if selected.is_empty() {
        return None;
    }
    let present: Vec<(String, HashSet<String>)> = ctx
        .doc
        .headings
        .iter()
        .filter(|h| (h.level == 2 || h.level == 3) && !h.text.is_empty())
        .map(|h| {
            let lower = h.text.trim().to_lowercase();
            let words = significant_words(&lower);
            (lower, words)
        })
        .collect();

    let mut missing = Vec::new();
    for wanted in selected {
        let lower = wanted.trim().to_lowercase();
        let wanted_words = significant_words(&lower);
        let hit = present.iter().any(|(have, have_words)| {
            lower.contains(have.as_str())
                || have.contains(lower.as_str())
                || (!wanted_words.is_empty()
                    && wanted_words.intersection(have_words).count() as f64
                        / wanted_words.len() as f64
                        >= ctx.config.header_word_overlap)
        });
        if !hit {
            missing.push(wanted.clone());
        }
    }
    Some(HeaderCoverage {
        found: selected.len() - missing.len(),
        total: selected.len(),
        missing,
    })
}

pub fn header_coverage(ctx: &CheckContext) -> Verdict {
    let Some(cov) = measure_header_coverage(ctx) else {
        return Verdict::Vacuous("No selected headers to compare".into());
    };
    let ratio = cov.ratio();
    let detail = format!(
        "{}/{} selected headers used ({:.0}%)",
        cov.found,
        cov.total,
        ratio * 100.0
    );
    if ratio < ctx.config.header_coverage_issue_below {
        Verdict::Issue(format!("Low header coverage: {detail}"))
    } else if ratio < ctx.config.header_coverage_warning_below {
        Verdict::Warning(format!("Header coverage could be better: {detail}"))
    } else {
        Verdict::Pass(detail)
    }
}

/// SEO terms found in the article text.
#[derive(Debug, Clone, PartialEq)]
pub struct TermCoverage<'a> {
    pub found: usize,
    pub total: usize,
    pub missing: Vec<&'a SeoTerm>,
}

impl TermCoverage<'_> {
    pub fn ratio(&self) -> f64 {
        self.found as f64 / self.total as f64
    }
}

/// A term is present when it or any variant appears as a case-insensitive substring.
pub fn measure_term_coverage<'a>(ctx: &CheckContext<'a>) -> Option<TermCoverage<'a>> {
    let terms = &ctx.source.seo_terms;
    if terms.is_empty() {
        return None;
    }
    let missing: Vec<&SeoTerm> = terms
        .iter()
        .filter(|t| {
            !t.forms().any(|f| ctx.doc.contains_phrase(f))
        })
        .collect();
    Some(TermCoverage {
        found: terms.len() - missing.len(),
        total: terms.len(),
        missing,
    })
}

/// Missing terms at or above the configured high-importance level.
pub fn missing_high_importance(ctx: &CheckContext) -> Vec<String> {
    measure_term_coverage(ctx)
        .map(|cov| {
            cov.missing
                .iter()
                .filter(|t| t.importance >= ctx.config.high_importance)
                .map(|t| t.term.clone())
                .collect()
        })
        .unwrap_or_default()
}

pub fn term_coverage(ctx: &CheckContext) -> Verdict {
    let Some(cov) = measure_term_coverage(ctx) else {
        return Verdict::Vacuous("No SEO terms supplied".into());
    };
    let ratio = cov.ratio();
    let threshold = ctx.config.term_coverage_threshold;
    let mut detail = format!(
        "{}/{} SEO terms ({:.1}%, target {:.0}%)",
        cov.found,
        cov.total,
        ratio * 100.0,
        threshold * 100.0
    );
    let high = missing_high_importance(ctx);
    if !high.is_empty() {
        detail.push_str(&format!("; missing high importance: {}", high.join(", ")));
    }
    if ratio >= threshold {
        Verdict::Pass(detail)
    } else if ratio < ctx.config.term_coverage_issue_below {
        Verdict::Issue(format!("Low SEO term coverage: {detail}"))
    } else {
        Verdict::Warning(format!("SEO term coverage below target: {detail}"))
    }
}

/// Number of keyword templates present verbatim (case-insensitive).
pub fn keywords_found(ctx: &CheckContext) -> usize {
    ctx.source
        .templates
        .keywords
        .iter()
        .filter(|k| ctx.doc.contains_phrase(k))
        .count()
}

pub fn keyword_coverage(ctx: &CheckContext) -> Verdict {
    let total = ctx.source.templates.keywords.len();
    if total == 0 {
        return Verdict::Vacuous("No keywords supplied".into());
    }
    let found = keywords_found(ctx);
    let target = ctx.config.keyword_target_found.min(total);
    let floor = ctx.config.keyword_min_found.min(total);
    let detail = format!("{found}/{total} keywords used as exact phrases");
    if found >= target {
        Verdict::Pass(detail)
    } else if found < floor {
        Verdict::Issue(format!("Too few keywords: {detail} (need {floor}+)"))
    } else {
        Verdict::Warning(format!("Keyword usage on the low end: {detail} (target {target}+)"))
    }
}

/// Statistics with no link or citation marker within the configured token distance.
pub fn uncited_statistics<'a>(ctx: &CheckContext<'a>) -> Vec<&'a str> {
    let max = ctx.config.statistic_max_distance;
    ctx.doc
        .statistics
        .iter()
        .filter(|s| !ctx.doc.citations.iter().any(|&c| c.abs_diff(s.token) <= max))
        .map(|s| s.text.as_str())
        .collect()
}

pub fn statistic_attribution(ctx: &CheckContext) -> Verdict {
    let total = ctx.doc.statistics.len();
    if total == 0 {
        return Verdict::Pass("No statistics detected".into());
    }
    let uncited = uncited_statistics(ctx);
    if uncited.is_empty() {
        return Verdict::Pass(format!("All {total} statistics cited"));
    }
    let examples = uncited.iter().take(5).copied().collect::<Vec<_>>().join(", ");
    let n = uncited.len();
    if n > ctx.config.statistic_max_uncited {
        Verdict::Issue(format!(
            "{n} statistics without a nearby source (max {}): {examples}",
            ctx.config.statistic_max_uncited
        ))
    } else {
        Verdict::Warning(format!("{n} statistics appear to lack a source: {examples}"))
    }
}

pub fn data_freshness(ctx: &CheckContext) -> Verdict {
    let Some(cutoff) = ctx.config.stale_before_year else {
        return Verdict::Vacuous("No freshness cutoff configured".into());
    };
    let stale: Vec<String> = ctx
        .doc
        .years()
        .into_iter()
        .filter(|y| (FRESHNESS_FLOOR..cutoff).contains(y))
        .map(|y| y.to_string())
        .collect();
    if stale.is_empty() {
        Verdict::Pass(format!("No data older than {cutoff}"))
    } else {
        Verdict::Warning(format!("References to outdated data: {}", stale.join(", ")))
    }
}
