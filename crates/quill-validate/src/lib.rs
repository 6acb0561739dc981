//! # quill-validate
//!
//! Deterministic validation of generated articles. `validate` is pure: the
//! same article, source record and configuration always produce the same
//! report.

pub mod checks;
pub mod document;
pub mod grade;
pub mod html;
pub mod report;

use quill_core::{
    config::ValidationConfig,
    model::{Article, SourceRecord},
};
use tracing::debug;

pub use checks::{default_checks, Check, CheckContext, CheckResult, Severity, Verdict};
pub use document::Document;
pub use grade::compute_grade;
pub use html::{ensure_html, html_to_markdown, normalize};
pub use report::{format_report, Metrics, ValidationReport};

/// Run the default battery.
pub fn validate(
    article: &Article,
    source: &SourceRecord,
    config: &ValidationConfig,
) -> ValidationReport {
    validate_with(&default_checks(), article, source, config)
}

/// Run `checks` against the article. The body may be markdown or HTML.
pub fn validate_with(
    checks: &[Check],
    article: &Article,
    source: &SourceRecord,
    config: &ValidationConfig,
) -> ValidationReport {
    let doc = Document::parse(&normalize(&article.body));
    let ctx = CheckContext {
        article,
        source,
        config,
        doc: &doc,
    };

    let results: Vec<CheckResult> = checks.iter().map(|c| c.evaluate(&ctx)).collect();
    let failed = |severity| {
        results
            .iter()
            .filter(|r| !r.passed && r.severity == severity)
            .map(|r| r.detail.clone())
            .collect::<Vec<_>>()
    };
    let issues = failed(Severity::Issue);
    let warnings = failed(Severity::Warning);
    let grade = compute_grade(&config.grades, issues.len(), warnings.len());
    debug!(
        "{}: {} issues, {} warnings, grade {grade}",
        article.slug,
        issues.len(),
        warnings.len()
    );

    let keyword_total = source.templates.keywords.len();
    let keywords_found = checks::keywords_found(&ctx);
    let metrics = Metrics {
        word_count: doc.word_count,
        h2_count: doc.headings_at(2).count(),
        term_coverage: checks::measure_term_coverage(&ctx).map(|c| c.ratio()),
        keyword_coverage: (keyword_total > 0)
            .then(|| keywords_found as f64 / keyword_total as f64),
        keywords_found,
        header_coverage: checks::measure_header_coverage(&ctx).map(|c| c.ratio()),
        internal_links: ctx.internal_links().count(),
        external_links: ctx.external_links().count(),
        statistics: doc.statistics.len(),
        uncited_statistics: checks::uncited_statistics(&ctx).len(),
    };

    let subject = ctx.subject().to_string();
    let missing_high_importance = checks::missing_high_importance(&ctx);
    ValidationReport {
        slug: article.slug.clone(),
        subject,
        passed: issues.is_empty(),
        grade,
        checks: results,
        issues,
        warnings,
        metrics,
        missing_high_importance,
        research_degraded: article.research_degraded,
        notes: source.notes.clone(),
        stale_before_year: config.stale_before_year,
    }
}

#[cfg(test)]
mod tests;
