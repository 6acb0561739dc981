use serde::{Deserialize, Serialize};

use crate::checks::{CheckResult, Severity};

/// Numeric measurements taken while validating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub word_count: usize,
    pub h2_count: usize,
    /// Fraction of SEO terms found; `None` without terms.
    pub term_coverage: Option<f64>,
    /// Fraction of keyword templates found; `None` without keywords.
    pub keyword_coverage: Option<f64>,
    pub keywords_found: usize,
    pub header_coverage: Option<f64>,
    pub internal_links: usize,
    pub external_links: usize,
    pub statistics: usize,
    pub uncited_statistics: usize,
}

/// Graded outcome for one article. Contains no timestamps so identical inputs
/// serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub slug: String,
    pub subject: String,
    pub grade: String,
    /// No issue-severity failures.
    pub passed: bool,
    pub checks: Vec<CheckResult>,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub metrics: Metrics,
    #[serde(default)]
    pub missing_high_importance: Vec<String>,
    #[serde(default)]
    pub research_degraded: bool,
    /// Data that was unavailable when the article was generated.
    #[serde(default)]
    pub notes: Vec<String>,
    /// Freshness cutoff the report was graded with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_before_year: Option<i32>,
}

impl ValidationReport {
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

const RULE: &str = "============================================================";

/// Render a report for the terminal.
pub fn format_report(report: &ValidationReport) -> String {
    let mut lines = vec![
        RULE.to_string(),
        format!("VALIDATION REPORT: {} ({})", report.subject, report.slug),
        RULE.to_string(),
        format!("Grade: {}", report.grade),
        String::new(),
    ];

    for check in &report.checks {
        let status = match (check.passed, check.vacuous, check.severity) {
            (true, true, _) => "SKIP",
            (true, false, _) => "PASS",
            (false, _, Severity::Warning) => "WARN",
            (false, _, Severity::Issue) => "FAIL",
        };
        lines.push(format!("  [{status}] {:<22} {}", check.name, check.detail));
    }

    let m = &report.metrics;
    lines.push(String::new());
    lines.push(format!(
        "  words {} | H2 {} | internal links {} | external links {} | statistics {} ({} uncited)",
        m.word_count, m.h2_count, m.internal_links, m.external_links, m.statistics, m.uncited_statistics
    ));
    if let Some(cov) = m.term_coverage {
        lines.push(format!("  SEO term coverage: {:.1}%", cov * 100.0));
    }
    if let Some(cov) = m.keyword_coverage {
        lines.push(format!(
            "  Keyword coverage: {:.1}% ({} found)",
            cov * 100.0,
            m.keywords_found
        ));
    }
    if !report.missing_high_importance.is_empty() {
        let shown: Vec<&str> = report
            .missing_high_importance
            .iter()
            .take(10)
            .map(String::as_str)
            .collect();
        lines.push(format!("    Missing HIGH importance: {}", shown.join(", ")));
    }
    if report.research_degraded {
        lines.push("  Research stage failed; written without a research brief".into());
    }
    for note in &report.notes {
        lines.push(format!("  note: {note}"));
    }

    if !report.issues.is_empty() {
        lines.push(format!("\nISSUES ({}):", report.issues.len()));
        lines.extend(report.issues.iter().map(|i| format!("  - {i}")));
    }
    if !report.warnings.is_empty() {
        lines.push(format!("\nWARNINGS ({}):", report.warnings.len()));
        lines.extend(report.warnings.iter().map(|w| format!("  ~ {w}")));
    }
    if report.issues.is_empty() && report.warnings.is_empty() {
        lines.push("\nAll checks passed!".into());
    }
    lines.push(RULE.to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, passed: bool, severity: Severity, vacuous: bool) -> CheckResult {
        CheckResult {
            name: name.into(),
            passed,
            severity,
            detail: format!("{name} detail"),
            vacuous,
        }
    }

    #[test]
    fn test_format_report_statuses() {
        let report = ValidationReport {
            slug: "go-developers".into(),
            subject: "Go".into(),
            grade: "A-".into(),
            passed: false,
            checks: vec![
                result("word_count", true, Severity::Issue, false),
                result("term_coverage", true, Severity::Issue, true),
                result("subheader_spacing", false, Severity::Warning, false),
                result("header_count", false, Severity::Issue, false),
            ],
            issues: vec!["header_count detail".into()],
            warnings: vec!["subheader_spacing detail".into()],
            metrics: Metrics {
                keyword_coverage: Some(0.25),
                keywords_found: 6,
                ..Default::default()
            },
            missing_high_importance: vec!["goroutines".into()],
            research_degraded: true,
            notes: vec!["no SEO terms for go-developers".into()],
            stale_before_year: None,
        };
        let text = format_report(&report);
        assert!(text.contains("VALIDATION REPORT: Go (go-developers)"));
        assert!(text.contains("Grade: A-"));
        assert!(text.contains("[PASS] word_count"));
        assert!(text.contains("[SKIP] term_coverage"));
        assert!(text.contains("[WARN] subheader_spacing"));
        assert!(text.contains("[FAIL] header_count"));
        assert!(text.contains("Keyword coverage: 25.0% (6 found)"));
        assert!(text.contains("Missing HIGH importance: goroutines"));
        assert!(text.contains("ISSUES (1):"));
        assert!(text.contains("WARNINGS (1):"));
        assert!(!text.contains("All checks passed!"));
    }
}
