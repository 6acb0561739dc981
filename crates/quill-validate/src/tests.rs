use super::*;
use chrono::DateTime;
use quill_core::model::{CaseStudy, SeoTerm, TemplateSet};

const FILLER: &[&str] = &["teams", "ship", "steady", "work", "every", "week", "with", "clear", "goals"];

fn filler(n: usize) -> String {
    (0..n).map(|i| FILLER[i % FILLER.len()]).collect::<Vec<_>>().join(" ")
}

fn article(body: &str) -> Article {
    Article {
        slug: "python-developers".into(),
        subject: "Python".into(),
        page_url: "https://lemon.io/hire/python-developers/".into(),
        body: body.into(),
        selected_headers: vec![],
        model: "test-model".into(),
        generated_at: DateTime::from_timestamp(1_767_225_600, 0).unwrap(),
        research_degraded: false,
    }
}

fn term(term: &str, importance: u8) -> SeoTerm {
    SeoTerm {
        term: term.into(),
        variants: vec![],
        importance,
        uses_min: 1,
        uses_max: 3,
    }
}

fn source() -> SourceRecord {
    SourceRecord {
        slug: "python-developers".into(),
        page_url: "https://lemon.io/hire/python-developers/".into(),
        subject: "Python".into(),
        ..Default::default()
    }
}

fn run(body: &str) -> ValidationReport {
    validate(&article(body), &source(), &ValidationConfig::default())
}

fn passed(report: &ValidationReport, name: &str) -> bool {
    report.check(name).map(|c| c.passed).unwrap()
}

// --- word count ---

#[test]
fn test_word_count_boundaries() {
    assert!(!passed(&run(&filler(2799)), "word_count"));
    assert!(passed(&run(&filler(2800)), "word_count"));
    assert!(passed(&run(&filler(3200)), "word_count"));

    let long = run(&filler(3201));
    let check = long.check("word_count").unwrap();
    assert!(!check.passed);
    assert_eq!(check.severity, Severity::Warning);

    let too_long = run(&filler(3501));
    assert_eq!(too_long.check("word_count").unwrap().severity, Severity::Issue);
}

#[test]
fn test_word_count_ignores_markup() {
    let body = format!(
        "{} [anchor text](https://example.com/a/very/long/path) **bold**\n\n## Two words",
        filler(10)
    );
    assert_eq!(run(&body).metrics.word_count, 15);
}

// --- structure ---

fn with_h2s(n: usize) -> String {
    let mut body = String::from("Opening paragraph.\n\n");
    for i in 0..n {
        body.push_str(&format!("## Section {i}\n\nBody text.\n\n"));
    }
    body
}

#[test]
fn test_header_count_boundaries() {
    assert!(!passed(&run(&with_h2s(4)), "header_count"));
    assert!(passed(&run(&with_h2s(5)), "header_count"));
    assert!(passed(&run(&with_h2s(10)), "header_count"));
    assert!(!passed(&run(&with_h2s(11)), "header_count"));
}

#[test]
fn test_h3_not_counted_as_h2() {
    let body = format!("{}### Extra\n\nMore.\n\n#### Deeper\n\nText.", with_h2s(5));
    assert_eq!(run(&body).metrics.h2_count, 5);
}

#[test]
fn test_opening_structure() {
    let report = run(&format!("## Why Python\n\n{}", filler(3000)));
    let check = report.check("opening_structure").unwrap();
    assert!(!check.passed);
    assert_eq!(check.severity, Severity::Issue);

    assert!(!passed(&run("\n\n   \n## Why Python\n\nText."), "opening_structure"));
    assert!(!passed(&run(""), "opening_structure"));
    assert!(passed(&run("Python is everywhere.\n\n## Why Python"), "opening_structure"));
}

#[test]
fn test_banned_headers_match_exactly() {
    assert!(!passed(&run("Text.\n\n## Introduction\n\nMore."), "banned_headers"));
    assert!(!passed(&run("Text.\n\n### conclusion:\n\nMore."), "banned_headers"));
    assert!(passed(
        &run("Text.\n\n## Conclusions about Python hiring\n\nMore."),
        "banned_headers"
    ));
}

#[test]
fn test_subheader_spacing_warns() {
    let report = run("Text.\n\n## Skills\n\n### Core language\n\nBody.");
    let check = report.check("subheader_spacing").unwrap();
    assert!(!check.passed);
    assert_eq!(check.severity, Severity::Warning);
    assert!(passed(&run("Text.\n\n## Skills\n\nBody.\n\n### Core\n\nMore."), "subheader_spacing"));
}

// --- brand and subject ---

#[test]
fn test_brand_mentions_ignore_urls() {
    let body = "Lemon.io helps. Lemon.io vets. [Hire](https://lemon.io/hire/) [more](https://lemon.io/faq/)";
    let report = run(body);
    assert!(!passed(&report, "brand_mentions"));
    assert!(passed(&run("Lemon.io helps. Lemon.io vets. Lemon.io matches."), "brand_mentions"));
}

#[test]
fn test_brand_descriptor() {
    assert!(!passed(
        &run("Lemon.io developers are vetted freelancers."),
        "brand_descriptor"
    ));
    assert!(passed(
        &run("Lemon.io developers are vetted engineers. Freelancer platforms differ."),
        "brand_descriptor"
    ));
}

#[test]
fn test_subject_mentions_whole_word() {
    let mut report = run("Python python PYTHON Python. Pythonic code.");
    assert!(!passed(&report, "subject_mentions"));
    report = run("Python python PYTHON Python. Hire Python people.");
    assert!(passed(&report, "subject_mentions"));
}

// --- links ---

#[test]
fn test_link_counts() {
    let body = "Text with [a](https://lemon.io/a/) [b](https://blog.lemon.io/b/) \
                [c](https://docs.python.org/) [d](https://www.djangoproject.com/) \
                [e](/relative/path) [f](https://notlemon.io/).";
    let report = run(body);
    assert_eq!(report.metrics.internal_links, 2);
    assert_eq!(report.metrics.external_links, 3);
    assert!(passed(&report, "internal_links"));
    assert!(passed(&report, "external_links"));
}

#[test]
fn test_too_many_internal_links_is_warning() {
    let links: String = (0..5)
        .map(|i| format!("[page {i}](https://lemon.io/p{i}/) "))
        .collect();
    let report = run(&links);
    let check = report.check("internal_links").unwrap();
    assert!(!check.passed);
    assert_eq!(check.severity, Severity::Warning);
}

#[test]
fn test_too_many_external_links_is_issue() {
    let links: String = (0..7)
        .map(|i| format!("[site {i}](https://site{i}.example.com/) "))
        .collect();
    let check = run(&links).check("external_links").cloned().unwrap();
    assert!(!check.passed);
    assert_eq!(check.severity, Severity::Issue);
}

#[test]
fn test_competitor_link_always_fails() {
    let body = "See [a](https://lemon.io/a/), [b](https://lemon.io/b/), \
                [docs](https://docs.python.org/), [pep](https://peps.python.org/), \
                and [them](https://www.toptal.com/python).";
    let report = run(body);
    assert!(passed(&report, "internal_links"));
    assert!(passed(&report, "external_links"));
    let check = report.check("competitor_links").unwrap();
    assert!(!check.passed);
    assert!(check.detail.contains("toptal.com"));
    // Competitor links are not counted as allowed external links.
    assert_eq!(report.metrics.external_links, 2);
}

// --- coverage ---

const TEN_TERMS: [&str; 10] = [
    "django", "flask", "pandas", "numpy", "pytest", "asyncio", "celery", "poetry", "pydantic",
    "sqlalchemy",
];

fn coverage_report(present: usize) -> ValidationReport {
    let mut src = source();
    src.seo_terms = TEN_TERMS.iter().map(|t| term(t, 5)).collect();
    let body = format!("Our stack: {}.", TEN_TERMS[..present].join(", "));
    validate(&article(&body), &src, &ValidationConfig::default())
}

#[test]
fn test_term_coverage_threshold() {
    let nine = coverage_report(9);
    assert_eq!(nine.metrics.term_coverage, Some(0.9));
    assert!(passed(&nine, "term_coverage"));

    let eight = coverage_report(8);
    assert_eq!(eight.metrics.term_coverage, Some(0.8));
    let check = eight.check("term_coverage").unwrap();
    assert!(!check.passed);
    assert_eq!(check.severity, Severity::Issue);
}

#[test]
fn test_term_variants_and_high_importance() {
    let mut src = source();
    src.seo_terms = vec![
        SeoTerm {
            variants: vec!["unit testing".into()],
            ..term("unit tests", 9)
        },
        term("type hints", 10),
        term("virtualenv", 2),
    ];
    let report = validate(
        &article("We value Unit Testing above all."),
        &src,
        &ValidationConfig::default(),
    );
    assert_eq!(report.missing_high_importance, vec!["type hints"]);
    let cov = report.metrics.term_coverage.unwrap();
    assert!((cov - 1.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_terms_with_markup_characters_match_literally() {
    let mut src = source();
    src.seo_terms = vec![term("snake_case", 6), term("__init__", 4)];
    src.templates.keywords = vec!["snake_case names".into()];
    let body = "Python style uses snake_case names and every package has `__init__` files.";

    let report = validate(&article(body), &src, &ValidationConfig::default());
    assert_eq!(report.metrics.term_coverage, Some(1.0));
    assert!(passed(&report, "term_coverage"));
    assert_eq!(report.metrics.keywords_found, 1);

    let persisted = Article {
        body: ensure_html(body),
        ..article(body)
    };
    let again = validate(&persisted, &src, &ValidationConfig::default());
    assert_eq!(again.metrics.term_coverage, Some(1.0));
}

#[test]
fn test_missing_sources_are_vacuous() {
    let report = run(&filler(50));
    for name in ["term_coverage", "keyword_coverage", "header_coverage", "data_freshness"] {
        let check = report.check(name).unwrap();
        assert!(check.passed, "{name}");
        assert!(check.vacuous, "{name}");
    }
    assert_eq!(report.metrics.term_coverage, None);
    assert_eq!(report.metrics.keyword_coverage, None);
}

#[test]
fn test_keyword_coverage_tiers() {
    let keywords: Vec<String> = (0..10).map(|i| format!("keyword phrase {i}")).collect();
    let mut src = source();
    src.templates.keywords = keywords.clone();
    let body = |n: usize| keywords[..n].join(". ");

    let report = validate(&article(&body(7)), &src, &ValidationConfig::default());
    assert!(passed(&report, "keyword_coverage"));
    let report = validate(&article(&body(6)), &src, &ValidationConfig::default());
    assert_eq!(report.check("keyword_coverage").unwrap().severity, Severity::Warning);
    let report = validate(&article(&body(4)), &src, &ValidationConfig::default());
    assert_eq!(report.check("keyword_coverage").unwrap().severity, Severity::Issue);
    assert_eq!(report.metrics.keywords_found, 4);

    src.templates.keywords.truncate(3);
    let report = validate(&article(&body(3)), &src, &ValidationConfig::default());
    assert!(passed(&report, "keyword_coverage"));
}

#[test]
fn test_header_coverage_fuzzy_match() {
    let mut a = article(
        "Text.\n\n## Why companies hire Python developers\n\nA.\n\n\
         ### What a senior Python developer costs\n\nB.\n\n## Unrelated\n\nC.",
    );
    a.selected_headers = vec![
        "Why hire Python developers".into(),
        "Senior Python developer costs".into(),
        "Python interview questions".into(),
        "Remote team time zones".into(),
    ];
    let report = validate(&a, &source(), &ValidationConfig::default());
    assert_eq!(report.metrics.header_coverage, Some(0.5));
    assert!(passed(&report, "header_coverage"));

    a.selected_headers.push("Python frameworks".into());
    a.selected_headers.push("Onboarding checklist".into());
    let report = validate(&a, &source(), &ValidationConfig::default());
    let check = report.check("header_coverage").unwrap();
    assert!(!check.passed);
    assert_eq!(check.severity, Severity::Warning);
}

// --- statistics ---

#[test]
fn test_statistic_attribution() {
    let cited = "Salaries grew 15% according to a [salary survey](https://survey.example.com/).";
    assert!(passed(&run(cited), "statistic_attribution"));

    let far = format!(
        "Salaries grew 15% this year. {} [salary survey](https://survey.example.com/)",
        filler(45)
    );
    let report = run(&far);
    assert_eq!(report.metrics.uncited_statistics, 1);
    assert_eq!(report.check("statistic_attribution").unwrap().severity, Severity::Warning);

    let many = "Growth hit 10%. Costs fell 20%. Hiring rose 30%. Churn was 5%.";
    let report = run(many);
    assert_eq!(report.metrics.statistics, 4);
    let check = report.check("statistic_attribution").unwrap();
    assert!(!check.passed);
    assert_eq!(check.severity, Severity::Issue);
}

#[test]
fn test_footnote_marker_counts_as_citation() {
    assert!(passed(
        &run("About 8.2 million developers use it [1]."),
        "statistic_attribution"
    ));
}

#[test]
fn test_data_freshness() {
    let config = ValidationConfig {
        stale_before_year: Some(2025),
        ..Default::default()
    };
    let report = validate(
        &article("Data from 2019 and 2026. Founded in 1999."),
        &source(),
        &config,
    );
    let check = report.check("data_freshness").unwrap();
    assert_eq!(check.severity, Severity::Warning);
    assert!(check.detail.contains("2019"));
    assert!(!check.detail.contains("2026"));

    let report = validate(&article("Fresh data from 2026."), &source(), &config);
    assert!(passed(&report, "data_freshness"));
}

// --- report-level properties ---

#[test]
fn test_validate_is_pure() {
    let a = article(&format!("Intro.\n\n## Heading\n\n{}", filler(400)));
    let first = validate(&a, &source(), &ValidationConfig::default());
    let second = validate(&a, &source(), &ValidationConfig::default());
    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn test_revalidating_persisted_html_matches() {
    let (article, src) = python_scenario();
    let original = validate(&article, &src, &ValidationConfig::default());
    let persisted = Article {
        body: ensure_html(&article.body),
        ..article
    };
    let again = validate(&persisted, &src, &ValidationConfig::default());
    assert_eq!(original.to_json().unwrap(), again.to_json().unwrap());
}

#[test]
fn test_grade_follows_issue_count() {
    // Short and headerless: word count, header count, brand, subject, links.
    let report = run("Just a few words.");
    assert!(!report.passed);
    assert_eq!(report.issues.len(), 6);
    assert_eq!(report.grade, "D");
}

#[test]
fn test_custom_grade_table_without_touching_checks() {
    let mut config = ValidationConfig::default();
    config.grades.rules.clear();
    config.grades.fallback = "ungraded".into();
    assert_eq!(validate(&article("x"), &source(), &config).grade, "ungraded");
}

#[test]
fn test_validate_with_subset() {
    let checks: Vec<Check> = default_checks()
        .into_iter()
        .filter(|c| c.name == "opening_structure")
        .collect();
    let report = validate_with(&checks, &article("## Heading first"), &source(), &ValidationConfig::default());
    assert_eq!(report.checks.len(), 1);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.grade, "A-");
}

#[test]
fn test_degraded_research_and_notes_reported() {
    let mut a = article("Text.");
    a.research_degraded = true;
    let mut src = source();
    src.notes = vec!["no SEO terms for python-developers".into()];
    let report = validate(&a, &src, &ValidationConfig::default());
    assert!(report.research_degraded);
    assert_eq!(report.notes, src.notes);
    assert!(format_report(&report).contains("note: no SEO terms"));
}

// --- end to end ---

const SELECTED: [&str; 8] = [
    "Why hire Python developers",
    "Skills to look for in Python developers",
    "How much do Python developers cost",
    "Python developer interview questions",
    "Where to find senior Python engineers",
    "Common Python frameworks and libraries",
    "Remote Python teams and time zones",
    "Onboarding your first Python hire",
];

const SECTIONS: [&str; 8] = [
    "Python powers web backends, data science, and machine learning products. Frameworks like \
     Django, Flask, and FastAPI make it quick to build a REST API, while pandas and NumPy handle \
     heavy data work.",
    "Strong candidates write unit tests with pytest, use type hints, and understand asyncio. They \
     keep projects isolated with virtual environments and take code review seriously.",
    "Python developer cost depends on seniority and region. More than 40% of respondents use \
     Python for web development, according to the \
     [Python Developers Survey](https://lp.jetbrains.com/python-developers-survey/).",
    "Ask candidates to design a small service, explain their testing strategy, and walk through a \
     past pull request. Good remote Python developers explain trade-offs clearly.",
    "Job boards are slow. Lemon.io matches you with dedicated Python developers in about 48 hours. \
     Browse our [vetted talent pool](https://lemon.io/hire/) or read \
     [how vetting works](https://lemon.io/how-it-works/).",
    "The official [Python documentation](https://docs.python.org/3/) is the best reference for \
     the standard library. Most teams pair it with Django or FastAPI.",
    "A Python development team spread across time zones needs clear async habits. Python \
     developers for hire through a vetted marketplace usually overlap four hours with your core \
     team.",
    "Give new Python engineers a small first task and a short feedback loop. Teams that work with \
     Lemon.io usually see the first merged pull request in week one.",
];

const INTRO: &str = "Companies that hire Python developers want people who ship reliable code \
                     from day one. Lemon.io connects startups with senior Python developers who \
                     have passed a strict vetting process.";

fn python_scenario() -> (Article, SourceRecord) {
    let mut body = format!("{INTRO}\n\n");
    for (header, text) in SELECTED.iter().zip(SECTIONS) {
        body.push_str(&format!("## {header}\n\n{text}\n\n"));
    }
    let base = Document::parse(&normalize(&body)).word_count;
    let mut remaining = 3000 - base;
    while remaining > 0 {
        let n = remaining.min(60);
        body.push_str(&format!("{}.\n\n", filler(n)));
        remaining -= n;
    }

    let present = [
        "hire python developers",
        "python developers for hire",
        "remote python developers",
        "senior python developers",
        "python developer cost",
        "python engineers",
        "dedicated python developers",
        "python development team",
    ];
    let absent = [
        "offshore python developers",
        "python contractors",
        "best python developers",
        "python programmers for hire",
        "outsource python development",
        "python developer rates",
        "top python developers",
        "python consultants",
        "vetted python developers",
        "find python developers",
        "python coders",
        "python experts",
        "hire django developers",
        "python specialists",
        "contract python developers",
        "python development company",
    ];
    let keywords: Vec<String> = present.iter().chain(absent.iter()).map(|k| k.to_string()).collect();

    let seo_terms = vec![
        term("django", 10),
        term("flask", 9),
        term("data science", 9),
        term("machine learning", 8),
        term("fastapi", 8),
        term("pandas", 7),
        term("numpy", 7),
        SeoTerm {
            variants: vec!["rest apis".into()],
            ..term("rest api", 6)
        },
        SeoTerm {
            variants: vec!["unit testing".into()],
            ..term("unit tests", 6)
        },
        term("code review", 5),
        term("type hints", 5),
        term("asyncio", 4),
        SeoTerm {
            variants: vec!["virtualenv".into()],
            ..term("virtual environments", 3)
        },
        term("pytest", 2),
        term("celery workers", 1),
    ];

    let src = SourceRecord {
        templates: TemplateSet {
            subject: "Python".into(),
            keywords,
            headers: SELECTED.iter().map(|h| h.to_string()).collect(),
            questions: vec!["Is Python hard to learn?".into()],
        },
        seo_terms,
        case_studies: vec![
            CaseStudy {
                company: "SkyFi".into(),
                technologies: vec!["Python".into()],
                ..Default::default()
            },
            CaseStudy {
                company: "Myndy".into(),
                ..Default::default()
            },
        ],
        ..source()
    };

    let mut a = article(&body);
    a.selected_headers = SELECTED.iter().map(|h| h.to_string()).collect();
    (a, src)
}

#[test]
fn test_python_developers_end_to_end() {
    let (article, src) = python_scenario();
    assert_eq!(src.templates.keywords.len(), 24);
    assert_eq!(src.seo_terms.len(), 15);

    let report = validate(&article, &src, &ValidationConfig::default());
    let failures: Vec<&CheckResult> = report.checks.iter().filter(|c| !c.passed).collect();
    assert!(failures.is_empty(), "{failures:#?}");

    assert_eq!(report.metrics.word_count, 3000);
    assert_eq!(report.metrics.h2_count, 8);
    assert_eq!(report.metrics.internal_links, 2);
    assert_eq!(report.metrics.external_links, 2);
    assert_eq!(report.metrics.keywords_found, 8);
    assert_eq!(report.metrics.header_coverage, Some(1.0));
    let coverage = report.metrics.term_coverage.unwrap();
    assert!((coverage - 0.933).abs() < 0.001);
    assert!(report.missing_high_importance.is_empty());
    assert_eq!(report.metrics.uncited_statistics, 0);

    assert!(report.issues.is_empty());
    assert!(report.warnings.is_empty());
    assert!(report.passed);
    assert_eq!(report.grade, "A+");
    assert!(format_report(&report).contains("All checks passed!"));
}
