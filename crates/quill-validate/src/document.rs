//! Structural analysis of a markdown article.

use regex::Regex;
use std::sync::LazyLock;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*\s*$").expect("valid regex"));
static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[([^\]]*)\]\(\s*([^)\s]+)(?:\s+"[^"]*")?\s*\)"#).expect("valid regex")
});
static FOOTNOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\^?\d+\]").expect("valid regex"));
static STATISTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\d+(?:\.\d+)?%|\$\d[\d,]*(?:\.\d+)?|\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?\s*(?:million|billion|trillion)",
    )
    .expect("valid regex")
});
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").expect("valid regex"));

// Prose stripping, applied in order.
static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]+\)").expect("valid regex"));
static LINK_TO_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid regex"));
static HEADER_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+").expect("valid regex"));
static EMPHASIS_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*{1,3}|_{1,3}").expect("valid regex"));
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[-*+][ \t]+").expect("valid regex"));
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\d+\.[ \t]+").expect("valid regex"));
static QUOTE_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*>[ \t]*").expect("valid regex"));
static RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[-*_]{3,}[ \t]*$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    /// Zero-based line index.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub anchor: String,
    pub url: String,
    /// Lowercased host for absolute http(s) URLs.
    pub host: Option<String>,
    /// Byte offset of the opening `[`.
    pub start: usize,
    pub end: usize,
}

/// A numeric claim found in body text.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistic {
    pub text: String,
    pub line: usize,
    /// Index of the whitespace-delimited token containing the match.
    pub token: usize,
}

/// Parsed view of an article. Built once, shared read-only by every check.
#[derive(Debug, Clone)]
pub struct Document {
    pub markdown: String,
    pub headings: Vec<Heading>,
    pub links: Vec<Link>,
    /// Visible prose with markdown syntax removed.
    pub prose: String,
    pub word_count: usize,
    /// Lowercased prose with whitespace collapsed, for mention counts.
    pub plain: String,
    /// Lowercased markdown with link targets dropped and whitespace collapsed.
    /// Keeps `_`, `*` and backticks that `plain` strips.
    pub literal: String,
    pub statistics: Vec<Statistic>,
    /// Token indices of links and footnote markers.
    pub citations: Vec<usize>,
}

impl Document {
    pub fn parse(markdown: &str) -> Self {
        let token_starts = token_starts(markdown);
        let token_at = |offset: usize| token_starts.partition_point(|&s| s <= offset).saturating_sub(1);

        let headings = markdown
            .lines()
            .enumerate()
            .filter_map(|(line, text)| {
                let caps = HEADING.captures(text.trim_end())?;
                Some(Heading {
                    level: caps[1].len() as u8,
                    text: caps[2].replace(['*', '`'], "").trim().to_string(),
                    line,
                })
            })
            .collect();

        let links: Vec<Link> = LINK
            .captures_iter(markdown)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                if markdown[..whole.start()].ends_with('!') {
                    return None;
                }
                let url = caps[2].to_string();
                Some(Link {
                    anchor: caps[1].trim().to_string(),
                    host: host_of(&url),
                    url,
                    start: whole.start(),
                    end: whole.end(),
                })
            })
            .collect();

        let mut citations: Vec<usize> = links
            .iter()
            .filter(|l| l.host.is_some())
            .map(|l| token_at(l.start))
            .collect();
        citations.extend(FOOTNOTE.find_iter(markdown).map(|m| token_at(m.start())));
        citations.sort_unstable();
        citations.dedup();

        let mut statistics = Vec::new();
        let mut offset = 0;
        for (line, text) in markdown.split('\n').enumerate() {
            if !text.trim_start().starts_with('#') {
                for m in STATISTIC.find_iter(text) {
                    let at = offset + m.start();
                    if links.iter().any(|l| l.start <= at && at < l.end && !within_anchor(l, markdown, at)) {
                        continue;
                    }
                    statistics.push(Statistic {
                        text: m.as_str().to_string(),
                        line,
                        token: token_at(at),
                    });
                }
            }
            offset += text.len() + 1;
        }

        let prose = prose_text(markdown);
        let word_count = prose.split_whitespace().count();
        let plain = collapse_lower(&prose);
        let without_images = IMAGE.replace_all(markdown, "");
        let literal = collapse_lower(&LINK_TO_ANCHOR.replace_all(&without_images, "$1"));

        Self {
            markdown: markdown.to_string(),
            headings,
            links,
            prose,
            word_count,
            plain,
            literal,
            statistics,
            citations,
        }
    }

    /// Case-insensitive phrase presence, in the prose or in the literal text.
    pub fn contains_phrase(&self, phrase: &str) -> bool {
        let phrase = collapse_lower(phrase);
        !phrase.is_empty() && (self.plain.contains(&phrase) || self.literal.contains(&phrase))
    }

    /// Headings at `level`.
    pub fn headings_at(&self, level: u8) -> impl Iterator<Item = &Heading> {
        self.headings.iter().filter(move |h| h.level == level)
    }

    /// Distinct four-digit years in the prose, ascending.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = YEAR
            .captures_iter(&self.prose)
            .filter_map(|c| c[1].parse().ok())
            .collect();
        years.sort_unstable();
        years.dedup();
        years
    }
}

/// Strip markdown the way the SEO tool counts words: visible prose only.
pub fn prose_text(markdown: &str) -> String {
    let text = IMAGE.replace_all(markdown, "");
    let text = LINK_TO_ANCHOR.replace_all(&text, "$1");
    let text = HEADER_MARK.replace_all(&text, "");
    let text = EMPHASIS_MARK.replace_all(&text, "");
    let text = BULLET.replace_all(&text, "");
    let text = NUMBERED.replace_all(&text, "");
    let text = QUOTE_MARK.replace_all(&text, "");
    let text = text.replace('`', "");
    RULE.replace_all(&text, "").into_owned()
}

fn collapse_lower(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Count whole-word, case-insensitive occurrences of `needle` in `haystack`.
///
/// `haystack` is expected to be lowercase already.
pub fn count_mentions(haystack: &str, needle: &str) -> usize {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return 0;
    }
    haystack
        .match_indices(&needle)
        .filter(|(at, m)| {
            let before = haystack[..*at].chars().next_back();
            let after = haystack[at + m.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
        .count()
}

/// Lowercased host of an absolute http(s) URL.
pub fn host_of(url: &str) -> Option<String> {
    let lower = url.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?.split(':').next()?;
    (!host.is_empty()).then(|| host.to_string())
}

/// `host` is `domain` or one of its subdomains.
pub fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim().trim_start_matches("www.").to_ascii_lowercase();
    !domain.is_empty()
        && (host == domain || host.strip_suffix(&domain).is_some_and(|p| p.ends_with('.')))
}

fn token_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut in_token = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_token = false;
        } else if !in_token {
            starts.push(i);
            in_token = true;
        }
    }
    starts
}

/// Whether byte `at` inside link `l` falls in its anchor text rather than its URL.
fn within_anchor(l: &Link, markdown: &str, at: usize) -> bool {
    markdown[l.start..l.end]
        .find("](")
        .is_some_and(|split| at < l.start + split)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings() {
        let doc = Document::parse("Intro text.\n\n## **Why** Rust\n\n### Details ###\n#no space\n####### seven");
        assert_eq!(doc.headings.len(), 2);
        assert_eq!(doc.headings[0], Heading { level: 2, text: "Why Rust".into(), line: 2 });
        assert_eq!(doc.headings[1].text, "Details");
        assert_eq!(doc.headings_at(2).count(), 1);
    }

    #[test]
    fn test_links_and_hosts() {
        let doc = Document::parse(
            "See [docs](https://www.Python.org/about/) and [hire](https://lemon.io/hire/) \
             but not ![img](https://x.com/a.png) or [rel](/pricing).",
        );
        assert_eq!(doc.links.len(), 3);
        assert_eq!(doc.links[0].host.as_deref(), Some("www.python.org"));
        assert_eq!(doc.links[1].anchor, "hire");
        assert_eq!(doc.links[2].host, None);
    }

    #[test]
    fn test_host_matching() {
        assert!(host_matches("lemon.io", "lemon.io"));
        assert!(host_matches("blog.lemon.io", "lemon.io"));
        assert!(!host_matches("notlemon.io", "lemon.io"));
        assert!(host_matches("www.toptal.com", "toptal.com"));
        assert!(!host_matches("example.com", ""));
        assert_eq!(host_of("https://user@Example.com:8080/x"), Some("example.com".into()));
        assert_eq!(host_of("mailto:a@b.c"), None);
    }

    #[test]
    fn test_prose_word_count_strips_markup() {
        let md = "## Heading words\n\n\
                  **Bold** and _italic_ text with a [link anchor](https://example.com/a/b/c).\n\n\
                  - bullet one\n\
                  1. numbered two\n\
                  > quoted three\n\
                  ---\n\
                  ![alt text here](https://example.com/i.png) `code`";
        let doc = Document::parse(md);
        // Heading words(2) + "Bold and italic text with a link anchor."(8)
        // + bullet one(2) + numbered two(2) + quoted three(2) + code(1)
        assert_eq!(doc.word_count, 17);
        assert!(doc.plain.contains("bold and italic text"));
        assert!(!doc.plain.contains("example.com"));
        assert!(!doc.literal.contains("example.com"));
    }

    #[test]
    fn test_contains_phrase_keeps_literal_markup() {
        let doc = Document::parse(
            "Python style uses snake_case names and every package has __init__ files.\n\n\
             We **hire Python** developers. See [the `asyncio` docs](https://docs.python.org/asyncio).",
        );
        assert!(doc.contains_phrase("snake_case"));
        assert!(doc.contains_phrase("__INIT__"));
        assert!(doc.contains_phrase("hire python developers"));
        assert!(doc.contains_phrase("`asyncio`"));
        assert!(!doc.contains_phrase("docs.python.org"));
        assert!(!doc.contains_phrase("  "));
    }

    #[test]
    fn test_count_mentions_whole_words() {
        let plain = "go is great. google uses go, and go-to tools are good.";
        assert_eq!(count_mentions(plain, "Go"), 3);
        assert_eq!(count_mentions("lemon.io and lemon.io's team", "Lemon.io"), 2);
        assert_eq!(count_mentions("c++ and c++20", "C++"), 1);
        assert_eq!(count_mentions("anything", " "), 0);
    }

    #[test]
    fn test_statistics_and_citations() {
        let md = "## 50% of headers are skipped\n\
                  Salaries rose 12% last year ([survey](https://survey.example.com/2030)).\n\
                  The market is worth $4.5 billion and 1,200,000 people use it.\n\
                  About 3.5 million developers[^1] agree.";
        let doc = Document::parse(md);
        let found: Vec<&str> = doc.statistics.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(found, vec!["12%", "$4.5", "1,200,000", "3.5 million"]);
        assert_eq!(doc.statistics[0].line, 1);
        assert_eq!(doc.citations.len(), 2);
        // The statistic and its link share a sentence.
        assert!(doc.citations[0] - doc.statistics[0].token <= 3);
    }

    #[test]
    fn test_numbers_in_urls_are_not_statistics() {
        let doc = Document::parse("Read [the report](https://example.com/q?share=25%25&n=1,000).");
        assert!(doc.statistics.is_empty());
        let doc = Document::parse("Read [42% of teams](https://example.com/report).");
        assert_eq!(doc.statistics.len(), 1);
    }

    #[test]
    fn test_years() {
        let doc = Document::parse("Data from 2019 and 2024, again 2019, not 12019 or 1999.");
        assert_eq!(doc.years(), vec![2019, 2024]);
    }
}
