//! Markdown ↔ HTML conversion.
//!
//! Articles are persisted as HTML but validated as markdown. Validation always
//! goes through `normalize`, so a persisted article re-validates to the same
//! report as the freshly generated text.

use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use std::sync::LazyLock;

static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(p|h[1-6]|ul|ol|li|div|section|article|blockquote)[\s>]")
        .expect("valid regex")
});
static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#)
        .expect("valid regex")
});
static HEADINGS: LazyLock<Vec<(Regex, String)>> = LazyLock::new(|| {
    (1..=6)
        .map(|level| {
            let re = Regex::new(&format!(r"(?is)<h{level}[^>]*>(.*?)</h{level}>"))
                .expect("valid regex");
            (re, "#".repeat(level))
        })
        .collect()
});
static STRONG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(strong|b)\s*>").expect("valid regex"));
static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(em|i)\s*>").expect("valid regex"));
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*<li[^>]*>").expect("valid regex"));
static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static BLOCK_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(p|ul|ol|div|section|article|blockquote|table|tr)\s*>")
        .expect("valid regex")
});
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Whether `text` is already HTML rather than markdown.
pub fn looks_like_html(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('<') && BLOCK_TAG.is_match(trimmed)
}

/// Render markdown to HTML; HTML input is returned unchanged.
pub fn ensure_html(raw: &str) -> String {
    if looks_like_html(raw) {
        return raw.to_string();
    }
    let parser = Parser::new_ext(raw, Options::ENABLE_STRIKETHROUGH);
    let mut out = String::with_capacity(raw.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Convert article HTML back to markdown for validation.
pub fn html_to_markdown(html: &str) -> String {
    let mut text = ANCHOR
        .replace_all(html, |caps: &regex::Captures| {
            let anchor = ANY_TAG.replace_all(&caps[2], "");
            format!("[{}]({})", anchor.trim(), &caps[1])
        })
        .into_owned();
    text = STRONG.replace_all(&text, "**").into_owned();
    text = EMPHASIS.replace_all(&text, "*").into_owned();
    for (re, hashes) in HEADINGS.iter() {
        text = re
            .replace_all(&text, |caps: &regex::Captures| {
                let inner = ANY_TAG.replace_all(&caps[1], "");
                format!("\n\n{hashes} {}\n\n", collapse_whitespace(&inner))
            })
            .into_owned();
    }
    text = LIST_ITEM.replace_all(&text, "\n- ").into_owned();
    text = LINE_BREAK.replace_all(&text, "\n").into_owned();
    text = BLOCK_END.replace_all(&text, "\n\n").into_owned();
    text = ANY_TAG.replace_all(&text, "").into_owned();
    text = decode_entities(&text);

    let trimmed: Vec<&str> = text.lines().map(str::trim).collect();
    let joined = trimmed.join("\n");
    BLANK_RUN.replace_all(&joined, "\n\n").trim().to_string()
}

/// The text every check runs against.
pub fn normalize(raw: &str) -> String {
    html_to_markdown(&ensure_html(raw))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
