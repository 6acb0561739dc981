//! SEO term recommendations per slug.
//!
//! `<dir>/<slug>.json` (scraper output) wins over `<dir>/<slug>.csv` (manual
//! export). Terms come back sorted by importance, highest first.

use quill_core::{error::QuillError, model::SeoTerm};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::cache::JsonCache;

const DEFAULT_IMPORTANCE: u8 = 5;
const DEFAULT_USES_MIN: u32 = 1;
const DEFAULT_USES_MAX: u32 = 2;

/// Cached term as written by the scraper; numeric fields may be strings.
#[derive(Deserialize)]
struct RawTerm {
    term: String,
    #[serde(default)]
    variants: Vec<String>,
    #[serde(default)]
    importance: Value,
    #[serde(default, alias = "typical_uses_min")]
    uses_min: Value,
    #[serde(default, alias = "typical_uses_max")]
    uses_max: Value,
}

/// Load terms for `slug`. Missing data is an empty list, malformed data an error.
pub fn load(dir: &Path, slug: &str) -> Result<Vec<SeoTerm>, QuillError> {
    let cache = JsonCache::new(dir);
    let mut terms = if let Some(raw) = cache.read::<Vec<RawTerm>>(slug)? {
        info!("seo terms: {} terms for {slug} (json)", raw.len());
        raw.into_iter().filter_map(normalize).collect()
    } else {
        let csv_path = dir.join(format!("{slug}.csv"));
        if !csv_path.exists() {
            warn!("seo terms: no data for {slug} in {}", dir.display());
            return Ok(Vec::new());
        }
        let terms = read_csv(&csv_path)?;
        info!("seo terms: {} terms for {slug} (csv)", terms.len());
        terms
    };
    terms.sort_by(|a, b| b.importance.cmp(&a.importance));
    Ok(terms)
}

/// Store terms for `slug` in the JSON cache.
pub fn cache(dir: &Path, slug: &str, terms: &[SeoTerm]) -> Result<(), QuillError> {
    JsonCache::new(dir).write(slug, &terms)
}

fn normalize(raw: RawTerm) -> Option<SeoTerm> {
    let term = raw.term.trim().to_string();
    if term.is_empty() {
        return None;
    }
    let uses_min = value_u32(&raw.uses_min).unwrap_or(DEFAULT_USES_MIN);
    Some(SeoTerm {
        term,
        variants: raw
            .variants
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect(),
        importance: value_importance(&raw.importance),
        uses_min,
        uses_max: value_u32(&raw.uses_max).unwrap_or(DEFAULT_USES_MAX.max(uses_min)),
    })
}

fn value_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_importance(value: &Value) -> u8 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|n| n.min(10) as u8)
            .unwrap_or(DEFAULT_IMPORTANCE),
        Value::String(s) => parse_importance(s),
        _ => DEFAULT_IMPORTANCE,
    }
}

/// `"8"` or `"8/10"` → 8, capped at 10.
pub fn parse_importance(s: &str) -> u8 {
    s.split('/')
        .next()
        .and_then(|n| n.trim().parse::<u32>().ok())
        .map(|n| n.min(10) as u8)
        .unwrap_or(DEFAULT_IMPORTANCE)
}

fn read_csv(path: &Path) -> Result<Vec<SeoTerm>, QuillError> {
    let err = |e: csv::Error| QuillError::DataLoad(format!("{}: {e}", path.display()));
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(err)?;
    let columns: HashMap<String, usize> = reader
        .headers()
        .map_err(err)?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim_start_matches('\u{feff}').trim().to_string(), i))
        .collect();

    let pick = |record: &csv::StringRecord, names: &[&str]| -> String {
        names
            .iter()
            .filter_map(|name| columns.get(*name))
            .filter_map(|&i| record.get(i))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .unwrap_or_default()
            .to_string()
    };

    let mut terms = Vec::new();
    for record in reader.records() {
        let record = record.map_err(err)?;
        let term = pick(&record, &["Primary Variant", "term", "Term"]);
        if term.is_empty() {
            continue;
        }
        let variants = pick(&record, &["Secondary Variants", "variants"])
            .split(';')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .collect();
        let importance = pick(&record, &["Importance", "importance"]);
        let uses_min = pick(&record, &["Typical Uses Min"])
            .parse()
            .unwrap_or(DEFAULT_USES_MIN);
        let uses_max = pick(&record, &["Typical Uses Max"])
            .parse()
            .unwrap_or(DEFAULT_USES_MAX.max(uses_min));
        terms.push(SeoTerm {
            term,
            variants,
            importance: if importance.is_empty() {
                DEFAULT_IMPORTANCE
            } else {
                parse_importance(&importance)
            },
            uses_min,
            uses_max,
        });
    }
    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_dir(name: &str) -> std::path::PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();
        tmp
    }

    #[test]
    fn test_parse_importance() {
        assert_eq!(parse_importance("8"), 8);
        assert_eq!(parse_importance("7/10"), 7);
        assert_eq!(parse_importance("42"), 10);
        assert_eq!(parse_importance("high"), 5);
    }

    #[test]
    fn test_csv_export_sorted_by_importance() {
        let tmp = tmp_dir("__quill_test_seo_csv__");
        std::fs::write(
            tmp.join("python-developers.csv"),
            "\u{feff}Primary Variant,Secondary Variants,Importance,Typical Uses Min,Typical Uses Max,Uses\n\
             scripting,,3,1,2,0\n\
             django,django framework; django apps,9/10,2,5,1\n\
             ,,,,,\n\
             data science,,6,,,0\n",
        )
        .unwrap();

        let terms = load(&tmp, "python-developers").unwrap();
        let names: Vec<&str> = terms.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(names, vec!["django", "data science", "scripting"]);
        assert_eq!(terms[0].variants, vec!["django framework", "django apps"]);
        assert_eq!(terms[0].importance, 9);
        assert_eq!((terms[0].uses_min, terms[0].uses_max), (2, 5));
        assert_eq!((terms[1].uses_min, terms[1].uses_max), (1, 2));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn test_json_preferred_over_csv() {
        let tmp = tmp_dir("__quill_test_seo_json__");
        std::fs::write(tmp.join("go-developers.csv"), "term,Importance\nfrom csv,9\n").unwrap();
        std::fs::write(
            tmp.join("go-developers.json"),
            r#"[
                {"term": "goroutines", "variants": ["goroutine"], "importance": "7", "typical_uses_min": "1", "typical_uses_max": 3},
                {"term": "concurrency", "importance": 9},
                {"term": "  "}
            ]"#,
        )
        .unwrap();

        let terms = load(&tmp, "go-developers").unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].term, "concurrency");
        assert_eq!(terms[1].uses_max, 3);
        assert!(terms.iter().all(|t| t.term != "from csv"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn test_missing_data_is_empty() {
        let tmp = tmp_dir("__quill_test_seo_missing__");
        assert!(load(&tmp, "rust-developers").unwrap().is_empty());
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn test_cache_then_load() {
        let tmp = tmp_dir("__quill_test_seo_cache__");
        let terms = vec![SeoTerm {
            term: "ownership".into(),
            variants: vec!["borrow checker".into()],
            importance: 8,
            uses_min: 1,
            uses_max: 4,
        }];
        cache(&tmp, "rust-developers", &terms).unwrap();
        assert_eq!(load(&tmp, "rust-developers").unwrap(), terms);
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
