//! Keyword / header / question templates.
//!
//! Each category lives in `<dir>/<category>.csv`. Only the first column is
//! used, the first row is a header, and blank rows are skipped.

use quill_core::{
    error::QuillError,
    model::{TemplateCategory, TemplateSet},
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

pub struct TemplateStore {
    dir: PathBuf,
    placeholder: String,
    loaded: Mutex<HashMap<TemplateCategory, Vec<String>>>,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>, placeholder: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            placeholder: placeholder.into(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Raw templates for a category, in file order. Cached after the first read.
    pub fn load(&self, category: TemplateCategory) -> Result<Vec<String>, QuillError> {
        let mut loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(rows) = loaded.get(&category) {
            return Ok(rows.clone());
        }
        let path = self.dir.join(category.file_name());
        let rows = read_first_column(&path)?;
        debug!("templates: loaded {} {} from {}", rows.len(), category.as_str(), path.display());
        loaded.insert(category, rows.clone());
        Ok(rows)
    }

    /// Replace every placeholder occurrence with `subject`.
    pub fn render(&self, template: &str, subject: &str) -> String {
        template.replace(&self.placeholder, subject)
    }

    /// All three categories rendered for one subject.
    pub fn for_subject(&self, subject: &str) -> Result<TemplateSet, QuillError> {
        let render_all = |category| -> Result<Vec<String>, QuillError> {
            Ok(self
                .load(category)?
                .iter()
                .map(|t| self.render(t, subject))
                .collect())
        };
        Ok(TemplateSet {
            subject: subject.to_string(),
            keywords: render_all(TemplateCategory::Keywords)?,
            headers: render_all(TemplateCategory::Headers)?,
            questions: render_all(TemplateCategory::Questions)?,
        })
    }
}

fn read_first_column(path: &Path) -> Result<Vec<String>, QuillError> {
    if !path.exists() {
        return Err(QuillError::TemplateLoad(format!(
            "template file not found: {}",
            path.display()
        )));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| QuillError::TemplateLoad(format!("{}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| QuillError::TemplateLoad(format!("{}: {e}", path.display())))?;
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(QuillError::TemplateLoad(format!(
            "{}: missing header row",
            path.display()
        )));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| QuillError::TemplateLoad(format!("{}: {e}", path.display())))?;
        if let Some(first) = record.get(0).map(str::trim).filter(|s| !s.is_empty()) {
            rows.push(first.to_string());
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_templates(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(
            dir.join("keywords.csv"),
            "keyword,volume\nhire {TECH} developers,100\n\n{TECH} developers for hire,50\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("headers.csv"),
            "header\nWhy hire {TECH} developers\n\"Cost of {TECH}, {TECH} rates\"\n",
        )
        .unwrap();
        std::fs::write(dir.join("questions.csv"), "question\nWhat does a {TECH} developer do?\n")
            .unwrap();
    }

    #[test]
    fn test_load_skips_header_and_blank_rows() {
        let tmp = std::env::temp_dir().join("__quill_test_templates_load__");
        let _ = std::fs::remove_dir_all(&tmp);
        write_templates(&tmp);

        let store = TemplateStore::new(&tmp, "{TECH}");
        let keywords = store.load(TemplateCategory::Keywords).unwrap();
        assert_eq!(
            keywords,
            vec!["hire {TECH} developers", "{TECH} developers for hire"]
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn test_for_subject_renders_every_placeholder() {
        let tmp = std::env::temp_dir().join("__quill_test_templates_render__");
        let _ = std::fs::remove_dir_all(&tmp);
        write_templates(&tmp);

        let store = TemplateStore::new(&tmp, "{TECH}");
        let set = store.for_subject("Python").unwrap();
        assert_eq!(set.subject, "Python");
        assert_eq!(set.headers[1], "Cost of Python, Python rates");
        assert_eq!(set.questions, vec!["What does a Python developer do?"]);
        assert!(set.keywords.iter().all(|k| !k.contains("{TECH}")));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn test_load_is_cached() {
        let tmp = std::env::temp_dir().join("__quill_test_templates_cached__");
        let _ = std::fs::remove_dir_all(&tmp);
        write_templates(&tmp);

        let store = TemplateStore::new(&tmp, "{TECH}");
        let first = store.load(TemplateCategory::Questions).unwrap();
        std::fs::remove_file(tmp.join("questions.csv")).unwrap();
        let second = store.load(TemplateCategory::Questions).unwrap();
        assert_eq!(first, second);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn test_missing_file_is_template_error() {
        let store = TemplateStore::new("/nonexistent/__quill_templates__", "{TECH}");
        let err = store.load(TemplateCategory::Headers).unwrap_err();
        assert!(matches!(err, QuillError::TemplateLoad(_)));
        assert!(err.to_string().contains("headers.csv"));
    }

    #[test]
    fn test_empty_file_is_missing_header() {
        let tmp = std::env::temp_dir().join("__quill_test_templates_empty__");
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();
        std::fs::write(tmp.join("keywords.csv"), "").unwrap();

        let store = TemplateStore::new(&tmp, "{TECH}");
        let err = store.load(TemplateCategory::Keywords).unwrap_err();
        assert!(err.to_string().contains("missing header row"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn test_render_custom_placeholder() {
        let store = TemplateStore::new("/unused", "<<T>>");
        assert_eq!(store.render("hire <<T>> devs, <<T>>", "Go"), "hire Go devs, Go");
    }
}
