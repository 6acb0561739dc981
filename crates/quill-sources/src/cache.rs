//! Read-through JSON file cache, one file per slug.

use quill_core::error::QuillError;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// `<root>/<slug>.json` files.
#[derive(Debug, Clone)]
pub struct JsonCache {
    root: PathBuf,
}

impl JsonCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, slug: &str) -> PathBuf {
        self.root.join(format!("{slug}.json"))
    }

    /// Cached value for `slug`, or `None` when absent.
    pub fn read<T: DeserializeOwned>(&self, slug: &str) -> Result<Option<T>, QuillError> {
        let path = self.path(slug);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).map_err(|e| {
            QuillError::DataLoad(format!("unreadable cache file {}: {e}", path.display()))
        })?;
        let value = serde_json::from_str(&text).map_err(|e| {
            QuillError::DataLoad(format!("corrupt cache file {}: {e}", path.display()))
        })?;
        Ok(Some(value))
    }

    /// Write `value` for `slug`, replacing any previous entry.
    pub fn write<T: Serialize>(&self, slug: &str, value: &T) -> Result<(), QuillError> {
        let path = self.path(slug);
        let err = |e: std::io::Error| {
            QuillError::DataLoad(format!("cannot write cache file {}: {e}", path.display()))
        };
        std::fs::create_dir_all(&self.root).map_err(err)?;
        let text = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, text).map_err(err)?;
        std::fs::rename(&tmp, &path).map_err(err)?;
        Ok(())
    }
}
