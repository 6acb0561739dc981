//! Per-stage output cache keyed by (slug, stage, input hash).

use quill_core::error::{QuillError, Stage};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// `<root>/<slug>/<stage>-<hash>.json`.
///
/// A disabled cache never reads but still writes, so a `--no-cache` run
/// refreshes the entries later runs will hit.
#[derive(Debug, Clone)]
pub struct StageCache {
    root: PathBuf,
    read_enabled: bool,
}

impl StageCache {
    pub fn new(root: impl Into<PathBuf>, read_enabled: bool) -> Self {
        Self {
            root: root.into(),
            read_enabled,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hex SHA-256 over the parts, each length-prefixed so boundaries are unambiguous.
    pub fn key(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    fn path(&self, slug: &str, stage: Stage, key: &str) -> PathBuf {
        self.root
            .join(slug)
            .join(format!("{}-{}.json", stage.as_str(), &key[..key.len().min(16)]))
    }

    /// Cached output, or `None` on a miss. Unreadable entries count as misses.
    pub fn get<T: DeserializeOwned>(&self, slug: &str, stage: Stage, key: &str) -> Option<T> {
        if !self.read_enabled {
            return None;
        }
        let path = self.path(slug, stage, key);
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(value) => {
                debug!("{slug}: {stage} cache hit");
                Some(value)
            }
            Err(e) => {
                warn!("{slug}: ignoring corrupt cache entry {}: {e}", path.display());
                None
            }
        }
    }

    pub fn put<T: Serialize>(
        &self,
        slug: &str,
        stage: Stage,
        key: &str,
        value: &T,
    ) -> Result<(), QuillError> {
        let path = self.path(slug, stage, key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_stable_and_boundary_sensitive() {
        assert_eq!(StageCache::key(&["a", "bc"]), StageCache::key(&["a", "bc"]));
        assert_ne!(StageCache::key(&["a", "bc"]), StageCache::key(&["ab", "c"]));
        assert_eq!(StageCache::key(&["x"]).len(), 64);
    }

    #[test]
    fn test_get_put_and_disabled_reads() {
        let tmp = std::env::temp_dir().join("__quill_test_stage_cache__");
        let _ = std::fs::remove_dir_all(&tmp);
        let cache = StageCache::new(&tmp, true);
        let key = StageCache::key(&["prompt"]);

        assert!(cache
            .get::<Vec<String>>("python-developers", Stage::HeaderSelection, &key)
            .is_none());
        cache
            .put(
                "python-developers",
                Stage::HeaderSelection,
                &key,
                &vec!["Why Python".to_string()],
            )
            .unwrap();
        let hit: Option<Vec<String>> = cache.get("python-developers", Stage::HeaderSelection, &key);
        assert_eq!(hit, Some(vec!["Why Python".to_string()]));

        // Other stages and keys miss.
        assert!(cache
            .get::<Vec<String>>("python-developers", Stage::Writing, &key)
            .is_none());
        let other = StageCache::key(&["other prompt"]);
        assert!(cache
            .get::<Vec<String>>("python-developers", Stage::HeaderSelection, &other)
            .is_none());

        let bypass = StageCache::new(&tmp, false);
        assert!(bypass
            .get::<Vec<String>>("python-developers", Stage::HeaderSelection, &key)
            .is_none());
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let tmp = std::env::temp_dir().join("__quill_test_stage_cache_corrupt__");
        let _ = std::fs::remove_dir_all(&tmp);
        let cache = StageCache::new(&tmp, true);
        let key = StageCache::key(&["p"]);
        let path = cache.path("go-developers", Stage::Research, &key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{oops").unwrap();
        assert!(cache
            .get::<Vec<String>>("go-developers", Stage::Research, &key)
            .is_none());
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
