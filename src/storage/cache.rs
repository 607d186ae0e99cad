use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::domain::Node;

/// A fragment as stored in the [`ResolutionCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct CachedFragment {
    /// The parsed content, with reference markers still in place.
    pub content: Node,
    /// Size of the file in bytes.
    pub size_bytes: u64,
    /// Time taken to read and parse the file.
    pub load_time: Duration,
    /// Hex-encoded SHA-256 of the file content.
    pub fingerprint: String,
    /// The file's path with symlinks resolved.
    pub canonical_path: PathBuf,
}

/// Memoises loaded fragments by canonical path.
///
/// The cache is never invalidated implicitly. It persists across validation
/// runs until [`clear`](Self::clear) is called, so a cold-cache measurement
/// must clear it first.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: HashMap<PathBuf, Arc<CachedFragment>>,
}

impl ResolutionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a fragment by canonical path.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Arc<CachedFragment>> {
        self.entries.get(path).cloned()
    }

    /// Stores a fragment, returning the shared handle.
    pub fn insert(&mut self, path: PathBuf, fragment: CachedFragment) -> Arc<CachedFragment> {
        let fragment = Arc::new(fragment);
        self.entries.insert(path, Arc::clone(&fragment));
        fragment
    }

    /// Returns `true` if the path has been loaded.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of cached fragments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The cached paths, in no particular order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    /// Drops every cached fragment.
    pub fn clear(&mut self) {
        tracing::debug!("Clearing {} cached fragments", self.entries.len());
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fragment() -> CachedFragment {
        CachedFragment {
            content: Node::from(json!({"title": "Chapter"})),
            size_bytes: 20,
            load_time: Duration::from_micros(150),
            fingerprint: "abc".to_string(),
            canonical_path: PathBuf::from("/docs/chapter.json"),
        }
    }

    #[test]
    fn insert_then_get() {
        let mut cache = ResolutionCache::new();
        let path = PathBuf::from("/docs/chapter.json");

        let stored = cache.insert(path.clone(), fragment());

        assert!(cache.contains(&path));
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&stored, &cache.get(&path).unwrap()));
    }

    #[test]
    fn clear_empties_the_cache() {
        let mut cache = ResolutionCache::new();
        cache.insert(PathBuf::from("/docs/a.json"), fragment());
        cache.insert(PathBuf::from("/docs/b.json"), fragment());

        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.get(Path::new("/docs/a.json")).is_none());
        assert_eq!(cache.paths().count(), 0);
    }
}
