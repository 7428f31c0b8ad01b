//! Remote directories known to exist.

use parking_lot::Mutex;
use std::collections::HashSet;

/// Set of remote directory paths this connector has already created or
/// confirmed. Safe to share between concurrent uploads.
#[derive(Debug, Default)]
pub struct DirectoryCache {
    known: Mutex<HashSet<String>>,
}

impl DirectoryCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path` is known to exist. Trailing slashes are ignored.
    pub fn contains(&self, path: &str) -> bool {
        self.known.lock().contains(normalize(path))
    }

    /// Returns `true` if the path was not yet known.
    pub fn insert(&self, path: &str) -> bool {
        self.known.lock().insert(normalize(path).to_string())
    }

    /// Number of known directories.
    pub fn len(&self) -> usize {
        self.known.lock().len()
    }

    /// Whether no directory is known yet.
    pub fn is_empty(&self) -> bool {
        self.known.lock().is_empty()
    }

    /// Forget every directory, e.g. after the remote store was wiped.
    pub fn clear(&self) {
        self.known.lock().clear();
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

/// Every ancestor of `path` including itself, shortest first:
/// `a/b/c` yields `a`, `a/b`, `a/b/c`.
pub fn directory_prefixes(path: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        prefixes.push(current.clone());
    }
    prefixes
}
