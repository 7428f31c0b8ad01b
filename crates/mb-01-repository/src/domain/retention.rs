//! Retention rules for cleanup of a remote topic directory.

use crate::error::RepositoryError;

/// Outcome of a cleanup pass over one remote directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Remote paths removed.
    pub deleted: Vec<String>,
    /// Remote paths whose deletion failed; the pass continued past them.
    pub failed: Vec<(String, RepositoryError)>,
}

impl CleanupReport {
    /// Whether every selected path was deleted.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Names selected for deletion. An empty cutoff selects everything;
/// otherwise a name is selected when its extension-less stem sorts strictly
/// before the cutoff. Timestamps are fixed width, so lexical order is
/// chronological order.
pub fn select_expired<'a>(names: &'a [String], cutoff: &str) -> Vec<&'a str> {
    names
        .iter()
        .map(String::as_str)
        .filter(|name| cutoff.is_empty() || stem(name) < cutoff)
        .collect()
}

fn stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(index) => &name[..index],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec![
            "2025-01-01-00-00-00-000000-0000.json".to_string(),
            "2025-01-01-00-00-01-000000-0000.json".to_string(),
            "2025-01-01-00-00-02-000000-0000.bin".to_string(),
        ]
    }

    #[test]
    fn test_empty_cutoff_selects_all() {
        let names = names();
        assert_eq!(select_expired(&names, "").len(), 3);
    }

    #[test]
    fn test_cutoff_is_exclusive() {
        let names = names();
        let selected = select_expired(&names, "2025-01-01-00-00-01-000000-0000");
        assert_eq!(selected, vec!["2025-01-01-00-00-00-000000-0000.json"]);
    }

    #[test]
    fn test_stem_without_extension() {
        assert_eq!(stem("abc"), "abc");
        assert_eq!(stem(".hidden"), ".hidden");
        assert_eq!(stem("a.b.json"), "a.b");
    }
}
