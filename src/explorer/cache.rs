use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::sort::sort_entries;
use crate::models::{FileEntry, SortConfig};
use crate::utils::is_descendant;

/// Path-keyed directory listings. Entries survive collapse; only explicit
/// invalidation drops them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct DirectoryCache(BTreeMap<String, Vec<FileEntry>>);

impl DirectoryCache {
    pub fn get(&self, path: &str) -> Option<&[FileEntry]> {
        self.0.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    /// Stores a listing, ordered by `sort`.
    pub fn insert(&mut self, path: String, mut entries: Vec<FileEntry>, sort: &SortConfig) {
        sort_entries(&mut entries, sort);
        self.0.insert(path, entries);
    }

    /// Drops `path` and returns whether it was cached.
    pub fn invalidate(&mut self, path: &str) -> bool {
        self.0.remove(path).is_some()
    }

    /// Drops `path` and every cached descendant. Returns the dropped keys.
    pub fn invalidate_subtree(&mut self, path: &str) -> Vec<String> {
        let dropped: Vec<String> = self
            .0
            .keys()
            .filter(|key| key.as_str() == path || is_descendant(key, path))
            .cloned()
            .collect();
        for key in &dropped {
            self.0.remove(key);
        }
        dropped
    }

    /// Re-orders every cached listing after a sort change.
    pub fn resort(&mut self, sort: &SortConfig) {
        for entries in self.0.values_mut() {
            sort_entries(entries, sort);
        }
    }
}
