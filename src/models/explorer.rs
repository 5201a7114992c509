use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::explorer::DirectoryCache;
use crate::utils::normalize_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Directory => "directory",
            EntryKind::File => "file",
            EntryKind::Symlink => "symlink",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitStatus {
    Modified,
    Added,
    Deleted,
    Renamed,
    Untracked,
    Ignored,
    Conflicted,
}

impl GitStatus {
    /// Parses the two-letter XY code of `git status --porcelain`.
    pub fn from_porcelain(code: &str) -> Option<Self> {
        let code = code.trim();
        match code {
            "" => None,
            "??" => Some(GitStatus::Untracked),
            "!!" => Some(GitStatus::Ignored),
            c if c.contains('U') || c == "AA" || c == "DD" => Some(GitStatus::Conflicted),
            c if c.contains('R') => Some(GitStatus::Renamed),
            c if c.contains('A') => Some(GitStatus::Added),
            c if c.contains('D') => Some(GitStatus::Deleted),
            c if c.contains('M') || c.contains('T') => Some(GitStatus::Modified),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    #[serde(default)]
    pub size: u64,
    /// Unix mode string such as `rwxr-xr-x`.
    #[serde(default)]
    pub permissions: String,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub git_status: Option<GitStatus>,
    #[serde(default)]
    pub comment_count: u32,
}

impl FileEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Name,
    Size,
    Modified,
    Kind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    #[serde(default)]
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default = "default_directories_first")]
    pub directories_first: bool,
}

fn default_directories_first() -> bool {
    true
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            field: SortField::Name,
            direction: SortDirection::Asc,
            directories_first: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NavigationHistory {
    #[serde(default)]
    pub back: Vec<String>,
    #[serde(default)]
    pub forward: Vec<String>,
}

impl NavigationHistory {
    /// Records a departure from `from`; a fresh navigation drops the forward stack.
    pub fn visit(&mut self, from: Option<String>) {
        if let Some(from) = from {
            if self.back.last() != Some(&from) {
                self.back.push(from);
            }
        }
        self.forward.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExplorerState {
    #[serde(default)]
    pub root: String,
    #[serde(default)]
    pub entries: Vec<FileEntry>,
    #[serde(default)]
    pub expanded_paths: BTreeSet<String>,
    #[serde(default)]
    pub directory_cache: DirectoryCache,
    #[serde(default)]
    pub loading_paths: BTreeSet<String>,
    #[serde(default)]
    pub selected_path: Option<String>,
    #[serde(default)]
    pub sort_config: SortConfig,
    #[serde(default)]
    pub history: NavigationHistory,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExplorerState {
    /// A fresh explorer rooted at `root`, with the root listing requested.
    pub fn new(root: &str) -> Self {
        let root = normalize_path(root);
        let mut state = Self {
            root: root.clone(),
            ..Self::default()
        };
        if !root.is_empty() {
            state.expanded_paths.insert(root.clone());
            state.loading_paths.insert(root);
        }
        state
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded_paths.contains(path)
    }

    pub fn is_loading(&self, path: &str) -> bool {
        self.loading_paths.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn porcelain_codes_map_to_git_status() {
        assert_eq!(GitStatus::from_porcelain(" M"), Some(GitStatus::Modified));
        assert_eq!(GitStatus::from_porcelain("??"), Some(GitStatus::Untracked));
        assert_eq!(GitStatus::from_porcelain("A "), Some(GitStatus::Added));
        assert_eq!(GitStatus::from_porcelain("UU"), Some(GitStatus::Conflicted));
        assert_eq!(GitStatus::from_porcelain("R "), Some(GitStatus::Renamed));
        assert_eq!(GitStatus::from_porcelain("  "), None);
    }

    #[test]
    fn sort_config_defaults_to_name_ascending_directories_first() {
        let config: SortConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SortConfig::default());
        assert!(config.directories_first);
    }

    #[test]
    fn history_visit_clears_forward() {
        let mut history = NavigationHistory {
            back: vec![],
            forward: vec!["/p/b".to_string()],
        };
        history.visit(Some("/p/a".to_string()));
        history.visit(Some("/p/a".to_string()));
        assert_eq!(history.back, vec!["/p/a".to_string()]);
        assert!(history.forward.is_empty());
    }

    #[test]
    fn empty_root_requests_nothing() {
        let state = ExplorerState::new("");
        assert!(state.expanded_paths.is_empty());
        assert!(state.loading_paths.is_empty());
    }
}
