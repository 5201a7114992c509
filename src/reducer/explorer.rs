use std::path::Path;

use super::Outcome;
use crate::models::{ExplorerState, FileEntry, ReviewState, SortConfig};
use crate::utils::normalize_path;
use crate::workflow::CommentTarget;

/// Cached directories are shown immediately; anything else is also marked
/// loading so a listing job picks it up.
pub(super) fn expand(explorer: &mut ExplorerState, path: &str) {
    let path = normalize_path(path);
    if !explorer.directory_cache.contains(&path) {
        explorer.loading_paths.insert(path.clone());
    }
    explorer.expanded_paths.insert(path);
}

/// Collapsing keeps the cached listing.
pub(super) fn collapse(explorer: &mut ExplorerState, path: &str) {
    explorer.expanded_paths.remove(&normalize_path(path));
}

pub(super) fn collapse_all(explorer: &mut ExplorerState) {
    let root = explorer.root.clone();
    explorer.expanded_paths.retain(|p| *p == root);
}

fn unresolved_comments_on(review: &ReviewState, root: &str, entry: &FileEntry) -> u32 {
    let count = review
        .sessions
        .iter()
        .flat_map(|s| s.comments.iter())
        .filter(|c| !c.resolved)
        .filter(|c| match &c.target {
            CommentTarget::File { path, .. } => {
                *path == entry.path || Path::new(root).join(path) == Path::new(&entry.path)
            }
            _ => false,
        })
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Stores a listing. The root's listing also becomes the top-level `entries`.
pub(super) fn set_directory_cache(
    explorer: &mut ExplorerState,
    review: &ReviewState,
    path: &str,
    entries: &[FileEntry],
) {
    let path = normalize_path(path);
    let entries: Vec<FileEntry> = entries
        .iter()
        .map(|entry| FileEntry {
            comment_count: unresolved_comments_on(review, &explorer.root, entry),
            ..entry.clone()
        })
        .collect();
    explorer.loading_paths.remove(&path);
    explorer
        .directory_cache
        .insert(path.clone(), entries, &explorer.sort_config);
    if path == explorer.root {
        explorer.entries = explorer
            .directory_cache
            .get(&path)
            .map(<[FileEntry]>::to_vec)
            .unwrap_or_default();
    }
}

/// Drops cached listings. Paths still expanded go back to loading so they
/// are listed again.
pub(super) fn invalidate(explorer: &mut ExplorerState, path: &str, recursive: bool) {
    let path = normalize_path(path);
    let dropped = if recursive {
        explorer.directory_cache.invalidate_subtree(&path)
    } else if explorer.directory_cache.invalidate(&path) {
        vec![path]
    } else {
        Vec::new()
    };
    for key in dropped {
        if explorer.expanded_paths.contains(&key) {
            explorer.loading_paths.insert(key);
        }
    }
}

pub(super) fn load_failed(explorer: &mut ExplorerState, path: &str, error: &str) -> Outcome {
    let path = normalize_path(path);
    explorer.loading_paths.remove(&path);
    explorer.expanded_paths.remove(&path);
    Err(format!("Failed to list {path}: {error}"))
}

pub(super) fn select(explorer: &mut ExplorerState, path: Option<&str>) {
    let next = path.map(normalize_path);
    if next == explorer.selected_path {
        return;
    }
    let previous = std::mem::replace(&mut explorer.selected_path, next);
    explorer.history.visit(previous);
}

pub(super) fn navigate_back(explorer: &mut ExplorerState) {
    if let Some(target) = explorer.history.back.pop() {
        if let Some(current) = explorer.selected_path.replace(target) {
            explorer.history.forward.push(current);
        }
    }
}

pub(super) fn navigate_forward(explorer: &mut ExplorerState) {
    if let Some(target) = explorer.history.forward.pop() {
        if let Some(current) = explorer.selected_path.replace(target) {
            explorer.history.back.push(current);
        }
    }
}

pub(super) fn set_sort_config(explorer: &mut ExplorerState, sort_config: SortConfig) {
    explorer.sort_config = sort_config;
    explorer.directory_cache.resort(&sort_config);
    crate::explorer::sort_entries(&mut explorer.entries, &sort_config);
}
