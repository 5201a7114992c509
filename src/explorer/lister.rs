use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::process::Command;

use crate::collaborators::{CollaboratorError, CollaboratorResult};
use crate::models::{EntryKind, FileEntry, GitStatus};
use crate::utils::is_descendant;

/// Produces the listing of one directory.
#[async_trait::async_trait]
pub trait DirectoryLister: Send + Sync {
    async fn list(&self, path: &str) -> CollaboratorResult<Vec<FileEntry>>;
}

/// Lists the real filesystem and annotates entries with `git status`.
#[derive(Debug, Clone)]
pub struct FsLister {
    git_bin: String,
}

impl Default for FsLister {
    fn default() -> Self {
        Self::new("git")
    }
}

impl FsLister {
    pub fn new(git_bin: impl Into<String>) -> Self {
        Self {
            git_bin: git_bin.into(),
        }
    }

    /// Absolute path -> status for every changed file in the enclosing repo.
    /// Outside a repository this is empty.
    async fn git_statuses(&self, dir: &Path) -> HashMap<String, GitStatus> {
        let toplevel = match Command::new(&self.git_bin)
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(dir)
            .output()
            .await
        {
            Ok(out) if out.status.success() => {
                PathBuf::from(String::from_utf8_lossy(&out.stdout).trim())
            }
            Ok(_) => return HashMap::new(),
            Err(e) => {
                tracing::debug!("git unavailable for {}: {}", dir.display(), e);
                return HashMap::new();
            }
        };

        let output = match Command::new(&self.git_bin)
            .args(["status", "--porcelain", "--untracked-files=all", "--", "."])
            .current_dir(dir)
            .output()
            .await
        {
            Ok(out) if out.status.success() => out.stdout,
            _ => return HashMap::new(),
        };

        parse_porcelain(&String::from_utf8_lossy(&output), &toplevel)
    }
}

#[async_trait::async_trait]
impl DirectoryLister for FsLister {
    async fn list(&self, path: &str) -> CollaboratorResult<Vec<FileEntry>> {
        let dir = Path::new(path);
        let mut reader = tokio::fs::read_dir(dir).await?;
        let statuses = self.git_statuses(dir).await;

        let mut entries = Vec::new();
        while let Some(item) = reader.next_entry().await? {
            let metadata = match tokio::fs::symlink_metadata(item.path()).await {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", item.path().display(), e);
                    continue;
                }
            };
            let file_type = metadata.file_type();
            let kind = if file_type.is_symlink() {
                EntryKind::Symlink
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            let entry_path = item.path().to_string_lossy().to_string();
            let git_status = statuses.get(&entry_path).copied().or_else(|| {
                if kind == EntryKind::Directory
                    && statuses.keys().any(|p| is_descendant(p, &entry_path))
                {
                    Some(GitStatus::Modified)
                } else {
                    None
                }
            });

            entries.push(FileEntry {
                name: item.file_name().to_string_lossy().to_string(),
                path: entry_path,
                kind,
                size: if kind == EntryKind::File {
                    metadata.len()
                } else {
                    0
                },
                permissions: permissions_string(&metadata),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                git_status,
                comment_count: 0,
            });
        }

        if entries.is_empty() && !dir.is_dir() {
            return Err(CollaboratorError::parse(
                "read_dir",
                format!("{path} is not a directory"),
            ));
        }
        Ok(entries)
    }
}

fn parse_porcelain(output: &str, toplevel: &Path) -> HashMap<String, GitStatus> {
    output
        .lines()
        .filter(|line| line.len() > 3 && line.is_char_boundary(2))
        .filter_map(|line| {
            let (code, rest) = line.split_at(2);
            let status = GitStatus::from_porcelain(code)?;
            let rel = rest.trim_start();
            let rel = rel.rsplit(" -> ").next().unwrap_or(rel).trim_matches('"');
            let abs = toplevel.join(rel.trim_end_matches('/'));
            Some((abs.to_string_lossy().to_string(), status))
        })
        .collect()
}

#[cfg(unix)]
fn permissions_string(metadata: &std::fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    let mode = metadata.permissions().mode();
    let mut out = String::with_capacity(9);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(not(unix))]
fn permissions_string(metadata: &std::fs::Metadata) -> String {
    if metadata.permissions().readonly() {
        "r--".to_string()
    } else {
        "rw-".to_string()
    }
}
