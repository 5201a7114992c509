//! Directory listing cache, entry ordering, and the filesystem lister that
//! feeds the per-worktree explorer slice.

mod cache;
mod lister;
mod sort;

pub use cache::DirectoryCache;
pub use lister::{DirectoryLister, FsLister};
pub use sort::sort_entries;
