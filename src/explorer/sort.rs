use std::cmp::Ordering;

use crate::models::{FileEntry, SortConfig, SortDirection, SortField};

/// Orders entries in place. Directories stay on top regardless of direction
/// when `directories_first` is set; ties fall back to the path so the order
/// is total.
pub fn sort_entries(entries: &mut [FileEntry], config: &SortConfig) {
    entries.sort_by(|a, b| compare(a, b, config));
}

fn compare(a: &FileEntry, b: &FileEntry, config: &SortConfig) -> Ordering {
    if config.directories_first {
        match (a.is_dir(), b.is_dir()) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
    }

    let by_field = match config.field {
        SortField::Name => compare_names(&a.name, &b.name),
        SortField::Size => a.size.cmp(&b.size),
        SortField::Modified => a.modified.cmp(&b.modified),
        SortField::Kind => a
            .kind
            .cmp(&b.kind)
            .then_with(|| extension(&a.name).cmp(extension(&b.name))),
    };
    let by_field = match config.direction {
        SortDirection::Asc => by_field,
        SortDirection::Desc => by_field.reverse(),
    };
    by_field.then_with(|| a.path.cmp(&b.path))
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => "",
        Some(i) => &name[i + 1..],
    }
}
