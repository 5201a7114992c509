use sha2::{Digest, Sha256};
use std::path::Path;

/// Truncates a string to max_chars characters, appending "..." if truncated.
/// Safe for UTF-8 multi-byte characters.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncate_at = max_chars.saturating_sub(3);
        let byte_index = s
            .char_indices()
            .nth(truncate_at)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        format!("{}...", &s[..byte_index])
    }
}

/// Keeps at most `max_bytes` from the end of `buffer`, cutting on a char boundary.
pub fn keep_tail(buffer: &mut String, max_bytes: usize) {
    if buffer.len() <= max_bytes {
        return;
    }
    let mut cut = buffer.len() - max_bytes;
    while !buffer.is_char_boundary(cut) {
        cut += 1;
    }
    buffer.drain(..cut);
}

/// Strips trailing separators so "/p/src/" and "/p/src" key the same cache entry.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.len() > 1 {
        let stripped = trimmed.trim_end_matches('/');
        if stripped.is_empty() {
            "/".to_string()
        } else {
            stripped.to_string()
        }
    } else {
        trimmed.to_string()
    }
}

/// True when `path` lies strictly below `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return path.len() > 1 && path.starts_with('/');
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Compute a deterministic 8-char hex hash from an absolute path.
/// Used to derive stable project ids from project directories.
pub fn compute_path_hash(path: &Path) -> String {
    let abs_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let path_str = abs_path.to_string_lossy();

    let mut hasher = Sha256::new();
    hasher.update(path_str.as_bytes());
    let result = hasher.finalize();

    hex::encode(&result[..4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_str_short_string() {
        assert_eq!(truncate_str("short", 20), "short");
    }

    #[test]
    fn truncate_str_long_string() {
        assert_eq!(truncate_str("hello world, this is long", 10), "hello w...");
    }

    #[test]
    fn truncate_str_multibyte() {
        let s = "日本語のテキストです";
        let result = truncate_str(s, 6);
        assert_eq!(result, "日本語...");
    }

    #[test]
    fn keep_tail_drops_oldest_bytes() {
        let mut buffer = "abcdefgh".to_string();
        keep_tail(&mut buffer, 3);
        assert_eq!(buffer, "fgh");
    }

    #[test]
    fn keep_tail_respects_char_boundaries() {
        let mut buffer = "aé日".to_string();
        keep_tail(&mut buffer, 4);
        assert_eq!(buffer, "日");
    }

    #[test]
    fn normalize_path_strips_trailing_slash() {
        assert_eq!(normalize_path("/p/src/"), "/p/src");
        assert_eq!(normalize_path("/p/src"), "/p/src");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("///"), "/");
    }

    #[test]
    fn is_descendant_requires_separator() {
        assert!(is_descendant("/p/src/lib", "/p/src"));
        assert!(!is_descendant("/p/srcx", "/p/src"));
        assert!(!is_descendant("/p/src", "/p/src"));
        assert!(is_descendant("/etc", "/"));
    }

    #[test]
    fn compute_path_hash_is_deterministic() {
        let a = compute_path_hash(Path::new("/nonexistent/devdeck-a"));
        let b = compute_path_hash(Path::new("/nonexistent/devdeck-a"));
        let c = compute_path_hash(Path::new("/nonexistent/devdeck-b"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 8);
    }
}
