//! Repository path normalization
//!
//! Every component of Vellum addresses content by a normalized relative path:
//! no leading or trailing separators, no `.` segments, and `..` resolved
//! without ever climbing above the repository root. The root itself is the
//! empty string.

/// Normalize a repository path.
///
/// Accepts both `/` and `\` as separators.
///
/// ```
/// use vellum_permissions::normalize_path;
///
/// assert_eq!(normalize_path("/docs/./guide/"), "docs/guide");
/// assert_eq!(normalize_path("../../etc/passwd"), "etc/passwd");
/// assert_eq!(normalize_path("/"), "");
/// ```
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Render a normalized path in its public `/`-rooted form.
pub fn to_repository_path(normalized: &str) -> String {
    format!("/{}", normalized)
}

/// Parent of a normalized path, or `None` for the root.
pub fn parent_path(normalized: &str) -> Option<String> {
    if normalized.is_empty() {
        return None;
    }
    match normalized.rsplit_once('/') {
        Some((parent, _)) => Some(parent.to_string()),
        None => Some(String::new()),
    }
}

/// Strict ancestors of a normalized path, nearest first, ending at the root.
pub fn ancestors(normalized: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = parent_path(normalized);
    while let Some(path) = current {
        current = parent_path(&path);
        result.push(path);
    }
    result
}

/// Join a child name onto a normalized directory path.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}
