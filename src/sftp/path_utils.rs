//! Path utilities for SFTP operations
//!
//! Remote SFTP paths always use `/` as separator (per SFTP protocol),
//! even when the server runs on Windows.

/// Check if a remote SFTP path is absolute.
pub fn is_absolute_remote_path(path: &str) -> bool {
    path.starts_with('/')
}

/// Join remote SFTP path components using `/` separator.
///
/// No resolution is performed: `..` and `.` are kept as-is.
pub fn join_remote_path(base: &str, component: &str) -> String {
    if base.is_empty() {
        component.to_string()
    } else if base.ends_with('/') {
        format!("{}{}", base, component)
    } else {
        format!("{}/{}", base, component)
    }
}

/// Final component of a remote path (`""` for the root).
pub fn remote_file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or("")
}

/// Parent of a remote path, or `None` for the root and bare names.
pub fn parent_remote_path(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        _ if trimmed.is_empty() => None,
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(trimmed[..idx].to_string()),
        None => None,
    }
}

/// Proper ancestors of an absolute path, outermost first, root excluded.
///
/// `/a/b/c` yields `["/a", "/a/b"]`.
pub fn remote_ancestors(path: &str) -> Vec<String> {
    let mut ancestors = Vec::new();
    let mut current = parent_remote_path(path);
    while let Some(parent) = current {
        if parent == "/" {
            break;
        }
        current = parent_remote_path(&parent);
        ancestors.push(parent);
    }
    ancestors.reverse();
    ancestors
}
