use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `path` relative to `root`, with forward slashes; `None` when outside `root`.
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    Some(relative.to_string_lossy().replace('\\', "/"))
}

/// Resolve a user-supplied path against `root`: absolute paths are kept,
/// relative ones are joined, and the result is normalized lexically.
pub fn resolve_under(root: &Path, raw: &Path) -> PathBuf {
    if raw.is_absolute() {
        normalize_lexically(raw)
    } else {
        normalize_lexically(&root.join(raw))
    }
}
