use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

use super::error::TaskError;

/// Canonical absolute form of a scan root. The root has to exist.
pub(crate) fn resolve_root(root: &Path) -> Result<PathBuf, TaskError> {
    fs::canonicalize(root).map_err(|e| TaskError::filesystem(root, e))
}

/// Absolute form of `path` used as a registry key.
///
/// Existing paths are canonicalized so they compare equal to what a scan of a
/// resolved root produces. A path that does not exist (yet, or any more) is
/// made absolute with `.` and `..` folded, and its parent canonicalized when
/// that exists.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    let absolute = lexical_absolute(path);
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|parent| parent.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}

fn lexical_absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut folded = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                folded.pop();
            }
            other => folded.push(other.as_os_str()),
        }
    }
    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn existing_paths_resolve_through_parent_links() {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::create_dir_all(root.join("b")).unwrap();

        let dotted = root.join("b").join("..").join(".").join("a");
        assert_eq!(normalize(&dotted), root.join("a"));
        assert_eq!(resolve_root(&dotted).unwrap(), root.join("a"));
    }

    #[test]
    fn missing_paths_are_folded_lexically() {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();

        let gone = root.join("x").join("..").join("gone");
        assert_eq!(normalize(&gone), root.join("gone"));
        assert!(matches!(
            resolve_root(&gone),
            Err(TaskError::Filesystem { .. })
        ));
    }

    #[test]
    fn relative_paths_become_absolute() {
        let normalized = normalize(Path::new("no-such-dir/child"));
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("no-such-dir/child"));
    }
}
