//! Workspace boundary enforcement shared by every path-taking tool.

use std::path::{Component, Path, PathBuf};

use super::error::ToolError;

/// Resolve `input` against the workspace root and reject anything whose
/// canonical form escapes it. Works for not-yet-existing targets by
/// canonicalising the nearest existing ancestor.
pub fn resolve_workspace_path(workspace_root: &Path, input: &str) -> Result<PathBuf, ToolError> {
    if input.is_empty() {
        return Err(ToolError::invalid_input("path must not be empty"));
    }

    let candidate = {
        let raw = Path::new(input);
        if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            workspace_root.join(raw)
        }
    };

    let normalized = normalize(&candidate);
    let canonical_root = workspace_root
        .canonicalize()
        .unwrap_or_else(|_| normalize(workspace_root));
    let canonical = canonicalize_existing_prefix(&normalized);

    if canonical.starts_with(&canonical_root) {
        Ok(normalized)
    } else {
        Err(ToolError::path_traversal(input))
    }
}

/// Lexical normalisation: strips `.` and resolves `..` without touching the
/// filesystem, so traversal is caught even for paths that do not exist yet.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalise the longest existing prefix, then re-append the remainder.
/// Symlinked ancestors therefore resolve to their real location before the
/// containment check.
fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut prefix = path.to_path_buf();
    let mut suffix = Vec::new();

    loop {
        match prefix.canonicalize() {
            Ok(canonical) => {
                let mut out = canonical;
                for part in suffix.iter().rev() {
                    out.push(part);
                }
                return out;
            }
            Err(_) => match (prefix.parent(), prefix.file_name()) {
                (Some(parent), Some(name)) => {
                    suffix.push(name.to_os_string());
                    prefix = parent.to_path_buf();
                }
                _ => return path.to_path_buf(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::error::ToolErrorKind;
    use tempfile::TempDir;

    #[test]
    fn relative_paths_resolve_inside_root() {
        let tmp = TempDir::new().unwrap();
        let resolved = resolve_workspace_path(tmp.path(), "src/main.rs").unwrap();
        assert!(resolved.ends_with("src/main.rs"));
    }

    #[test]
    fn parent_escapes_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = resolve_workspace_path(tmp.path(), "../outside.txt").unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::PathTraversal);
    }

    #[test]
    fn nested_parent_escape_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = resolve_workspace_path(tmp.path(), "src/../../outside.txt").unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::PathTraversal);
    }

    #[test]
    fn absolute_path_inside_root_is_accepted() {
        let tmp = TempDir::new().unwrap();
        let inside = tmp.path().join("file.txt");
        std::fs::write(&inside, "x").unwrap();
        let resolved =
            resolve_workspace_path(tmp.path(), inside.to_str().unwrap()).unwrap();
        assert!(resolved.ends_with("file.txt"));
    }

    #[test]
    fn absolute_path_outside_root_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = resolve_workspace_path(tmp.path(), "/etc/passwd").unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::PathTraversal);
    }

    #[test]
    fn dotdot_inside_root_is_fine() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        let resolved = resolve_workspace_path(tmp.path(), "sub/../file.txt").unwrap();
        assert!(resolved.ends_with("file.txt"));
        assert!(!resolved.to_string_lossy().contains(".."));
    }
}
