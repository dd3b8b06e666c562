//! Workspace root resolution.
//!
//! The engine can be invoked from any subdirectory of a project. This
//! module walks upward from the current directory to the nearest ancestor
//! containing the project configuration file and reports both the root and
//! the invocation directory's position inside it. Resolution is re-derived
//! on every call; nothing is cached globally, because test fixtures build
//! trees whose backing store has no relation to the process's real working
//! directory.

use crate::error::{Result, UpliftError};
use crate::tree::WorkspacePath;
use std::path::{Path, PathBuf};

/// File whose presence marks a workspace root.
pub const ROOT_MARKER: &str = "tsconfig.json";

/// A resolved workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWorkspace {
    /// Real filesystem directory containing the root marker.
    pub root: PathBuf,
    /// The invocation directory relative to the root, if it was a proper
    /// subdirectory. `None` when invoked from the root itself.
    pub subdir: Option<WorkspacePath>,
}

/// Resolve the workspace root for an arbitrary current directory.
///
/// Walks upward from `cwd` until a directory containing [`ROOT_MARKER`]
/// is found. Returns `Unresolvable` when no ancestor carries the marker.
pub fn resolve_workspace_root(cwd: &Path) -> Result<ResolvedWorkspace> {
    let start = cwd.canonicalize().map_err(|e| UpliftError::Io {
        path: cwd.to_path_buf(),
        source: e,
    })?;

    let mut dir: &Path = &start;
    loop {
        if dir.join(ROOT_MARKER).is_file() {
            let subdir = match start.strip_prefix(dir) {
                Ok(rel) if rel.as_os_str().is_empty() => None,
                Ok(rel) => Some(WorkspacePath::new(&rel.to_string_lossy())?),
                Err(_) => None,
            };
            return Ok(ResolvedWorkspace {
                root: dir.to_path_buf(),
                subdir,
            });
        }

        match dir.parent() {
            Some(parent) => dir = parent,
            None => {
                return Err(UpliftError::Unresolvable {
                    dir: start.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolves_from_root_itself() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join(ROOT_MARKER), "{}").unwrap();

        let resolved = resolve_workspace_root(dir.path()).expect("Failed to resolve");
        assert_eq!(resolved.root, dir.path().canonicalize().unwrap());
        assert_eq!(resolved.subdir, None);
    }

    #[test]
    fn test_resolves_from_nested_subdirectory() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join(ROOT_MARKER), "{}").unwrap();
        let nested = dir.path().join("src/components");
        std::fs::create_dir_all(&nested).unwrap();

        let resolved = resolve_workspace_root(&nested).expect("Failed to resolve");
        assert_eq!(resolved.root, dir.path().canonicalize().unwrap());
        assert_eq!(
            resolved.subdir,
            Some(WorkspacePath::new("src/components").unwrap())
        );
    }

    #[test]
    fn test_unresolvable_without_marker() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let result = resolve_workspace_root(dir.path());
        assert!(matches!(result, Err(UpliftError::Unresolvable { .. })));
    }
}
