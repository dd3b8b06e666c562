//! Normalized workspace-relative paths.
//!
//! Every component above the backing-store boundary identifies files by
//! `WorkspacePath`: POSIX-separated, rooted at the workspace, with `.` and
//! `..` segments resolved at construction. A path that would climb above
//! the root is rejected with `PathEscape`.

use crate::error::{Result, UpliftError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, normalized, root-relative path.
///
/// Stored with a leading `/` so report output reads unambiguously
/// (`/src/app.ts`). Ordering is lexicographic over the normalized form,
/// which keeps file lists deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkspacePath(String);

impl WorkspacePath {
    /// Normalize a raw path into a `WorkspacePath`.
    ///
    /// Accepts `styles.css`, `./styles.css`, and `/styles.css` as the same
    /// path. Returns `PathEscape` if `..` segments would climb above the
    /// workspace root.
    pub fn new(raw: &str) -> Result<Self> {
        let cleaned = raw.replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();

        for segment in cleaned.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(UpliftError::PathEscape {
                            path: raw.to_string(),
                        });
                    }
                }
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            return Err(UpliftError::PathEscape {
                path: raw.to_string(),
            });
        }

        Ok(WorkspacePath(format!("/{}", segments.join("/"))))
    }

    /// The workspace root itself (`/`). Only valid as a join base.
    pub fn root() -> Self {
        WorkspacePath("/".to_string())
    }

    /// The normalized path including the leading `/`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path without the leading `/`, as backing stores expect it.
    pub fn relative_str(&self) -> &str {
        self.0.strip_prefix('/').unwrap_or(&self.0)
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// File extension without the dot, if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        let idx = name.rfind('.')?;
        if idx == 0 {
            // Dotfiles have no extension.
            return None;
        }
        Some(&name[idx + 1..])
    }

    /// Parent directory, or `None` for top-level files.
    pub fn parent(&self) -> Option<WorkspacePath> {
        let idx = self.0.rfind('/')?;
        if idx == 0 {
            return None;
        }
        Some(WorkspacePath(self.0[..idx].to_string()))
    }

    /// Resolve `other` relative to this path's directory.
    ///
    /// Used for `extends` chains in configs and `templateUrl`/`styleUrls`
    /// references in components: `/src/panel.ts` joined with
    /// `./panel.html` yields `/src/panel.html`.
    pub fn join_sibling(&self, other: &str) -> Result<WorkspacePath> {
        if other.starts_with('/') {
            return WorkspacePath::new(other);
        }
        match self.parent() {
            Some(parent) => WorkspacePath::new(&format!("{}/{}", parent.as_str(), other)),
            None => WorkspacePath::new(other),
        }
    }
}

impl fmt::Display for WorkspacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WorkspacePath {
    type Error = UpliftError;

    fn try_from(value: String) -> Result<Self> {
        WorkspacePath::new(&value)
    }
}

impl From<WorkspacePath> for String {
    fn from(path: WorkspacePath) -> String {
        path.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_equivalent_spellings() {
        let a = WorkspacePath::new("styles.css").unwrap();
        let b = WorkspacePath::new("./styles.css").unwrap();
        let c = WorkspacePath::new("/styles.css").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "/styles.css");
    }

    #[test]
    fn test_collapses_dot_segments() {
        let path = WorkspacePath::new("src/./app/../app/main.ts").unwrap();
        assert_eq!(path.as_str(), "/src/app/main.ts");
    }

    #[test]
    fn test_rejects_escape_above_root() {
        let result = WorkspacePath::new("../outside.ts");
        assert!(matches!(result, Err(UpliftError::PathEscape { .. })));

        let result = WorkspacePath::new("src/../../outside.ts");
        assert!(matches!(result, Err(UpliftError::PathEscape { .. })));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(WorkspacePath::new("").is_err());
        assert!(WorkspacePath::new("/").is_err());
        assert!(WorkspacePath::new("./").is_err());
    }

    #[test]
    fn test_extension() {
        assert_eq!(
            WorkspacePath::new("src/app.ts").unwrap().extension(),
            Some("ts")
        );
        assert_eq!(
            WorkspacePath::new("src/app.spec.ts").unwrap().extension(),
            Some("ts")
        );
        assert_eq!(WorkspacePath::new("Makefile").unwrap().extension(), None);
        assert_eq!(WorkspacePath::new(".gitignore").unwrap().extension(), None);
    }

    #[test]
    fn test_parent_and_join() {
        let source = WorkspacePath::new("src/panel/panel.ts").unwrap();
        assert_eq!(source.parent().unwrap().as_str(), "/src/panel");

        let template = source.join_sibling("./panel.html").unwrap();
        assert_eq!(template.as_str(), "/src/panel/panel.html");

        let shared = source.join_sibling("../shared/theme.css").unwrap();
        assert_eq!(shared.as_str(), "/src/shared/theme.css");

        let absolute = source.join_sibling("/styles.css").unwrap();
        assert_eq!(absolute.as_str(), "/styles.css");
    }

    #[test]
    fn test_relative_str_has_no_leading_slash() {
        let path = WorkspacePath::new("/src/app.ts").unwrap();
        assert_eq!(path.relative_str(), "src/app.ts");
    }

    #[test]
    fn test_backslashes_are_normalized() {
        let path = WorkspacePath::new("src\\app\\main.ts").unwrap();
        assert_eq!(path.as_str(), "/src/app/main.ts");
    }
}
