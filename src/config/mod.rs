//! Project configuration parser.
//!
//! Reads a `tsconfig.json`-style document through the virtual tree (never
//! the real filesystem), resolves `extends` inheritance recursively, and
//! expands include/exclude globs against the tree's listing into the
//! resolved file list the runner walks. A malformed configuration is
//! fatal for the run: there is no partial migration without a trusted
//! file list.

use crate::error::{Result, UpliftError};
use crate::tree::{VirtualFileTree, WorkspacePath};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Raw configuration document shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    extends: Option<String>,
    compiler_options: Option<RawCompilerOptions>,
    files: Option<Vec<String>>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompilerOptions {
    strict: Option<bool>,
    base_url: Option<String>,
    paths: Option<BTreeMap<String, Vec<String>>>,
}

/// Compiler options the engine cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Strict type checking enabled.
    pub strict: bool,
    /// Base URL for non-relative module resolution.
    pub base_url: Option<String>,
    /// Path alias table.
    pub paths: BTreeMap<String, Vec<String>>,
}

/// A fully resolved project configuration.
#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    /// The resolved file list, sorted, deduplicated.
    pub files: Vec<WorkspacePath>,
    /// Merged compiler options across the `extends` chain.
    pub compiler_options: CompilerOptions,
    /// Configuration files read while resolving, extension chain included.
    pub config_files: Vec<WorkspacePath>,
}

/// Patterns excluded unless the configuration says otherwise.
const DEFAULT_EXCLUDES: &[&str] = &["node_modules/**", "dist/**", ".uplift-backup/**"];

/// Parse and resolve the project configuration at `config_path`.
pub fn parse_project_config(
    tree: &mut VirtualFileTree,
    config_path: &WorkspacePath,
) -> Result<ProjectConfig> {
    let mut visited = Vec::new();
    let raw = load_chain(tree, config_path, &mut visited)?;

    let compiler_options = {
        let raw_options = raw.compiler_options.unwrap_or_default();
        CompilerOptions {
            strict: raw_options.strict.unwrap_or(false),
            base_url: raw_options.base_url,
            paths: raw_options.paths.unwrap_or_default(),
        }
    };

    let mut files: BTreeSet<WorkspacePath> = BTreeSet::new();

    if let Some(explicit) = &raw.files {
        for entry in explicit {
            let path = config_path.join_sibling(entry).map_err(|e| {
                UpliftError::ConfigParse {
                    path: config_path.as_str().to_string(),
                    reason: format!("invalid files entry '{}': {}", entry, e),
                }
            })?;
            if !tree.exists(&path) {
                return Err(UpliftError::ConfigParse {
                    path: config_path.as_str().to_string(),
                    reason: format!("files entry '{}' does not exist", entry),
                });
            }
            files.insert(path);
        }
    }

    let include: Vec<String> = match &raw.include {
        Some(patterns) => patterns.iter().map(|p| normalize_pattern(p)).collect(),
        None if raw.files.is_some() => Vec::new(),
        None => vec!["**/*".to_string()],
    };
    let exclude: Vec<String> = raw
        .exclude
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .map(|p| normalize_pattern(p))
        .chain(DEFAULT_EXCLUDES.iter().map(|p| p.to_string()))
        .collect();

    for pattern in &include {
        let matched = tree
            .all_paths(pattern)
            .map_err(|e| UpliftError::ConfigParse {
                path: config_path.as_str().to_string(),
                reason: format!("invalid include pattern '{}': {}", pattern, e),
            })?;
        files.extend(matched);
    }

    let excluded = compile_excludes(config_path, &exclude)?;
    let files: Vec<WorkspacePath> = files
        .into_iter()
        .filter(|path| {
            let rel = path.relative_str();
            !excluded.iter().any(|p| p.matches(rel))
        })
        .collect();

    Ok(ProjectConfig {
        files,
        compiler_options,
        config_files: visited,
    })
}

/// Load a config and its `extends` ancestors, child values winning.
fn load_chain(
    tree: &mut VirtualFileTree,
    config_path: &WorkspacePath,
    visited: &mut Vec<WorkspacePath>,
) -> Result<RawConfig> {
    if visited.contains(config_path) {
        return Err(UpliftError::ConfigParse {
            path: config_path.as_str().to_string(),
            reason: "circular extends chain".to_string(),
        });
    }
    visited.push(config_path.clone());

    let text = tree
        .read(config_path)
        .map_err(|_| UpliftError::ConfigParse {
            path: config_path.as_str().to_string(),
            reason: "configuration file not found".to_string(),
        })?;

    let stripped = strip_json_comments(&text);
    let child: RawConfig =
        serde_json::from_str(&stripped).map_err(|e| UpliftError::ConfigParse {
            path: config_path.as_str().to_string(),
            reason: e.to_string(),
        })?;

    let Some(extends) = &child.extends else {
        return Ok(child);
    };

    let parent_path =
        config_path
            .join_sibling(extends)
            .map_err(|e| UpliftError::ConfigParse {
                path: config_path.as_str().to_string(),
                reason: format!("invalid extends target '{}': {}", extends, e),
            })?;
    let parent = load_chain(tree, &parent_path, visited)?;

    Ok(merge_configs(parent, child))
}

/// Merge a parent config under a child: child fields win when present.
fn merge_configs(parent: RawConfig, child: RawConfig) -> RawConfig {
    let compiler_options = match (parent.compiler_options, child.compiler_options) {
        (Some(p), Some(c)) => Some(RawCompilerOptions {
            strict: c.strict.or(p.strict),
            base_url: c.base_url.or(p.base_url),
            paths: c.paths.or(p.paths),
        }),
        (p, c) => c.or(p),
    };

    RawConfig {
        extends: None,
        compiler_options,
        files: child.files.or(parent.files),
        include: child.include.or(parent.include),
        exclude: child.exclude.or(parent.exclude),
    }
}

/// Normalize a glob pattern: strip leading `./`, map a bare directory
/// name to everything beneath it.
fn normalize_pattern(pattern: &str) -> String {
    let trimmed = pattern
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_string();
    let has_meta = trimmed.contains('*') || trimmed.contains('?') || trimmed.contains('[');
    let looks_like_file = trimmed
        .rsplit('/')
        .next()
        .map(|name| name.contains('.'))
        .unwrap_or(false);
    if !has_meta && !looks_like_file {
        format!("{}/**/*", trimmed)
    } else {
        trimmed
    }
}

fn compile_excludes(
    config_path: &WorkspacePath,
    patterns: &[String],
) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| UpliftError::ConfigParse {
                path: config_path.as_str().to_string(),
                reason: format!("invalid exclude pattern '{}': {}", p, e),
            })
        })
        .collect()
}

/// Remove `//` and `/* */` comments outside string literals.
///
/// Configuration files commonly carry comments even though JSON proper
/// forbids them. Comment bytes are replaced with spaces so serde error
/// offsets still point at the original text.
fn strip_json_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = text.as_bytes().to_vec();
    let mut i = 0;
    let mut in_string = false;

    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            b'"' => {
                in_string = true;
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                while i < bytes.len() {
                    if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        out[i] = b' ';
                        out[i + 1] = b' ';
                        i += 2;
                        break;
                    }
                    if !bytes[i].is_ascii_whitespace() {
                        out[i] = b' ';
                    }
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    String::from_utf8(out).unwrap_or_else(|_| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MemoryStore;

    fn tree_with(files: &[(&str, &str)]) -> VirtualFileTree {
        let store = MemoryStore::new();
        for (path, content) in files {
            store.seed(path, content);
        }
        VirtualFileTree::new(Box::new(store))
    }

    fn config_path() -> WorkspacePath {
        WorkspacePath::new("tsconfig.json").unwrap()
    }

    #[test]
    fn test_include_exclude_expansion() {
        let mut tree = tree_with(&[
            (
                "tsconfig.json",
                r#"{"include": ["src/**/*"], "exclude": ["src/**/*.spec.ts"]}"#,
            ),
            ("src/app.ts", ""),
            ("src/app.spec.ts", ""),
            ("src/panel.html", ""),
            ("other/ignored.ts", ""),
        ]);

        let config = parse_project_config(&mut tree, &config_path()).expect("Failed to parse");
        assert_eq!(
            config.files,
            vec![
                WorkspacePath::new("src/app.ts").unwrap(),
                WorkspacePath::new("src/panel.html").unwrap(),
            ]
        );
    }

    #[test]
    fn test_files_entries_are_exact() {
        let mut tree = tree_with(&[
            ("tsconfig.json", r#"{"files": ["src/main.ts"]}"#),
            ("src/main.ts", ""),
            ("src/other.ts", ""),
        ]);

        let config = parse_project_config(&mut tree, &config_path()).expect("Failed to parse");
        assert_eq!(config.files, vec![WorkspacePath::new("src/main.ts").unwrap()]);
    }

    #[test]
    fn test_missing_files_entry_is_config_error() {
        let mut tree = tree_with(&[("tsconfig.json", r#"{"files": ["src/gone.ts"]}"#)]);
        let result = parse_project_config(&mut tree, &config_path());
        assert!(matches!(result, Err(UpliftError::ConfigParse { .. })));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let mut tree = tree_with(&[("tsconfig.json", "{ not json")]);
        let result = parse_project_config(&mut tree, &config_path());
        match result {
            Err(UpliftError::ConfigParse { path, .. }) => {
                assert_eq!(path, "/tsconfig.json");
            }
            other => panic!("Expected ConfigParse, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_config_is_config_error() {
        let mut tree = tree_with(&[]);
        let result = parse_project_config(&mut tree, &config_path());
        assert!(matches!(result, Err(UpliftError::ConfigParse { .. })));
    }

    #[test]
    fn test_extends_chain_merges_options() {
        let mut tree = tree_with(&[
            (
                "tsconfig.base.json",
                r#"{"compilerOptions": {"strict": true, "baseUrl": "."}, "exclude": ["legacy/**"]}"#,
            ),
            (
                "tsconfig.json",
                r#"{"extends": "./tsconfig.base.json", "include": ["src/**/*"],
                    "compilerOptions": {"baseUrl": "src"}}"#,
            ),
            ("src/app.ts", ""),
            ("legacy/old.ts", ""),
        ]);

        let config = parse_project_config(&mut tree, &config_path()).expect("Failed to parse");
        assert!(config.compiler_options.strict, "inherited from base");
        assert_eq!(
            config.compiler_options.base_url.as_deref(),
            Some("src"),
            "child overrides parent"
        );
        assert_eq!(config.files, vec![WorkspacePath::new("src/app.ts").unwrap()]);
        assert_eq!(
            config.config_files,
            vec![
                WorkspacePath::new("tsconfig.json").unwrap(),
                WorkspacePath::new("tsconfig.base.json").unwrap(),
            ]
        );
    }

    #[test]
    fn test_circular_extends_is_config_error() {
        let mut tree = tree_with(&[
            ("tsconfig.json", r#"{"extends": "./tsconfig.other.json"}"#),
            ("tsconfig.other.json", r#"{"extends": "./tsconfig.json"}"#),
        ]);
        let result = parse_project_config(&mut tree, &config_path());
        match result {
            Err(UpliftError::ConfigParse { reason, .. }) => {
                assert!(reason.contains("circular"));
            }
            other => panic!("Expected ConfigParse, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_comments_are_tolerated() {
        let mut tree = tree_with(&[
            (
                "tsconfig.json",
                "{\n  // project files\n  \"include\": [\"src/**/*\"] /* everything */\n}",
            ),
            ("src/app.ts", ""),
        ]);
        let config = parse_project_config(&mut tree, &config_path()).expect("Failed to parse");
        assert_eq!(config.files, vec![WorkspacePath::new("src/app.ts").unwrap()]);
    }

    #[test]
    fn test_default_excludes_apply() {
        let mut tree = tree_with(&[
            ("tsconfig.json", r#"{"include": ["**/*"]}"#),
            ("src/app.ts", ""),
            ("dist/bundle.ts", ""),
        ]);
        let config = parse_project_config(&mut tree, &config_path()).expect("Failed to parse");
        assert!(config
            .files
            .iter()
            .all(|p| !p.as_str().starts_with("/dist/")));
        assert!(config
            .files
            .contains(&WorkspacePath::new("src/app.ts").unwrap()));
    }
}
