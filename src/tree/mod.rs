//! Virtual file tree: in-memory, copy-on-write view of a project.
//!
//! The tree is the single source of truth for file content during a
//! migration run. Reads lazily materialize from the backing store exactly
//! once; writes, deletes, and renames live in the overlay until `flush`
//! pushes them back through the store. The engine never touches real I/O
//! mid-walk, which is what makes every walker unit-testable against a
//! `MemoryStore` fixture.

mod backing;
mod path;

pub use backing::{BackingStore, DiskStore, MemoryStore};
pub use path::WorkspacePath;

use crate::error::{Result, UpliftError};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// One file in the overlay.
///
/// `content == None` marks a pending deletion. `dirty` tracks whether the
/// entry diverged from the backing store and must be flushed.
#[derive(Debug, Clone)]
struct VirtualFile {
    content: Option<String>,
    dirty: bool,
}

/// Outcome of flushing pending writes to the backing store.
#[derive(Debug, Clone, Default)]
pub struct FlushOutcome {
    /// Files whose backing content actually changed.
    pub written: Vec<WorkspacePath>,
    /// Files that could not be flushed, with the failure reason.
    ///
    /// Files written before a failure stay committed; callers must
    /// tolerate this partial-commit window.
    pub failed: Vec<(WorkspacePath, String)>,
}

/// Copy-on-write file tree over a backing store.
pub struct VirtualFileTree {
    store: Box<dyn BackingStore>,
    overlay: BTreeMap<WorkspacePath, VirtualFile>,
}

impl VirtualFileTree {
    /// Create a tree over the given backing store.
    pub fn new(store: Box<dyn BackingStore>) -> Self {
        VirtualFileTree {
            store,
            overlay: BTreeMap::new(),
        }
    }

    /// Read the current content of `path`.
    ///
    /// The first read of an unmaterialized path performs exactly one
    /// backing-store fetch and caches the result; later reads are served
    /// from the overlay, including content written earlier in the run.
    pub fn read(&mut self, path: &WorkspacePath) -> Result<String> {
        if let Some(file) = self.overlay.get(path) {
            return match &file.content {
                Some(content) => Ok(content.clone()),
                None => Err(UpliftError::NotFound {
                    path: path.as_str().to_string(),
                }),
            };
        }

        match self.store.read(path)? {
            Some(content) => {
                self.overlay.insert(
                    path.clone(),
                    VirtualFile {
                        content: Some(content.clone()),
                        dirty: false,
                    },
                );
                Ok(content)
            }
            None => Err(UpliftError::NotFound {
                path: path.as_str().to_string(),
            }),
        }
    }

    /// True when `path` currently exists in the tree.
    pub fn exists(&self, path: &WorkspacePath) -> bool {
        match self.overlay.get(path) {
            Some(file) => file.content.is_some(),
            None => self.store.exists(path),
        }
    }

    /// Write `content` to `path`, superseding any prior content.
    pub fn write(&mut self, path: &WorkspacePath, content: &str) {
        self.overlay.insert(
            path.clone(),
            VirtualFile {
                content: Some(content.to_string()),
                dirty: true,
            },
        );
    }

    /// Mark `path` deleted. Errors with `NotFound` if the path does not
    /// exist in the tree.
    pub fn delete(&mut self, path: &WorkspacePath) -> Result<()> {
        if !self.exists(path) {
            return Err(UpliftError::NotFound {
                path: path.as_str().to_string(),
            });
        }
        self.overlay.insert(
            path.clone(),
            VirtualFile {
                content: None,
                dirty: true,
            },
        );
        Ok(())
    }

    /// Move the content of `old` to `new`.
    ///
    /// Renaming onto an existing path is a `Conflict` unless `overwrite`
    /// is set.
    pub fn rename(
        &mut self,
        old: &WorkspacePath,
        new: &WorkspacePath,
        overwrite: bool,
    ) -> Result<()> {
        if old == new {
            return Ok(());
        }
        if self.exists(new) && !overwrite {
            return Err(UpliftError::Conflict {
                path: new.as_str().to_string(),
            });
        }
        let content = self.read(old)?;
        self.write(new, &content);
        self.delete(old)
    }

    /// All current paths matching `pattern`, sorted.
    ///
    /// Merges the backing-store listing with the overlay: files created in
    /// this run appear, files deleted in this run do not. Patterns match
    /// against the root-relative form (`src/app.ts`); a leading `**/`
    /// also matches top-level files.
    pub fn all_paths(&self, pattern: &str) -> Result<Vec<WorkspacePath>> {
        let matcher = compile_pattern(pattern)?;

        let mut paths: BTreeMap<WorkspacePath, bool> = BTreeMap::new();
        for path in self.store.list()? {
            paths.insert(path, true);
        }
        for (path, file) in &self.overlay {
            paths.insert(path.clone(), file.content.is_some());
        }

        Ok(paths
            .into_iter()
            .filter(|(path, present)| *present && matcher.matches(path))
            .map(|(path, _)| path)
            .collect())
    }

    /// Paths whose flushed content would differ from the backing store.
    ///
    /// Uses content hashes so rewriting a file to identical bytes never
    /// reports a change; this is what keeps a second migration run's
    /// `files_changed` empty.
    pub fn changed_paths(&self) -> Vec<WorkspacePath> {
        let mut changed = Vec::new();
        for (path, file) in &self.overlay {
            if !file.dirty {
                continue;
            }
            match &file.content {
                Some(content) => {
                    let backing = self.store.read(path).ok().flatten();
                    let same = backing
                        .map(|b| content_hash(&b) == content_hash(content))
                        .unwrap_or(false);
                    if !same {
                        changed.push(path.clone());
                    }
                }
                None => {
                    if self.store.exists(path) {
                        changed.push(path.clone());
                    }
                }
            }
        }
        changed
    }

    /// Flush all pending writes and deletions to the backing store.
    ///
    /// Failures are collected per file rather than aborting: files flushed
    /// before a failure stay committed.
    pub fn flush(&mut self) -> FlushOutcome {
        let mut outcome = FlushOutcome::default();

        let dirty: Vec<WorkspacePath> = self
            .overlay
            .iter()
            .filter(|(_, file)| file.dirty)
            .map(|(path, _)| path.clone())
            .collect();

        for path in dirty {
            let file = match self.overlay.get(&path) {
                Some(file) => file.clone(),
                None => continue,
            };

            let result = match &file.content {
                Some(content) => {
                    let unchanged = self
                        .store
                        .read(&path)
                        .ok()
                        .flatten()
                        .map(|b| content_hash(&b) == content_hash(content))
                        .unwrap_or(false);
                    if unchanged {
                        Ok(false)
                    } else {
                        self.store.write(&path, content).map(|_| true)
                    }
                }
                None => {
                    if self.store.exists(&path) {
                        self.store.remove(&path).map(|_| true)
                    } else {
                        Ok(false)
                    }
                }
            };

            match result {
                Ok(true) => {
                    outcome.written.push(path.clone());
                    if let Some(entry) = self.overlay.get_mut(&path) {
                        entry.dirty = false;
                    }
                }
                Ok(false) => {
                    if let Some(entry) = self.overlay.get_mut(&path) {
                        entry.dirty = false;
                    }
                }
                Err(err) => {
                    log::error!("flush failed for {}: {}", path, err);
                    outcome.failed.push((path.clone(), err.to_string()));
                }
            }
        }

        outcome
    }

    /// Drop any pending overlay state for `path`, reverting reads to the
    /// backing store. Used to make sure a file that failed mid-walk is
    /// never flushed with partial edits.
    pub fn discard(&mut self, path: &WorkspacePath) {
        self.overlay.remove(path);
    }

    /// Content currently in the backing store for `path`, bypassing the
    /// overlay. Used to snapshot pre-migration bytes for backups.
    pub fn backing_content(&self, path: &WorkspacePath) -> Result<Option<String>> {
        self.store.read(path)
    }
}

/// Compiled glob matcher tolerant of both `**/` interpretations.
struct PathMatcher {
    full: glob::Pattern,
    stripped: Option<glob::Pattern>,
}

impl PathMatcher {
    fn matches(&self, path: &WorkspacePath) -> bool {
        let rel = path.relative_str();
        if self.full.matches(rel) {
            return true;
        }
        // "**/*.ts" should also match a top-level "app.ts".
        self.stripped
            .as_ref()
            .map(|p| p.matches(rel))
            .unwrap_or(false)
    }
}

fn compile_pattern(pattern: &str) -> Result<PathMatcher> {
    let normalized = pattern
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_string();

    let full = glob::Pattern::new(&normalized).map_err(|e| UpliftError::Other(format!(
        "Invalid glob pattern '{}': {}",
        pattern, e
    )))?;

    let stripped = normalized
        .strip_prefix("**/")
        .map(glob::Pattern::new)
        .transpose()
        .map_err(|e| UpliftError::Other(format!("Invalid glob pattern '{}': {}", pattern, e)))?;

    Ok(PathMatcher { full, stripped })
}

/// SHA-256 hash of file content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Store wrapper counting backing reads, to pin down lazy
    /// materialization.
    struct CountingStore {
        inner: MemoryStore,
        reads: Rc<Cell<usize>>,
    }

    impl BackingStore for CountingStore {
        fn read(&self, path: &WorkspacePath) -> Result<Option<String>> {
            self.reads.set(self.reads.get() + 1);
            self.inner.read(path)
        }

        fn write(&self, path: &WorkspacePath, content: &str) -> Result<()> {
            self.inner.write(path, content)
        }

        fn exists(&self, path: &WorkspacePath) -> bool {
            self.inner.exists(path)
        }

        fn list(&self) -> Result<Vec<WorkspacePath>> {
            self.inner.list()
        }

        fn remove(&self, path: &WorkspacePath) -> Result<()> {
            self.inner.remove(path)
        }
    }

    fn fixture_tree() -> (VirtualFileTree, MemoryStore) {
        let store = MemoryStore::new();
        store.seed("src/app.ts", "export class App {}");
        store.seed("styles.css", ".old-name { color: red; }");
        let tree = VirtualFileTree::new(Box::new(store.clone()));
        (tree, store)
    }

    #[test]
    fn test_read_materializes_exactly_once() {
        let inner = MemoryStore::new();
        inner.seed("a.ts", "let a = 1;");
        let reads = Rc::new(Cell::new(0));
        let counting = CountingStore {
            inner,
            reads: reads.clone(),
        };
        let mut tree = VirtualFileTree::new(Box::new(counting));

        let path = WorkspacePath::new("a.ts").unwrap();
        tree.read(&path).expect("first read");
        tree.read(&path).expect("second read");
        tree.read(&path).expect("third read");

        assert_eq!(reads.get(), 1, "backing store fetched exactly once");
    }

    #[test]
    fn test_read_your_writes() {
        let (mut tree, _) = fixture_tree();
        let path = WorkspacePath::new("src/app.ts").unwrap();

        tree.write(&path, "export class Application {}");
        assert_eq!(tree.read(&path).unwrap(), "export class Application {}");
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let (mut tree, _) = fixture_tree();
        let path = WorkspacePath::new("missing.ts").unwrap();
        assert!(matches!(
            tree.read(&path),
            Err(UpliftError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_hides_file_from_reads_and_listing() {
        let (mut tree, _) = fixture_tree();
        let path = WorkspacePath::new("styles.css").unwrap();

        tree.delete(&path).expect("delete");
        assert!(!tree.exists(&path));
        assert!(matches!(
            tree.read(&path),
            Err(UpliftError::NotFound { .. })
        ));
        let listed = tree.all_paths("**/*.css").unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn test_rename_conflict_without_overwrite() {
        let (mut tree, _) = fixture_tree();
        let old = WorkspacePath::new("styles.css").unwrap();
        let new = WorkspacePath::new("src/app.ts").unwrap();

        let result = tree.rename(&old, &new, false);
        assert!(matches!(result, Err(UpliftError::Conflict { .. })));

        tree.rename(&old, &new, true).expect("overwrite rename");
        assert_eq!(tree.read(&new).unwrap(), ".old-name { color: red; }");
        assert!(!tree.exists(&old));
    }

    #[test]
    fn test_all_paths_includes_created_files() {
        let (mut tree, _) = fixture_tree();
        let created = WorkspacePath::new("src/new.ts").unwrap();
        tree.write(&created, "let x = 1;");

        let listed = tree.all_paths("src/**/*.ts").unwrap();
        assert_eq!(
            listed,
            vec![
                WorkspacePath::new("src/app.ts").unwrap(),
                WorkspacePath::new("src/new.ts").unwrap(),
            ]
        );
    }

    #[test]
    fn test_flush_writes_only_changed_content() {
        let (mut tree, store) = fixture_tree();
        let app = WorkspacePath::new("src/app.ts").unwrap();
        let css = WorkspacePath::new("styles.css").unwrap();

        // Rewrite one file to identical bytes, one to new bytes.
        let same = tree.read(&app).unwrap();
        tree.write(&app, &same);
        tree.write(&css, ".new-name { color: red; }");

        let outcome = tree.flush();
        assert_eq!(outcome.written, vec![css.clone()]);
        assert!(outcome.failed.is_empty());
        assert_eq!(
            store.content("styles.css").as_deref(),
            Some(".new-name { color: red; }")
        );
    }

    #[test]
    fn test_flush_partial_failure_keeps_other_commits() {
        let store = MemoryStore::new();
        store.seed("a.css", ".a {}");
        store.seed("b.css", ".b {}");
        store.fail_writes_to("a.css");

        let mut tree = VirtualFileTree::new(Box::new(store.clone()));
        tree.write(&WorkspacePath::new("a.css").unwrap(), ".a2 {}");
        tree.write(&WorkspacePath::new("b.css").unwrap(), ".b2 {}");

        let outcome = tree.flush();
        assert_eq!(outcome.written, vec![WorkspacePath::new("b.css").unwrap()]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0.as_str(), "/a.css");
        assert_eq!(store.content("b.css").as_deref(), Some(".b2 {}"));
        assert_eq!(store.content("a.css").as_deref(), Some(".a {}"));
    }

    #[test]
    fn test_flush_applies_deletions() {
        let (mut tree, store) = fixture_tree();
        tree.delete(&WorkspacePath::new("styles.css").unwrap())
            .unwrap();

        let outcome = tree.flush();
        assert_eq!(
            outcome.written,
            vec![WorkspacePath::new("styles.css").unwrap()]
        );
        assert_eq!(store.content("styles.css"), None);
    }
}
