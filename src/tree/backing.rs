//! Backing stores for the virtual file tree.
//!
//! A `BackingStore` is the real-filesystem adapter the surrounding CLI
//! supplies: read, write, exists, list, remove. The tree only touches the
//! store on first materialization of a path and on flush; everything in
//! between is served from the overlay. `MemoryStore` backs test fixtures
//! with no disk at all.

use crate::error::{Result, UpliftError};
use crate::tree::path::WorkspacePath;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Storage interface beneath the virtual file tree.
pub trait BackingStore {
    /// Read the content at `path`, or `None` if the file does not exist.
    fn read(&self, path: &WorkspacePath) -> Result<Option<String>>;

    /// Write `content` to `path`, creating parent directories as needed.
    fn write(&self, path: &WorkspacePath, content: &str) -> Result<()>;

    /// True when `path` exists in the store.
    fn exists(&self, path: &WorkspacePath) -> bool;

    /// All file paths in the store, sorted.
    fn list(&self) -> Result<Vec<WorkspacePath>>;

    /// Remove the file at `path`. Removing a missing path is a no-op.
    fn remove(&self, path: &WorkspacePath) -> Result<()>;
}

/// Directory names never snapshotted from disk.
const SKIP_DIRS: &[&str] = &[".git", "node_modules", "target", ".uplift-backup", "dist"];

/// Disk-backed store rooted at a real directory.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Create a store rooted at `root`.
    pub fn new(root: &Path) -> Result<Self> {
        let canonical = root.canonicalize().map_err(|e| UpliftError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;
        Ok(DiskStore { root: canonical })
    }

    /// The real directory this store is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn real_path(&self, path: &WorkspacePath) -> PathBuf {
        self.root.join(path.relative_str())
    }

    fn collect_files(&self, dir: &Path, out: &mut Vec<WorkspacePath>) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|e| UpliftError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| UpliftError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if SKIP_DIRS.contains(&name_str.as_ref()) {
                continue;
            }

            let entry_path = entry.path();
            let file_type = entry.file_type().map_err(|e| UpliftError::Io {
                path: entry_path.clone(),
                source: e,
            })?;

            if file_type.is_dir() {
                self.collect_files(&entry_path, out)?;
            } else if file_type.is_file() {
                let relative = entry_path
                    .strip_prefix(&self.root)
                    .map_err(|_| UpliftError::PathEscape {
                        path: entry_path.to_string_lossy().into_owned(),
                    })?;
                out.push(WorkspacePath::new(&relative.to_string_lossy())?);
            }
        }

        Ok(())
    }
}

impl BackingStore for DiskStore {
    fn read(&self, path: &WorkspacePath) -> Result<Option<String>> {
        let real = self.real_path(path);
        if !real.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&real).map_err(|e| UpliftError::Io {
            path: real,
            source: e,
        })?;
        Ok(Some(content))
    }

    fn write(&self, path: &WorkspacePath, content: &str) -> Result<()> {
        let real = self.real_path(path);
        if let Some(parent) = real.parent() {
            fs::create_dir_all(parent).map_err(|e| UpliftError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        // Atomic write: temp file in the same directory, then rename.
        let temp = real.with_extension("uplift-tmp");
        let mut file = fs::File::create(&temp).map_err(|e| UpliftError::Io {
            path: temp.clone(),
            source: e,
        })?;
        file.write_all(content.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| UpliftError::Io {
                path: temp.clone(),
                source: e,
            })?;
        fs::rename(&temp, &real).map_err(|e| UpliftError::Io {
            path: real,
            source: e,
        })?;
        Ok(())
    }

    fn exists(&self, path: &WorkspacePath) -> bool {
        self.real_path(path).is_file()
    }

    fn list(&self) -> Result<Vec<WorkspacePath>> {
        let mut out = Vec::new();
        self.collect_files(&self.root, &mut out)?;
        out.sort();
        Ok(out)
    }

    fn remove(&self, path: &WorkspacePath) -> Result<()> {
        let real = self.real_path(path);
        if !real.exists() {
            return Ok(());
        }
        fs::remove_file(&real).map_err(|e| UpliftError::Io {
            path: real,
            source: e,
        })
    }
}

/// In-memory store for fixtures.
///
/// Cloning shares the underlying map, so a test can keep a handle and
/// inspect what the tree flushed. `fail_writes_to` poisons individual
/// paths to exercise partial-commit behavior.
#[derive(Clone, Default)]
pub struct MemoryStore {
    files: Rc<RefCell<BTreeMap<WorkspacePath, String>>>,
    poisoned: Rc<RefCell<BTreeSet<WorkspacePath>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file, panicking on a malformed path. Fixture setup only.
    pub fn seed(&self, path: &str, content: &str) {
        let path = WorkspacePath::new(path).expect("fixture path must normalize");
        self.files.borrow_mut().insert(path, content.to_string());
    }

    /// Make every subsequent write to `path` fail.
    pub fn fail_writes_to(&self, path: &str) {
        let path = WorkspacePath::new(path).expect("fixture path must normalize");
        self.poisoned.borrow_mut().insert(path);
    }

    /// Current content of a path, for post-flush assertions.
    pub fn content(&self, path: &str) -> Option<String> {
        let path = WorkspacePath::new(path).ok()?;
        self.files.borrow().get(&path).cloned()
    }
}

impl BackingStore for MemoryStore {
    fn read(&self, path: &WorkspacePath) -> Result<Option<String>> {
        Ok(self.files.borrow().get(path).cloned())
    }

    fn write(&self, path: &WorkspacePath, content: &str) -> Result<()> {
        if self.poisoned.borrow().contains(path) {
            return Err(UpliftError::Flush {
                path: path.as_str().to_string(),
                reason: "write rejected by store".to_string(),
            });
        }
        self.files
            .borrow_mut()
            .insert(path.clone(), content.to_string());
        Ok(())
    }

    fn exists(&self, path: &WorkspacePath) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn list(&self) -> Result<Vec<WorkspacePath>> {
        Ok(self.files.borrow().keys().cloned().collect())
    }

    fn remove(&self, path: &WorkspacePath) -> Result<()> {
        self.files.borrow_mut().remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.seed("src/app.ts", "export class App {}");

        let path = WorkspacePath::new("src/app.ts").unwrap();
        assert!(store.exists(&path));
        assert_eq!(
            store.read(&path).unwrap().as_deref(),
            Some("export class App {}")
        );

        store.remove(&path).unwrap();
        assert!(!store.exists(&path));
        assert_eq!(store.read(&path).unwrap(), None);
    }

    #[test]
    fn test_memory_store_poisoned_write_fails() {
        let store = MemoryStore::new();
        store.fail_writes_to("locked.css");

        let path = WorkspacePath::new("locked.css").unwrap();
        let result = store.write(&path, "body {}");
        assert!(matches!(result, Err(UpliftError::Flush { .. })));
    }

    #[test]
    fn test_disk_store_list_skips_hidden_dirs() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("src/main.ts"), "let x = 1;").unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/index.ts"), "ignored").unwrap();

        let store = DiskStore::new(dir.path()).expect("Failed to create store");
        let listed = store.list().expect("Failed to list");

        assert_eq!(listed, vec![WorkspacePath::new("src/main.ts").unwrap()]);
    }

    #[test]
    fn test_disk_store_write_creates_parents() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = DiskStore::new(dir.path()).expect("Failed to create store");

        let path = WorkspacePath::new("deep/nested/file.css").unwrap();
        store.write(&path, ".a {}").expect("Failed to write");

        assert!(store.exists(&path));
        assert_eq!(store.read(&path).unwrap().as_deref(), Some(".a {}"));
    }
}
