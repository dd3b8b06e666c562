//! Backup and undo support for migration runs.
//!
//! A migration rewrites files in place; before a non-dry-run flush the
//! runner can snapshot every to-be-changed file into
//! `.uplift-backup/<operation_id>/` with a manifest tracking original
//! locations and hashes. `restore_from_manifest` undoes a run after
//! verifying the backup bytes still match the manifest.

use crate::error::{Result, UpliftError};
use crate::registry::TargetVersion;
use crate::tree::{content_hash, WorkspacePath};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata about a backed-up file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    /// Original path of the file, workspace-relative.
    pub original_path: WorkspacePath,
    /// SHA-256 hash of the original file content.
    pub hash: String,
    /// Byte count of the original file.
    pub size: u64,
}

/// Manifest describing one backup operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    /// Unique identifier for this operation.
    pub operation_id: String,
    /// Timestamp when the backup was created (ISO 8601).
    pub timestamp: String,
    /// Version the migration started from.
    pub from_version: TargetVersion,
    /// Version the migration targeted.
    pub to_version: TargetVersion,
    /// Files that were backed up.
    pub files: Vec<BackupEntry>,
    /// Absolute path to the backup directory.
    #[serde(skip)]
    pub backup_dir: PathBuf,
}

impl BackupManifest {
    /// Create a new backup manifest.
    pub fn new(
        operation_id: String,
        backup_dir: PathBuf,
        from_version: TargetVersion,
        to_version: TargetVersion,
    ) -> Self {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        BackupManifest {
            operation_id,
            timestamp,
            from_version,
            to_version,
            files: Vec::new(),
            backup_dir,
        }
    }

    /// Save the manifest to `manifest.json` in the backup directory.
    pub fn save(&self) -> Result<()> {
        let manifest_path = self.backup_dir.join("manifest.json");
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| UpliftError::Other(format!("Failed to serialize manifest: {}", e)))?;
        fs::write(&manifest_path, json).map_err(|e| UpliftError::Io {
            path: manifest_path,
            source: e,
        })?;
        Ok(())
    }

    /// Load a manifest from a file.
    pub fn load(manifest_path: &Path) -> Result<Self> {
        let json = fs::read_to_string(manifest_path).map_err(|e| UpliftError::Io {
            path: manifest_path.to_path_buf(),
            source: e,
        })?;

        let mut manifest: BackupManifest =
            serde_json::from_str(&json).map_err(|e| UpliftError::InvalidManifest {
                message: format!("Failed to parse manifest: {}", e),
            })?;

        manifest.backup_dir = manifest_path
            .parent()
            .ok_or_else(|| UpliftError::InvalidManifest {
                message: "Manifest has no parent directory".to_string(),
            })?
            .to_path_buf();

        Ok(manifest)
    }
}

/// Writer snapshotting pre-migration file content.
pub struct BackupWriter {
    manifest: BackupManifest,
}

impl BackupWriter {
    /// Create a backup writer under `workspace_root`.
    ///
    /// The operation id defaults to a fresh UUID v4.
    pub fn new(
        workspace_root: &Path,
        operation_id: Option<String>,
        from_version: TargetVersion,
        to_version: TargetVersion,
    ) -> Result<Self> {
        let op_id = operation_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let backup_dir = workspace_root.join(".uplift-backup").join(&op_id);

        fs::create_dir_all(&backup_dir).map_err(|e| UpliftError::Io {
            path: backup_dir.clone(),
            source: e,
        })?;

        Ok(BackupWriter {
            manifest: BackupManifest::new(op_id, backup_dir, from_version, to_version),
        })
    }

    /// The operation id for this backup.
    pub fn operation_id(&self) -> &str {
        &self.manifest.operation_id
    }

    /// Path to the manifest file.
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest.backup_dir.join("manifest.json")
    }

    /// Snapshot one file's pre-migration content.
    ///
    /// Content comes from the tree's backing store rather than disk
    /// directly, so the backup reflects exactly what the flush is about
    /// to overwrite.
    pub fn backup_content(&mut self, path: &WorkspacePath, content: &str) -> Result<()> {
        let backup_path = self.manifest.backup_dir.join(path.relative_str());

        if let Some(parent) = backup_path.parent() {
            fs::create_dir_all(parent).map_err(|e| UpliftError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        fs::write(&backup_path, content).map_err(|e| UpliftError::Io {
            path: backup_path.clone(),
            source: e,
        })?;

        self.manifest.files.push(BackupEntry {
            original_path: path.clone(),
            hash: content_hash(content),
            size: content.len() as u64,
        });

        Ok(())
    }

    /// Finalize the backup by writing the manifest file.
    ///
    /// Returns the path to the manifest file.
    pub fn finalize(self) -> Result<PathBuf> {
        let manifest_path = self.manifest_path();
        self.manifest.save()?;
        Ok(manifest_path)
    }
}

/// Restore files from a backup manifest. Returns the number restored.
pub fn restore_from_manifest(manifest_path: &Path, workspace_root: &Path) -> Result<usize> {
    let manifest = BackupManifest::load(manifest_path)?;

    let mut restored = 0;

    for entry in &manifest.files {
        let original_path = workspace_root.join(entry.original_path.relative_str());
        let backup_path = manifest.backup_dir.join(entry.original_path.relative_str());

        if !backup_path.exists() {
            return Err(UpliftError::InvalidManifest {
                message: format!("Backup file missing: {}", backup_path.display()),
            });
        }

        let content = fs::read_to_string(&backup_path).map_err(|e| UpliftError::Io {
            path: backup_path.clone(),
            source: e,
        })?;

        let actual_hash = content_hash(&content);
        if actual_hash != entry.hash {
            return Err(UpliftError::InvalidManifest {
                message: format!(
                    "Hash mismatch for {}: expected {}, got {}",
                    entry.original_path, entry.hash, actual_hash
                ),
            });
        }

        if let Some(parent) = original_path.parent() {
            fs::create_dir_all(parent).map_err(|e| UpliftError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        fs::write(&original_path, &content).map_err(|e| UpliftError::Io {
            path: original_path.clone(),
            source: e,
        })?;

        restored += 1;
    }

    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn versions() -> (TargetVersion, TargetVersion) {
        (
            TargetVersion::new("v1").unwrap(),
            TargetVersion::new("v2").unwrap(),
        )
    }

    #[test]
    fn test_backup_writer_creates_manifest() {
        let workspace = TempDir::new().expect("Failed to create temp dir");
        let (from, to) = versions();

        let mut writer = BackupWriter::new(
            workspace.path(),
            Some("test-op-123".to_string()),
            from,
            to,
        )
        .expect("Failed to create BackupWriter");

        let path = WorkspacePath::new("src/app.ts").unwrap();
        writer
            .backup_content(&path, "export class App {}")
            .expect("Failed to backup");

        let manifest_path = writer.finalize().expect("Failed to finalize");
        assert!(manifest_path.exists(), "Manifest file should exist");

        let backup_file = workspace
            .path()
            .join(".uplift-backup/test-op-123/src/app.ts");
        assert!(backup_file.exists(), "Backup preserves directory structure");
        assert_eq!(
            fs::read_to_string(&backup_file).unwrap(),
            "export class App {}"
        );
    }

    #[test]
    fn test_restore_from_manifest_restores_files() {
        let workspace = TempDir::new().expect("Failed to create temp dir");
        let (from, to) = versions();

        std::fs::create_dir_all(workspace.path().join("src")).unwrap();
        let real_file = workspace.path().join("src/app.ts");
        fs::write(&real_file, "original content").unwrap();

        let mut writer = BackupWriter::new(
            workspace.path(),
            Some("restore-test".to_string()),
            from,
            to,
        )
        .expect("Failed to create BackupWriter");

        let path = WorkspacePath::new("src/app.ts").unwrap();
        writer
            .backup_content(&path, "original content")
            .expect("Failed to backup");
        let manifest_path = writer.finalize().expect("Failed to finalize");

        fs::write(&real_file, "migrated content").unwrap();

        let restored = restore_from_manifest(&manifest_path, workspace.path())
            .expect("Failed to restore");
        assert_eq!(restored, 1);
        assert_eq!(fs::read_to_string(&real_file).unwrap(), "original content");
    }

    #[test]
    fn test_restore_hash_mismatch_fails() {
        let workspace = TempDir::new().expect("Failed to create temp dir");
        let (from, to) = versions();

        let mut writer = BackupWriter::new(
            workspace.path(),
            Some("hash-test".to_string()),
            from,
            to,
        )
        .expect("Failed to create BackupWriter");

        let path = WorkspacePath::new("app.ts").unwrap();
        writer.backup_content(&path, "original").unwrap();
        let manifest_path = writer.finalize().unwrap();

        // Tamper with the backup file.
        let backup_file = workspace.path().join(".uplift-backup/hash-test/app.ts");
        fs::write(&backup_file, "tampered").unwrap();

        let result = restore_from_manifest(&manifest_path, workspace.path());
        match result {
            Err(UpliftError::InvalidManifest { message }) => {
                assert!(message.contains("Hash mismatch"));
            }
            other => panic!("Expected hash mismatch error, got: {:?}", other),
        }
    }

    #[test]
    fn test_manifest_roundtrip_keeps_versions() {
        let workspace = TempDir::new().expect("Failed to create temp dir");
        let (from, to) = versions();

        let writer = BackupWriter::new(
            workspace.path(),
            Some("versions-test".to_string()),
            from.clone(),
            to.clone(),
        )
        .expect("Failed to create BackupWriter");
        let manifest_path = writer.finalize().unwrap();

        let loaded = BackupManifest::load(&manifest_path).expect("Failed to load");
        assert_eq!(loaded.operation_id, "versions-test");
        assert_eq!(loaded.from_version, from);
        assert_eq!(loaded.to_version, to);
        assert!(loaded.files.is_empty());
    }
}
