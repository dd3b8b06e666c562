//! Migration rule runner.
//!
//! The orchestrator for one end-to-end migration: resolve configuration,
//! enumerate and partition files, walk every file kind for every
//! requested target version in ascending order, then commit the tree's
//! pending writes. Errors local to one file are caught at file
//! granularity and aggregated into the report; configuration and host
//! errors abort the run before any write.

mod backup;

pub use backup::{restore_from_manifest, BackupManifest, BackupWriter};

use crate::config::parse_project_config;
use crate::edit::{apply_replacements, validate_replacements, TextReplacement};
use crate::error::{Result, UpliftError};
use crate::host::{build_semantic_index, AnalysisHost};
use crate::registry::{TargetVersion, UpgradeRegistry};
use crate::tree::{VirtualFileTree, WorkspacePath};
use crate::walk::source::{collect_metadata, walk_source, CheckFinding, SourceRules};
use crate::walk::{walk_build_config, FileKind, FileSet};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Options for one migration invocation.
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Configuration file driving the resolved file list.
    pub config_path: WorkspacePath,
    /// Version the project is currently on.
    pub from: TargetVersion,
    /// Version to migrate to.
    pub to: TargetVersion,
    /// Compute everything but never flush.
    pub dry_run: bool,
    /// Snapshot originals under this real directory before flushing.
    pub backup_root: Option<PathBuf>,
}

impl MigrateOptions {
    /// Options with the default configuration path and no backup.
    pub fn new(from: TargetVersion, to: TargetVersion) -> Self {
        MigrateOptions {
            config_path: WorkspacePath::new("tsconfig.json").expect("default config path"),
            from,
            to,
            dry_run: false,
            backup_root: None,
        }
    }
}

/// A file the run could not migrate, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    /// The affected file.
    pub path: WorkspacePath,
    /// Why it failed.
    pub reason: String,
}

/// Report for one migration run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    /// Files whose content changed, sorted.
    pub files_changed: Vec<WorkspacePath>,
    /// Files that failed, with reasons. Never silently dropped.
    pub files_failed: Vec<FileFailure>,
    /// Total rule matches (replacements applied plus check findings).
    pub rules_applied: usize,
    /// Check-only findings requiring manual migration.
    pub findings: Vec<CheckFinding>,
    /// Every computed replacement, for dry-run inspection.
    pub replacements: Vec<TextReplacement>,
    /// Manifest path when a backup was taken.
    pub backup_manifest: Option<String>,
}

impl MigrationReport {
    /// True when every file migrated cleanly.
    pub fn is_clean(&self) -> bool {
        self.files_failed.is_empty()
    }
}

/// Runner states. `Failed` is reachable from any non-idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    ConfigResolved,
    FilesEnumerated,
    Walking(FileKind),
    Committing,
    Done,
    Failed,
}

/// Explicit per-run match counter.
///
/// Owned by the run, never module-level, so parallel runs cannot
/// interfere with each other's counts.
#[derive(Debug, Default)]
struct RuleCounter {
    applied: usize,
}

impl RuleCounter {
    fn add(&mut self, matches: usize) {
        self.applied += matches;
    }
}

/// One end-to-end migration over a tree.
struct MigrationRun<'a> {
    tree: &'a mut VirtualFileTree,
    registry: &'a UpgradeRegistry,
    options: &'a MigrateOptions,
    state: RunState,
    files: FileSet,
    config_files: BTreeSet<WorkspacePath>,
    failed: Vec<FileFailure>,
    failed_paths: BTreeSet<WorkspacePath>,
    replacements: Vec<TextReplacement>,
    findings: Vec<CheckFinding>,
    counter: RuleCounter,
}

/// Run a migration against a virtual tree.
///
/// `dry_run` runs through `Committing` but never flushes; the report's
/// `replacements` carry the full computed set either way.
pub fn migrate(
    tree: &mut VirtualFileTree,
    registry: &UpgradeRegistry,
    options: &MigrateOptions,
) -> Result<MigrationReport> {
    let mut run = MigrationRun {
        tree,
        registry,
        options,
        state: RunState::Idle,
        files: FileSet::default(),
        config_files: BTreeSet::new(),
        failed: Vec::new(),
        failed_paths: BTreeSet::new(),
        replacements: Vec::new(),
        findings: Vec::new(),
        counter: RuleCounter::default(),
    };

    match run.execute() {
        Ok(report) => Ok(report),
        Err(err) => {
            run.transition(RunState::Failed);
            Err(err)
        }
    }
}

impl MigrationRun<'_> {
    fn transition(&mut self, next: RunState) {
        log::debug!("run state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn execute(&mut self) -> Result<MigrationReport> {
        let config = parse_project_config(self.tree, &self.options.config_path)?;
        self.transition(RunState::ConfigResolved);

        self.files = FileSet::partition(&config.files);
        self.config_files = config.config_files.iter().cloned().collect();
        self.config_files.extend(self.files.configs.iter().cloned());
        self.transition(RunState::FilesEnumerated);

        let versions = self
            .registry
            .versions_between(&self.options.from, &self.options.to);
        if versions.is_empty() {
            log::info!(
                "no registered upgrades between {} and {}",
                self.options.from,
                self.options.to
            );
        }

        for version in &versions {
            log::info!("applying {} upgrades", version);
            self.transition(RunState::Walking(FileKind::Source));
            self.walk_source_phase(version)?;
            self.transition(RunState::Walking(FileKind::Template));
            self.walk_template_phase(version)?;
            self.transition(RunState::Walking(FileKind::Stylesheet));
            self.walk_stylesheet_phase(version)?;
            self.transition(RunState::Walking(FileKind::BuildConfig));
            self.walk_config_phase(version)?;
        }

        self.transition(RunState::Committing);
        let report = self.commit()?;
        self.transition(RunState::Done);
        Ok(report)
    }

    fn record_failure(&mut self, path: &WorkspacePath, err: &UpliftError) {
        log::warn!("skipping {}: {}", path, err);
        if self.failed_paths.insert(path.clone()) {
            self.failed.push(FileFailure {
                path: path.clone(),
                reason: err.to_string(),
            });
        }
    }

    /// Validate and apply one file's replacement set onto the tree.
    ///
    /// `RuleConflict` and span errors fail the file, not the run.
    fn apply_to_file(
        &mut self,
        path: &WorkspacePath,
        text: &str,
        replacements: Vec<TextReplacement>,
    ) {
        if replacements.is_empty() {
            return;
        }
        if let Err(err) = validate_replacements(path, &replacements, text) {
            self.record_failure(path, &err);
            return;
        }
        let rewritten = apply_replacements(text, &replacements);
        self.tree.write(path, &rewritten);
        self.counter.add(replacements.len());
        self.replacements.extend(replacements);
    }

    fn walk_source_phase(&mut self, version: &TargetVersion) -> Result<()> {
        let rules = SourceRules {
            class_renames: self
                .registry
                .class_renames
                .for_version(version)
                .unwrap_or(&[]),
            method_call_checks: self
                .registry
                .method_call_checks
                .for_version(version)
                .unwrap_or(&[]),
            property_renames: self
                .registry
                .property_renames
                .for_version(version)
                .unwrap_or(&[]),
            import_path_renames: self
                .registry
                .import_path_renames
                .for_version(version)
                .unwrap_or(&[]),
        };

        let applicable = self.registry.class_renames.for_version(version).is_some()
            || self
                .registry
                .method_call_checks
                .for_version(version)
                .is_some()
            || self
                .registry
                .property_renames
                .for_version(version)
                .is_some()
            || self
                .registry
                .import_path_renames
                .for_version(version)
                .is_some();
        if !applicable {
            return Ok(());
        }

        let mut host = AnalysisHost::new()?;
        let sources = self.files.sources.clone();
        for path in &sources {
            if self.failed_paths.contains(path) {
                continue;
            }
            let text = match self.tree.read(path) {
                Ok(text) => text,
                Err(err) => {
                    self.record_failure(path, &err);
                    continue;
                }
            };
            let parsed = match host.parse_source(path, &text) {
                Ok(parsed) => parsed,
                Err(err) => {
                    self.record_failure(path, &err);
                    continue;
                }
            };
            let index = build_semantic_index(&parsed);
            let outcome = walk_source(&parsed, &index, &self.registry.library_prefix, &rules);

            self.counter.add(outcome.findings.len());
            self.findings.extend(outcome.findings);
            self.apply_to_file(path, &text, outcome.replacements);
        }

        Ok(())
    }

    /// Template and stylesheet walks share the pattern: walk standalone
    /// files of the kind, then fragments embedded in source files, with
    /// external references discovered from component metadata.
    fn walk_template_phase(&mut self, version: &TargetVersion) -> Result<()> {
        let Some(rules) = self.registry.attribute_renames.for_version(version) else {
            return Ok(());
        };
        let rules = rules.to_vec();

        let mut targets: BTreeSet<WorkspacePath> = self.files.templates.iter().cloned().collect();
        let mut host = AnalysisHost::new()?;
        let sources = self.files.sources.clone();

        for path in &sources {
            if self.failed_paths.contains(path) {
                continue;
            }
            let text = match self.tree.read(path) {
                Ok(text) => text,
                Err(err) => {
                    self.record_failure(path, &err);
                    continue;
                }
            };
            let parsed = match host.parse_source(path, &text) {
                Ok(parsed) => parsed,
                Err(err) => {
                    self.record_failure(path, &err);
                    continue;
                }
            };
            let metadata = collect_metadata(&parsed);

            if let Some(external) = metadata.external.template {
                if self.tree.exists(&external) {
                    targets.insert(external);
                } else {
                    log::warn!("{} references missing template {}", path, external);
                }
            }

            let mut fragment_replacements = Vec::new();
            for fragment in &metadata.inline_templates {
                let fragment_text = &text[fragment.start..fragment.end];
                let replacements =
                    crate::walk::template::walk_template(path, fragment_text, &rules);
                fragment_replacements
                    .extend(replacements.into_iter().map(|r| r.rebase(fragment.start)));
            }
            self.apply_to_file(path, &text, fragment_replacements);
        }

        for path in &targets {
            if self.failed_paths.contains(path) {
                continue;
            }
            let text = match self.tree.read(path) {
                Ok(text) => text,
                Err(err) => {
                    self.record_failure(path, &err);
                    continue;
                }
            };
            let replacements = crate::walk::template::walk_template(path, &text, &rules);
            self.apply_to_file(path, &text, replacements);
        }

        Ok(())
    }

    fn walk_stylesheet_phase(&mut self, version: &TargetVersion) -> Result<()> {
        let Some(rules) = self.registry.selector_renames.for_version(version) else {
            return Ok(());
        };
        let rules = rules.to_vec();

        let mut targets: BTreeSet<WorkspacePath> =
            self.files.stylesheets.iter().cloned().collect();
        let mut host = AnalysisHost::new()?;
        let sources = self.files.sources.clone();

        for path in &sources {
            if self.failed_paths.contains(path) {
                continue;
            }
            let text = match self.tree.read(path) {
                Ok(text) => text,
                Err(err) => {
                    self.record_failure(path, &err);
                    continue;
                }
            };
            let parsed = match host.parse_source(path, &text) {
                Ok(parsed) => parsed,
                Err(err) => {
                    self.record_failure(path, &err);
                    continue;
                }
            };
            let metadata = collect_metadata(&parsed);

            for external in &metadata.external.stylesheets {
                if self.tree.exists(external) {
                    targets.insert(external.clone());
                } else {
                    log::warn!("{} references missing stylesheet {}", path, external);
                }
            }

            let mut fragment_replacements = Vec::new();
            for fragment in &metadata.inline_styles {
                let fragment_text = &text[fragment.start..fragment.end];
                let replacements =
                    crate::walk::stylesheet::walk_stylesheet(path, fragment_text, &rules);
                fragment_replacements
                    .extend(replacements.into_iter().map(|r| r.rebase(fragment.start)));
            }
            self.apply_to_file(path, &text, fragment_replacements);
        }

        for path in &targets {
            if self.failed_paths.contains(path) {
                continue;
            }
            let text = match self.tree.read(path) {
                Ok(text) => text,
                Err(err) => {
                    self.record_failure(path, &err);
                    continue;
                }
            };
            let replacements = crate::walk::stylesheet::walk_stylesheet(path, &text, &rules);
            self.apply_to_file(path, &text, replacements);
        }

        Ok(())
    }

    fn walk_config_phase(&mut self, version: &TargetVersion) -> Result<()> {
        let Some(rules) = self.registry.import_path_renames.for_version(version) else {
            return Ok(());
        };
        let rules = rules.to_vec();

        let configs: Vec<WorkspacePath> = self.config_files.iter().cloned().collect();
        for path in &configs {
            if self.failed_paths.contains(path) {
                continue;
            }
            let text = match self.tree.read(path) {
                Ok(text) => text,
                Err(err) => {
                    self.record_failure(path, &err);
                    continue;
                }
            };
            let replacements = walk_build_config(path, &text, &rules);
            self.apply_to_file(path, &text, replacements);
        }

        Ok(())
    }

    fn commit(&mut self) -> Result<MigrationReport> {
        // A file that failed mid-walk must never be flushed, even when an
        // earlier version's pass had already edited it.
        let failed_paths: Vec<WorkspacePath> = self.failed_paths.iter().cloned().collect();
        for path in &failed_paths {
            self.tree.discard(path);
        }

        let changed = self.tree.changed_paths();
        let mut backup_manifest = None;

        if !self.options.dry_run {
            if let Some(backup_root) = &self.options.backup_root {
                if !changed.is_empty() {
                    let mut writer = BackupWriter::new(
                        backup_root,
                        None,
                        self.options.from.clone(),
                        self.options.to.clone(),
                    )?;
                    for path in &changed {
                        if let Some(original) = self.tree.backing_content(path)? {
                            writer.backup_content(path, &original)?;
                        }
                    }
                    let manifest = writer.finalize()?;
                    backup_manifest = Some(manifest.to_string_lossy().into_owned());
                }
            }
        }

        let files_changed = if self.options.dry_run {
            changed
        } else {
            let outcome = self.tree.flush();
            for (path, reason) in outcome.failed {
                let err = UpliftError::Flush {
                    path: path.as_str().to_string(),
                    reason,
                };
                self.record_failure(&path, &err);
            }
            outcome.written
        };

        Ok(MigrationReport {
            files_changed,
            files_failed: self.failed.clone(),
            rules_applied: self.counter.applied,
            findings: self.findings.clone(),
            replacements: self.replacements.clone(),
            backup_manifest,
        })
    }
}
