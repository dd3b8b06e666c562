//! Uplift CLI binary
//!
//! This is the main entry point for the uplift command-line interface.
//! The CLI is a thin adapter over existing APIs - NO logic is implemented here.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uplift::cli::{CliErrorPayload, CliSuccessPayload};
use uplift::registry::{TargetVersion, UpgradeRegistry};
use uplift::runner::{migrate, restore_from_manifest, MigrateOptions, MigrationReport};
use uplift::tree::{DiskStore, VirtualFileTree, WorkspacePath};
use uplift::workspace::resolve_workspace_root;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = uplift::cli::parse_args();

    // Initialize logger if verbose
    if cli.verbose {
        env_logger::init();
    }

    // Execute command
    let result = match cli.command {
        uplift::cli::Commands::Migrate {
            root,
            from,
            to,
            config,
            dry_run,
            backup,
        } => execute_migrate(root, &from, &to, &config, dry_run, backup),
        uplift::cli::Commands::Undo { manifest } => execute_undo(&manifest),
    };

    // Handle result
    match result {
        Ok(CommandOutcome { message, data, clean }) => {
            if cli.json {
                let payload = match data {
                    Some(data) => CliSuccessPayload::with_data(message, data),
                    None => CliSuccessPayload::message_only(message),
                };
                match serde_json::to_string_pretty(&payload) {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("Error: {}", e),
                }
            } else {
                println!("{}", message);
            }
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            if cli.json {
                let payload = CliErrorPayload::from_error(&e);
                match serde_json::to_string_pretty(&payload) {
                    Ok(json) => eprintln!("{}", json),
                    Err(_) => eprintln!("Error: {}", e),
                }
            } else {
                eprintln!("Error: {}", e);
            }
            ExitCode::from(1)
        }
    }
}

struct CommandOutcome {
    message: String,
    data: Option<serde_json::Value>,
    clean: bool,
}

/// Execute the migrate command.
///
/// This function is a thin adapter that:
/// 1. Resolves the workspace root from the invocation directory
/// 2. Snapshots the root into a virtual file tree
/// 3. Runs the migration against the builtin registry
/// 4. Renders the migration report
///
/// All logic is delegated to existing APIs. The exit code is non-zero
/// when any file failed to migrate.
fn execute_migrate(
    root: Option<PathBuf>,
    from: &str,
    to: &str,
    config: &str,
    dry_run: bool,
    backup: bool,
) -> Result<CommandOutcome, uplift::UpliftError> {
    let root = match root {
        Some(root) => root,
        None => {
            let cwd = std::env::current_dir()?;
            resolve_workspace_root(&cwd)?.root
        }
    };

    let from = TargetVersion::new(from)?;
    let to = TargetVersion::new(to)?;

    let store = DiskStore::new(&root)?;
    let mut tree = VirtualFileTree::new(Box::new(store));
    let registry = UpgradeRegistry::builtin();

    let mut options = MigrateOptions::new(from, to);
    options.config_path = WorkspacePath::new(config)?;
    options.dry_run = dry_run;
    if backup {
        options.backup_root = Some(root.clone());
    }

    let report = migrate(&mut tree, &registry, &options)?;
    let clean = report.is_clean();
    let message = render_report(&report, dry_run);
    let data = serde_json::to_value(&report).ok();

    Ok(CommandOutcome {
        message,
        data,
        clean,
    })
}

/// Render a migration report as plain text.
fn render_report(report: &MigrationReport, dry_run: bool) -> String {
    let mut out = String::new();

    if dry_run {
        out.push_str(&format!(
            "Dry run: {} file(s) would change, {} rule(s) matched\n",
            report.files_changed.len(),
            report.rules_applied
        ));
    } else {
        out.push_str(&format!(
            "Migrated: {} file(s) changed, {} rule(s) applied\n",
            report.files_changed.len(),
            report.rules_applied
        ));
    }

    for path in &report.files_changed {
        out.push_str(&format!("  changed {}\n", path));
    }
    for finding in &report.findings {
        out.push_str(&format!(
            "  check   {}:{}:{}: {}\n",
            finding.file, finding.line, finding.column, finding.message
        ));
    }
    for failure in &report.files_failed {
        out.push_str(&format!("  failed  {}: {}\n", failure.path, failure.reason));
    }
    if let Some(manifest) = &report.backup_manifest {
        out.push_str(&format!("  backup manifest: {}\n", manifest));
    }

    out.trim_end().to_string()
}

/// Execute the undo command.
///
/// Restores every file recorded in the manifest after hash verification.
fn execute_undo(manifest_path: &Path) -> Result<CommandOutcome, uplift::UpliftError> {
    let cwd = std::env::current_dir()?;
    let workspace = resolve_workspace_root(&cwd)?;

    let restored = restore_from_manifest(manifest_path, &workspace.root)?;

    Ok(CommandOutcome {
        message: format!("Restored {} file(s) from backup", restored),
        data: None,
        clean: true,
    })
}
