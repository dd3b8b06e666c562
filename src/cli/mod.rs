//! Command-line interface for Uplift.
//!
//! This module handles argument parsing and user interface only.
//! NO migration logic is performed here.

use clap::Parser;
use serde::Serialize;
use serde_json::Value;

/// Uplift: version-keyed migration engine for TypeScript UI projects.
#[derive(Parser, Debug)]
#[command(name = "uplift")]
#[command(author, version, about, long_about = None)]
#[command(subcommand_required = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit machine-readable JSON payloads instead of plain text.
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available Uplift commands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Migrate a project between library versions.
    Migrate {
        /// Workspace root (resolved upward from the current directory
        /// when omitted).
        #[arg(short, long)]
        root: Option<std::path::PathBuf>,

        /// Version the project is currently on (e.g. v1).
        #[arg(long)]
        from: String,

        /// Version to migrate to (e.g. v2).
        #[arg(long)]
        to: String,

        /// Configuration file relative to the root.
        #[arg(long, default_value = "tsconfig.json")]
        config: String,

        /// Compute and report changes without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Snapshot originals under .uplift-backup/ before writing.
        #[arg(long)]
        backup: bool,
    },

    /// Undo a previous migration by restoring from a backup manifest.
    Undo {
        /// Path to the backup manifest file.
        #[arg(short, long)]
        manifest: std::path::PathBuf,
    },
}

/// Parse command-line arguments.
///
/// This function is the entry point for CLI argument parsing.
/// It returns the parsed Cli struct or exits on error.
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// JSON success payload for CLI responses.
#[derive(Serialize)]
pub struct CliSuccessPayload {
    /// Status indicator ("ok").
    pub status: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CliSuccessPayload {
    /// Construct a payload containing only the message.
    pub fn message_only(message: String) -> Self {
        Self {
            status: "ok",
            message,
            data: None,
        }
    }

    /// Construct a payload with structured data.
    pub fn with_data(message: String, data: Value) -> Self {
        Self {
            status: "ok",
            message,
            data: Some(data),
        }
    }
}

/// JSON error payload for CLI responses.
#[derive(Serialize)]
pub struct CliErrorPayload {
    /// Status indicator ("error").
    pub status: &'static str,
    /// Structured error details.
    pub error: ErrorDetails,
}

/// Details for a CLI error payload.
#[derive(Serialize)]
pub struct ErrorDetails {
    /// Error kind identifier (ConfigParse, RuleConflict, etc.).
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Optional file context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl CliErrorPayload {
    /// Build payload from an UpliftError instance.
    pub fn from_error(error: &crate::UpliftError) -> Self {
        CliErrorPayload {
            status: "error",
            error: ErrorDetails {
                kind: error.kind(),
                message: error.to_string(),
                file: error.file_path(),
            },
        }
    }
}
