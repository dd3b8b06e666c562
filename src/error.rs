//! Uplift error types.
//!
//! All errors are typed and provide root cause information. Errors local to
//! one file (`Conflict`, `RuleConflict`, `Flush`) are caught by the runner
//! and aggregated into the migration report; configuration and host errors
//! abort the run before any write.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Uplift operations.
#[derive(Error, Debug)]
pub enum UpliftError {
    /// I/O error during file operations.
    #[error("I/O error for path {path}: {source}")]
    Io {
        /// The file path that caused the I/O error.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A path was requested that is not present in the virtual tree.
    #[error("File not found in tree: {path}")]
    NotFound {
        /// The workspace-relative path that was requested.
        path: String,
    },

    /// A path escaped the declared workspace root.
    #[error("Path escapes workspace root: {path}")]
    PathEscape {
        /// The offending path as given by the caller.
        path: String,
    },

    /// The current directory is not nested under any known workspace root.
    #[error("Cannot resolve a workspace root from {dir}")]
    Unresolvable {
        /// The directory the resolution started from.
        dir: PathBuf,
    },

    /// Project configuration could not be parsed.
    #[error("Config parse error in {path}: {reason}")]
    ConfigParse {
        /// The configuration file that failed to parse.
        path: String,
        /// Human-readable diagnostic.
        reason: String,
    },

    /// A rename or write collided with an existing file.
    #[error("Conflict: {path} already exists (pass overwrite to replace)")]
    Conflict {
        /// The destination path that already exists.
        path: String,
    },

    /// Two rules produced overlapping replacement ranges in one file.
    #[error("Rule conflict in {path}: ranges {first:?} and {second:?} overlap")]
    RuleConflict {
        /// The file with conflicting replacements.
        path: String,
        /// The earlier overlapping range.
        first: (usize, usize),
        /// The later overlapping range.
        second: (usize, usize),
    },

    /// The analysis host was asked for a file outside the virtual tree.
    ///
    /// This is an engine defect, not a user-data problem: every file the
    /// parser front end believes exists must be served by the tree.
    #[error("Host leak: request for {path} cannot be served by the virtual tree")]
    HostLeak {
        /// The path the front end requested.
        path: String,
    },

    /// Flushing a pending write back to the backing store failed.
    #[error("Flush failed for {path}: {reason}")]
    Flush {
        /// The file that could not be written.
        path: String,
        /// The underlying failure description.
        reason: String,
    },

    /// Tree-sitter parsing error.
    #[error("Parse error in {file}: {message}")]
    Parse {
        /// The file that failed to parse.
        file: String,
        /// The parse error message.
        message: String,
    },

    /// Invalid byte span.
    #[error("Invalid span ({start}, {end}) in {file}")]
    InvalidSpan {
        /// The file containing the invalid span.
        file: String,
        /// Start byte offset.
        start: usize,
        /// End byte offset.
        end: usize,
    },

    /// Malformed target version identifier.
    #[error("Invalid target version '{value}': expected 'v' followed by a number")]
    Version {
        /// The identifier that failed to parse.
        value: String,
    },

    /// Invalid backup manifest.
    #[error("Invalid backup manifest: {message}")]
    InvalidManifest {
        /// The manifest validation error message.
        message: String,
    },

    /// UTF-8 validation error.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Generic error with context.
    #[error("{0}")]
    Other(String),
}

impl UpliftError {
    /// Stable kind identifier used in CLI error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            UpliftError::Io { .. } => "Io",
            UpliftError::NotFound { .. } => "NotFound",
            UpliftError::PathEscape { .. } => "PathEscape",
            UpliftError::Unresolvable { .. } => "Unresolvable",
            UpliftError::ConfigParse { .. } => "ConfigParse",
            UpliftError::Conflict { .. } => "Conflict",
            UpliftError::RuleConflict { .. } => "RuleConflict",
            UpliftError::HostLeak { .. } => "HostLeak",
            UpliftError::Flush { .. } => "Flush",
            UpliftError::Parse { .. } => "Parse",
            UpliftError::InvalidSpan { .. } => "InvalidSpan",
            UpliftError::Version { .. } => "Version",
            UpliftError::InvalidManifest { .. } => "InvalidManifest",
            UpliftError::Utf8(_) => "Utf8",
            UpliftError::Other(_) => "Other",
        }
    }

    /// File context for CLI error payloads, when the error carries one.
    pub fn file_path(&self) -> Option<String> {
        match self {
            UpliftError::Io { path, .. } => Some(path.to_string_lossy().into_owned()),
            UpliftError::NotFound { path }
            | UpliftError::PathEscape { path }
            | UpliftError::Conflict { path }
            | UpliftError::RuleConflict { path, .. }
            | UpliftError::HostLeak { path }
            | UpliftError::Flush { path, .. }
            | UpliftError::ConfigParse { path, .. } => Some(path.clone()),
            UpliftError::Parse { file, .. } | UpliftError::InvalidSpan { file, .. } => {
                Some(file.clone())
            }
            _ => None,
        }
    }

    /// True when the error is fatal for the whole run rather than one file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            UpliftError::ConfigParse { .. }
                | UpliftError::HostLeak { .. }
                | UpliftError::Unresolvable { .. }
                | UpliftError::Version { .. }
        )
    }
}

impl From<std::io::Error> for UpliftError {
    fn from(err: std::io::Error) -> Self {
        UpliftError::Io {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

/// Result type alias for Uplift operations.
pub type Result<T> = std::result::Result<T, UpliftError>;
