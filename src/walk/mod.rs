//! File-kind walkers.
//!
//! Each walker is a pure function over one file's content and the rule
//! data supplied to it: no hidden state, no I/O. The source walker gets
//! semantic facts from the analysis host; template and stylesheet walkers
//! operate on plain text with small sub-grammars.
//!
//! File kinds are detected from extensions, table-driven. Unknown
//! extensions return None, never infer from content.

pub mod source;
pub mod stylesheet;
pub mod template;

use crate::edit::TextReplacement;
use crate::registry::ImportPathRename;
use crate::tree::WorkspacePath;

/// Kinds of files the migration walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// TypeScript source (.ts, .tsx).
    Source,
    /// Markup template (.html).
    Template,
    /// Stylesheet (.css, .scss).
    Stylesheet,
    /// Project build configuration (tsconfig*.json).
    BuildConfig,
}

impl FileKind {
    /// Stable identifier for logging and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Source => "source",
            FileKind::Template => "template",
            FileKind::Stylesheet => "stylesheet",
            FileKind::BuildConfig => "build-config",
        }
    }
}

/// Detect the file kind from a path.
///
/// Declaration files (`.d.ts`) are generated output and never walked.
pub fn detect_file_kind(path: &WorkspacePath) -> Option<FileKind> {
    let name = path.file_name();
    if name.starts_with("tsconfig") && name.ends_with(".json") {
        return Some(FileKind::BuildConfig);
    }
    if name.ends_with(".d.ts") {
        return None;
    }

    let kind = match path.extension()? {
        "ts" | "tsx" => FileKind::Source,
        "html" => FileKind::Template,
        "css" | "scss" => FileKind::Stylesheet,
        _ => return None,
    };
    Some(kind)
}

/// The resolved file list partitioned by kind.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    /// Source files, sorted.
    pub sources: Vec<WorkspacePath>,
    /// Template files, sorted.
    pub templates: Vec<WorkspacePath>,
    /// Stylesheet files, sorted.
    pub stylesheets: Vec<WorkspacePath>,
    /// Build configuration files, sorted.
    pub configs: Vec<WorkspacePath>,
}

impl FileSet {
    /// Partition a resolved file list by kind, dropping unwalked files.
    pub fn partition(files: &[WorkspacePath]) -> Self {
        let mut set = FileSet::default();
        for file in files {
            match detect_file_kind(file) {
                Some(FileKind::Source) => set.sources.push(file.clone()),
                Some(FileKind::Template) => set.templates.push(file.clone()),
                Some(FileKind::Stylesheet) => set.stylesheets.push(file.clone()),
                Some(FileKind::BuildConfig) => set.configs.push(file.clone()),
                None => {}
            }
        }
        set.sources.sort();
        set.templates.sort();
        set.stylesheets.sort();
        set.configs.sort();
        set
    }
}

/// External files a source component references.
///
/// A component and its external template/stylesheets are one logical unit
/// spanning up to three files; the runner merges these into the template
/// and stylesheet walk lists so the unit migrates as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalResources {
    /// The external template, from `templateUrl`.
    pub template: Option<WorkspacePath>,
    /// External stylesheets, from `styleUrls`.
    pub stylesheets: Vec<WorkspacePath>,
}

/// Walk a build configuration file for import-path renames.
///
/// Path aliases in `compilerOptions.paths` reference library specifiers
/// as quoted strings; a specifier rename rewrites the matching prefix of
/// each quoted occurrence. Offsets are relative to `text`.
pub fn walk_build_config(
    path: &WorkspacePath,
    text: &str,
    rules: &[ImportPathRename],
) -> Vec<TextReplacement> {
    let mut replacements = Vec::new();
    let bytes = text.as_bytes();

    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'"' {
            i += 1;
            continue;
        }
        let content_start = i + 1;
        let mut j = content_start;
        while j < bytes.len() && bytes[j] != b'"' {
            if bytes[j] == b'\\' {
                j += 1;
            }
            j += 1;
        }
        if j >= bytes.len() {
            break;
        }
        let literal = &text[content_start..j];

        for rule in rules {
            if literal == rule.old_path || literal.starts_with(&format!("{}/", rule.old_path)) {
                replacements.push(TextReplacement::new(
                    path.clone(),
                    content_start,
                    content_start + rule.old_path.len(),
                    rule.new_path.clone(),
                ));
                break;
            }
        }

        i = j + 1;
    }

    replacements
}
