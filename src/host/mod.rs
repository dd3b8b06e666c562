//! Source analysis host.
//!
//! Implements the minimal file-system surface a parser front end needs —
//! read file, file exists, current directory, canonical name — entirely
//! against the virtual file tree. Nothing here falls back to real I/O:
//! a request the tree cannot express is a `HostLeak`, reported as an
//! engine defect rather than silently served from disk.
//!
//! The host also owns the tree-sitter parser for the project's source
//! language and builds the per-file semantic index (import bindings,
//! local class declarations, typed locals) the source walker relies on
//! to avoid unsafe text-level matching.

use crate::error::{Result, UpliftError};
use crate::tree::{VirtualFileTree, WorkspacePath};
use std::collections::{BTreeMap, BTreeSet};

/// A parsed source file: path, text, and its syntax tree.
pub struct ParsedSource {
    /// File the tree was parsed from.
    pub path: WorkspacePath,
    /// The exact text that was parsed.
    pub text: String,
    /// Tree-sitter syntax tree over `text`.
    pub tree: tree_sitter::Tree,
}

/// Where a class name seen in source resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassOrigin {
    /// Imported from the upgraded library.
    LibraryImport,
    /// Declared locally in the file; never a migration target.
    LocalDeclaration,
    /// No binding information available.
    Unknown,
}

/// One import binding: `import { Old as X } from '@lib/mod'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// Name the binding is visible under in this file.
    pub local: String,
    /// Name as exported by the module (`default` for default imports).
    pub imported: String,
    /// Module specifier text.
    pub module: String,
    /// Byte span of the imported-name token, for renames.
    pub imported_span: (usize, usize),
    /// Byte span of the specifier text inside its quotes.
    pub module_span: (usize, usize),
}

/// Semantic facts about one source file.
#[derive(Debug, Clone, Default)]
pub struct SemanticIndex {
    imports: Vec<ImportBinding>,
    local_classes: BTreeSet<String>,
    typed_locals: BTreeMap<String, String>,
}

impl SemanticIndex {
    /// All import bindings in the file.
    pub fn imports(&self) -> &[ImportBinding] {
        &self.imports
    }

    /// The binding a local name refers to, if it came from an import.
    pub fn binding_for(&self, local: &str) -> Option<&ImportBinding> {
        self.imports.iter().find(|b| b.local == local)
    }

    /// Classify a class name for rule gating.
    ///
    /// Rules fire for `LibraryImport` and `Unknown` receivers but never
    /// for `LocalDeclaration`: a file-local class that happens to share a
    /// name with an upgraded one is unrelated by construction.
    pub fn class_origin(&self, name: &str, library_prefix: &str) -> ClassOrigin {
        if self.local_classes.contains(name) {
            return ClassOrigin::LocalDeclaration;
        }
        match self.binding_for(name) {
            Some(binding) if binding.module.starts_with(library_prefix) => {
                ClassOrigin::LibraryImport
            }
            Some(_) => ClassOrigin::LocalDeclaration,
            None => ClassOrigin::Unknown,
        }
    }

    /// The declared or constructed class of a local variable.
    pub fn receiver_class(&self, variable: &str) -> Option<&str> {
        self.typed_locals.get(variable).map(String::as_str)
    }
}

/// File-system surface for the parser front end, backed by the tree.
pub struct AnalysisHost {
    parser: tree_sitter::Parser,
}

impl AnalysisHost {
    /// Create a host with a TypeScript parser.
    pub fn new() -> Result<Self> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_typescript::language_typescript())
            .map_err(|e| UpliftError::Parse {
                file: "<host>".to_string(),
                message: format!("Failed to set TypeScript language: {:?}", e),
            })?;
        Ok(AnalysisHost { parser })
    }

    /// Read a file through the tree by raw front-end path.
    ///
    /// Returns `None` for a missing file. A path the tree cannot express
    /// (absolute OS path, root escape) is a `HostLeak`.
    pub fn read_file(&self, tree: &mut VirtualFileTree, raw: &str) -> Result<Option<String>> {
        let path = self.canonical_file_name(raw)?;
        match tree.read(&path) {
            Ok(content) => Ok(Some(content)),
            Err(UpliftError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// True when the tree can serve the raw path.
    pub fn file_exists(&self, tree: &VirtualFileTree, raw: &str) -> bool {
        match self.canonical_file_name(raw) {
            Ok(path) => tree.exists(&path),
            Err(_) => false,
        }
    }

    /// The front end's working directory: always the workspace root.
    pub fn current_directory(&self) -> WorkspacePath {
        WorkspacePath::root()
    }

    /// Canonicalize a raw front-end path into a `WorkspacePath`.
    pub fn canonical_file_name(&self, raw: &str) -> Result<WorkspacePath> {
        WorkspacePath::new(raw).map_err(|_| UpliftError::HostLeak {
            path: raw.to_string(),
        })
    }

    /// Parse a source file already read from the tree.
    ///
    /// A file with localized syntax errors still produces a tree; only a
    /// parser refusing to produce any tree is an error.
    pub fn parse_source(&mut self, path: &WorkspacePath, text: &str) -> Result<ParsedSource> {
        let tree = self
            .parser
            .parse(text, None)
            .ok_or_else(|| UpliftError::Parse {
                file: path.as_str().to_string(),
                message: "Parse failed - no tree returned".to_string(),
            })?;

        if tree.root_node().has_error() {
            log::warn!("{} contains syntax errors; walking best-effort", path);
        }

        Ok(ParsedSource {
            path: path.clone(),
            text: text.to_string(),
            tree,
        })
    }
}

/// Build the semantic index for a parsed source file.
pub fn build_semantic_index(parsed: &ParsedSource) -> SemanticIndex {
    let mut index = SemanticIndex::default();
    collect_facts(parsed.tree.root_node(), parsed.text.as_bytes(), &mut index);
    index
}

fn collect_facts(node: tree_sitter::Node, source: &[u8], index: &mut SemanticIndex) {
    match node.kind() {
        "import_statement" => {
            collect_import(node, source, index);
            return;
        }
        "class_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                if let Ok(text) = name.utf8_text(source) {
                    index.local_classes.insert(text.to_string());
                }
            }
        }
        "variable_declarator" => {
            collect_typed_local(node, source, index);
        }
        "required_parameter" | "optional_parameter" => {
            collect_typed_parameter(node, source, index);
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_facts(child, source, index);
    }
}

/// Record bindings from one `import_statement` node.
fn collect_import(node: tree_sitter::Node, source: &[u8], index: &mut SemanticIndex) {
    let (module, module_span) = match import_source(node, source) {
        Some(found) => found,
        None => return,
    };

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "import_clause" {
            continue;
        }
        let mut clause_cursor = child.walk();
        for clause_child in child.children(&mut clause_cursor) {
            match clause_child.kind() {
                "identifier" => {
                    // Default import: `import Foo from '...'`.
                    if let Ok(local) = clause_child.utf8_text(source) {
                        index.imports.push(ImportBinding {
                            local: local.to_string(),
                            imported: "default".to_string(),
                            module: module.clone(),
                            imported_span: (clause_child.start_byte(), clause_child.end_byte()),
                            module_span,
                        });
                    }
                }
                "named_imports" => {
                    collect_named_imports(clause_child, source, &module, module_span, index);
                }
                "namespace_import" => {
                    // `import * as ns from '...'`: the last identifier is
                    // the namespace alias.
                    let mut ns_cursor = clause_child.walk();
                    for ns_child in clause_child.children(&mut ns_cursor) {
                        if ns_child.kind() == "identifier" {
                            if let Ok(local) = ns_child.utf8_text(source) {
                                index.imports.push(ImportBinding {
                                    local: local.to_string(),
                                    imported: "*".to_string(),
                                    module: module.clone(),
                                    imported_span: (ns_child.start_byte(), ns_child.end_byte()),
                                    module_span,
                                });
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

fn collect_named_imports(
    node: tree_sitter::Node,
    source: &[u8],
    module: &str,
    module_span: (usize, usize),
    index: &mut SemanticIndex,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "import_specifier" {
            continue;
        }
        let name_node = match child.child_by_field_name("name") {
            Some(n) => n,
            None => continue,
        };
        let imported = match name_node.utf8_text(source) {
            Ok(text) => text.to_string(),
            Err(_) => continue,
        };
        let local = child
            .child_by_field_name("alias")
            .and_then(|a| a.utf8_text(source).ok())
            .map(str::to_string)
            .unwrap_or_else(|| imported.clone());

        index.imports.push(ImportBinding {
            local,
            imported,
            module: module.to_string(),
            imported_span: (name_node.start_byte(), name_node.end_byte()),
            module_span,
        });
    }
}

/// The specifier text and its in-quotes span for an import statement.
fn import_source(node: tree_sitter::Node, source: &[u8]) -> Option<(String, (usize, usize))> {
    let source_node = node.child_by_field_name("source")?;
    let mut cursor = source_node.walk();
    for child in source_node.children(&mut cursor) {
        if child.kind() == "string_fragment" {
            let text = child.utf8_text(source).ok()?;
            return Some((text.to_string(), (child.start_byte(), child.end_byte())));
        }
    }
    None
}

/// Record `const x = new Foo()` and `let x: Foo` bindings.
fn collect_typed_local(node: tree_sitter::Node, source: &[u8], index: &mut SemanticIndex) {
    let name = match node
        .child_by_field_name("name")
        .filter(|n| n.kind() == "identifier")
        .and_then(|n| n.utf8_text(source).ok())
    {
        Some(name) => name.to_string(),
        None => return,
    };

    if let Some(class) = node
        .child_by_field_name("type")
        .and_then(|t| annotation_class(t, source))
    {
        index.typed_locals.insert(name, class);
        return;
    }

    if let Some(value) = node.child_by_field_name("value") {
        if value.kind() == "new_expression" {
            if let Some(class) = constructor_name(value, source) {
                index.typed_locals.insert(name, class);
            }
        }
    }
}

/// Record `constructor(private x: Foo)`-style parameter bindings.
fn collect_typed_parameter(node: tree_sitter::Node, source: &[u8], index: &mut SemanticIndex) {
    let name = match node
        .child_by_field_name("pattern")
        .filter(|n| n.kind() == "identifier")
        .and_then(|n| n.utf8_text(source).ok())
    {
        Some(name) => name.to_string(),
        None => return,
    };

    if let Some(class) = node
        .child_by_field_name("type")
        .and_then(|t| annotation_class(t, source))
    {
        index.typed_locals.insert(name, class);
    }
}

/// The class named by a `type_annotation` node, if it is a plain type.
fn annotation_class(node: tree_sitter::Node, source: &[u8]) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "type_identifier" {
            return child.utf8_text(source).ok().map(str::to_string);
        }
    }
    None
}

/// The constructor class name of a `new_expression` node.
pub fn constructor_name(node: tree_sitter::Node, source: &[u8]) -> Option<String> {
    let ctor = node.child_by_field_name("constructor")?;
    if ctor.kind() == "identifier" {
        return ctor.utf8_text(source).ok().map(str::to_string);
    }
    None
}
