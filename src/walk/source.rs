//! Source walker.
//!
//! Walks a parsed TypeScript file for class renames, property renames,
//! import path renames, and method-call signature checks. All matching is
//! gated on the semantic index: a rename only fires when the name traces
//! back to an import from the upgraded library, so an unrelated local
//! class with the same name is never touched. This is the one walker
//! where plain text search would be unsafe.
//!
//! The walker also surfaces the file's component metadata: inline
//! `template:`/`styles:` fragments for the text walkers to process in
//! place, and `templateUrl`/`styleUrls` references that bind external
//! files into the component's logical unit.

use crate::edit::TextReplacement;
use crate::host::{constructor_name, ClassOrigin, ParsedSource, SemanticIndex};
use crate::registry::{
    ClassRename, ImportPathRename, MethodCallCheck, PropertyRename, RuleKind,
};
use crate::tree::WorkspacePath;
use crate::walk::ExternalResources;
use serde::Serialize;

/// Rule slices the source walker consumes for one version.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceRules<'a> {
    /// Class renames for this version.
    pub class_renames: &'a [ClassRename],
    /// Method call checks for this version.
    pub method_call_checks: &'a [MethodCallCheck],
    /// Property renames for this version.
    pub property_renames: &'a [PropertyRename],
    /// Import path renames for this version.
    pub import_path_renames: &'a [ImportPathRename],
}

/// A violation reported by a check-only rule.
///
/// Check rules flag call sites for manual migration; they never modify
/// the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckFinding {
    /// File containing the violation.
    pub file: WorkspacePath,
    /// Line number (1-based).
    pub line: usize,
    /// Column number (0-based).
    pub column: usize,
    /// The rule category that produced the finding.
    pub rule: RuleKind,
    /// Message from the rule record.
    pub message: String,
}

/// An inline fragment embedded in a source file.
///
/// Offsets point at the fragment's content inside the enclosing file, so
/// replacements computed against the fragment rebase by `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineFragment {
    /// Content start byte in the source file.
    pub start: usize,
    /// Content end byte in the source file.
    pub end: usize,
}

/// Everything one source walk produces.
#[derive(Debug, Default)]
pub struct SourceWalkOutcome {
    /// Text replacements, sorted by start offset.
    pub replacements: Vec<TextReplacement>,
    /// Check-only findings.
    pub findings: Vec<CheckFinding>,
    /// Inline `template:` fragments.
    pub inline_templates: Vec<InlineFragment>,
    /// Inline `styles:` fragments.
    pub inline_styles: Vec<InlineFragment>,
    /// External template/stylesheet references.
    pub external: ExternalResources,
}

/// Collect only the component metadata of a parsed source file.
///
/// The template and stylesheet phases re-derive inline fragments from the
/// file's current tree content instead of reusing spans from the source
/// phase, because earlier edits may have shifted offsets.
pub fn collect_metadata(parsed: &ParsedSource) -> SourceWalkOutcome {
    let mut outcome = SourceWalkOutcome::default();
    collect_component_metadata(
        parsed.tree.root_node(),
        parsed.text.as_bytes(),
        parsed,
        &mut outcome,
    );
    outcome
}

/// Walk one parsed source file against the supplied rules.
pub fn walk_source(
    parsed: &ParsedSource,
    index: &SemanticIndex,
    library_prefix: &str,
    rules: &SourceRules<'_>,
) -> SourceWalkOutcome {
    let mut outcome = SourceWalkOutcome::default();
    let source = parsed.text.as_bytes();
    let root = parsed.tree.root_node();

    let import_ranges = collect_import_ranges(root);

    rewrite_import_paths(parsed, rules.import_path_renames, &mut outcome);
    rewrite_class_names(parsed, index, &import_ranges, rules.class_renames, &mut outcome);
    walk_expressions(root, parsed, index, library_prefix, rules, &mut outcome);
    collect_component_metadata(root, source, parsed, &mut outcome);

    outcome.replacements.sort_by_key(|r| r.start);
    outcome
}

/// Byte ranges of all import/export statements, to keep reference
/// rewriting away from specifier tokens handled separately.
fn collect_import_ranges(root: tree_sitter::Node) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if matches!(child.kind(), "import_statement" | "export_statement") {
            ranges.push((child.start_byte(), child.end_byte()));
        }
    }
    ranges
}

/// Rewrite module specifiers matched by an import path rename.
///
/// Matches the exact specifier or any subpath beneath it, covering both
/// `import` and re-`export` statements, including bare side-effect
/// imports that bind no names.
fn rewrite_import_paths(
    parsed: &ParsedSource,
    rules: &[ImportPathRename],
    outcome: &mut SourceWalkOutcome,
) {
    if rules.is_empty() {
        return;
    }
    let source = parsed.text.as_bytes();
    let root = parsed.tree.root_node();

    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if !matches!(child.kind(), "import_statement" | "export_statement") {
            continue;
        }
        let Some((specifier, span)) = statement_specifier(child, source) else {
            continue;
        };
        for rule in rules {
            if specifier == rule.old_path
                || specifier.starts_with(&format!("{}/", rule.old_path))
            {
                outcome.replacements.push(TextReplacement::new(
                    parsed.path.clone(),
                    span.0,
                    span.0 + rule.old_path.len(),
                    rule.new_path.clone(),
                ));
                break;
            }
        }
    }
}

/// The specifier text and in-quotes span of an import/export statement.
fn statement_specifier(
    node: tree_sitter::Node,
    source: &[u8],
) -> Option<(String, (usize, usize))> {
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

/// True when a binding's module matches a rule's module or a subpath.
fn module_matches(binding_module: &str, rule_module: &str) -> bool {
    binding_module == rule_module
        || binding_module
            .strip_prefix(rule_module)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

/// Rewrite renamed classes: the import specifier token plus, when the
/// class is not aliased, every reference bound to it.
fn rewrite_class_names(
    parsed: &ParsedSource,
    index: &SemanticIndex,
    import_ranges: &[(usize, usize)],
    rules: &[ClassRename],
    outcome: &mut SourceWalkOutcome,
) {
    for rule in rules {
        let binding = index.imports().iter().find(|b| {
            b.imported == rule.old_name && module_matches(&b.module, &rule.module)
        });
        let Some(binding) = binding else { continue };

        outcome.replacements.push(TextReplacement::new(
            parsed.path.clone(),
            binding.imported_span.0,
            binding.imported_span.1,
            rule.new_name.clone(),
        ));

        // `import { Old as X }` keeps the alias; references stay put.
        if binding.local != binding.imported {
            continue;
        }

        collect_references(
            parsed.tree.root_node(),
            parsed.text.as_bytes(),
            &binding.local,
            import_ranges,
            &mut |node| {
                outcome.replacements.push(TextReplacement::new(
                    parsed.path.clone(),
                    node.start_byte(),
                    node.end_byte(),
                    rule.new_name.clone(),
                ));
            },
        );
    }
}

/// Visit every identifier reference to `name` outside import statements.
fn collect_references(
    node: tree_sitter::Node,
    source: &[u8],
    name: &str,
    import_ranges: &[(usize, usize)],
    visit: &mut dyn FnMut(tree_sitter::Node),
) {
    if matches!(node.kind(), "identifier" | "type_identifier") {
        let start = node.start_byte();
        let inside_import = import_ranges
            .iter()
            .any(|&(s, e)| start >= s && start < e);
        if !inside_import
            && node.utf8_text(source).map(|t| t == name).unwrap_or(false)
            && !is_property_position(node)
        {
            visit(node);
        }
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_references(child, source, name, import_ranges, visit);
    }
}

/// True when the node is the property side of a member expression or an
/// object-literal key; those share spelling, not binding.
fn is_property_position(node: tree_sitter::Node) -> bool {
    match node.parent() {
        Some(parent) if parent.kind() == "member_expression" => parent
            .child_by_field_name("property")
            .map(|p| p.id() == node.id())
            .unwrap_or(false),
        Some(parent) if parent.kind() == "pair" => parent
            .child_by_field_name("key")
            .map(|k| k.id() == node.id())
            .unwrap_or(false),
        _ => false,
    }
}

/// Walk expressions for property renames and method-call checks.
fn walk_expressions(
    node: tree_sitter::Node,
    parsed: &ParsedSource,
    index: &SemanticIndex,
    library_prefix: &str,
    rules: &SourceRules<'_>,
    outcome: &mut SourceWalkOutcome,
) {
    match node.kind() {
        "member_expression" => {
            match_property_rename(node, parsed, index, library_prefix, rules, outcome);
        }
        "call_expression" => {
            match_method_call_check(node, parsed, index, library_prefix, rules, outcome);
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_expressions(child, parsed, index, library_prefix, rules, outcome);
    }
}

/// Resolve the class a member expression's receiver refers to.
///
/// Handles `variable.prop` through the typed-locals index, `new Foo().prop`
/// directly, and static access `Foo.prop` through the import bindings.
fn receiver_class(
    object: tree_sitter::Node,
    source: &[u8],
    index: &SemanticIndex,
) -> Option<String> {
    match object.kind() {
        "identifier" => {
            let name = object.utf8_text(source).ok()?;
            if let Some(class) = index.receiver_class(name) {
                return Some(class.to_string());
            }
            // Static access: the identifier itself names the class.
            Some(name.to_string())
        }
        "new_expression" => constructor_name(object, source),
        "call_expression" => {
            // `new Foo().bar` parses as call in some positions; look
            // through to a constructor if one is there.
            let function = object.child_by_field_name("function")?;
            if function.kind() == "new_expression" {
                constructor_name(function, source)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn match_property_rename(
    node: tree_sitter::Node,
    parsed: &ParsedSource,
    index: &SemanticIndex,
    library_prefix: &str,
    rules: &SourceRules<'_>,
    outcome: &mut SourceWalkOutcome,
) {
    if rules.property_renames.is_empty() {
        return;
    }
    let source = parsed.text.as_bytes();
    let Some(property) = node.child_by_field_name("property") else {
        return;
    };
    let Ok(property_text) = property.utf8_text(source) else {
        return;
    };
    let Some(object) = node.child_by_field_name("object") else {
        return;
    };

    for rule in rules.property_renames {
        if property_text != rule.old_property {
            continue;
        }
        let Some(class) = receiver_class(object, source, index) else {
            continue;
        };
        if class != rule.class_name {
            continue;
        }
        if index.class_origin(&class, library_prefix) == ClassOrigin::LocalDeclaration {
            continue;
        }
        outcome.replacements.push(TextReplacement::new(
            parsed.path.clone(),
            property.start_byte(),
            property.end_byte(),
            rule.new_property.clone(),
        ));
    }
}

fn match_method_call_check(
    node: tree_sitter::Node,
    parsed: &ParsedSource,
    index: &SemanticIndex,
    library_prefix: &str,
    rules: &SourceRules<'_>,
    outcome: &mut SourceWalkOutcome,
) {
    if rules.method_call_checks.is_empty() {
        return;
    }
    let source = parsed.text.as_bytes();
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };
    if function.kind() != "member_expression" {
        return;
    }
    let Some(property) = function.child_by_field_name("property") else {
        return;
    };
    let Ok(method) = property.utf8_text(source) else {
        return;
    };
    let Some(object) = function.child_by_field_name("object") else {
        return;
    };
    let arg_count = node
        .child_by_field_name("arguments")
        .map(|args| args.named_child_count())
        .unwrap_or(0);

    for rule in rules.method_call_checks {
        if method != rule.method {
            continue;
        }
        let Some(class) = receiver_class(object, source, index) else {
            continue;
        };
        if class != rule.class_name {
            continue;
        }
        if index.class_origin(&class, library_prefix) == ClassOrigin::LocalDeclaration {
            continue;
        }
        for invalid in &rule.invalid_arg_counts {
            if invalid.count == arg_count {
                let position = node.start_position();
                outcome.findings.push(CheckFinding {
                    file: parsed.path.clone(),
                    line: position.row + 1,
                    column: position.column,
                    rule: RuleKind::MethodCallCheck,
                    message: invalid.message.clone(),
                });
            }
        }
    }
}

/// Collect component metadata: inline fragments and external references.
fn collect_component_metadata(
    node: tree_sitter::Node,
    source: &[u8],
    parsed: &ParsedSource,
    outcome: &mut SourceWalkOutcome,
) {
    if node.kind() == "pair" {
        if let Some(key) = node.child_by_field_name("key") {
            if let Ok(key_text) = key.utf8_text(source) {
                let key_text = key_text.trim_matches(|c| c == '"' || c == '\'');
                let value = node.child_by_field_name("value");
                match (key_text, value) {
                    ("template", Some(value)) => {
                        if let Some(span) = string_inner_span(value) {
                            outcome.inline_templates.push(InlineFragment {
                                start: span.0,
                                end: span.1,
                            });
                        }
                    }
                    ("styles", Some(value)) => {
                        for span in array_string_spans(value) {
                            outcome.inline_styles.push(InlineFragment {
                                start: span.0,
                                end: span.1,
                            });
                        }
                    }
                    ("templateUrl", Some(value)) => {
                        if let Some(url) = string_text(value, source) {
                            if let Ok(path) = parsed.path.join_sibling(&url) {
                                outcome.external.template = Some(path);
                            }
                        }
                    }
                    ("styleUrls", Some(value)) => {
                        let mut cursor = value.walk();
                        for child in value.children(&mut cursor) {
                            if let Some(url) = string_text(child, source) {
                                if let Ok(path) = parsed.path.join_sibling(&url) {
                                    outcome.external.stylesheets.push(path);
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_component_metadata(child, source, parsed, outcome);
    }
}

/// Content span of a string or template-string literal, quotes excluded.
fn string_inner_span(node: tree_sitter::Node) -> Option<(usize, usize)> {
    match node.kind() {
        "string" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "string_fragment" {
                    return Some((child.start_byte(), child.end_byte()));
                }
            }
            // Empty string literal: content span collapses.
            Some((node.start_byte() + 1, node.start_byte() + 1))
        }
        "template_string" => Some((node.start_byte() + 1, node.end_byte() - 1)),
        _ => None,
    }
}

/// Inner spans of every string element of an array literal.
fn array_string_spans(node: tree_sitter::Node) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    if node.kind() != "array" {
        return spans;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(span) = string_inner_span(child) {
            spans.push(span);
        }
    }
    spans
}

/// Text content of a string literal node.
fn string_text(node: tree_sitter::Node, source: &[u8]) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "string_fragment" {
            return child.utf8_text(source).ok().map(str::to_string);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::apply_replacements;
    use crate::host::{build_semantic_index, AnalysisHost};
    use crate::registry::InvalidArgCount;

    fn parse(source: &str) -> ParsedSource {
        let mut host = AnalysisHost::new().expect("Failed to create host");
        let path = WorkspacePath::new("src/fixture.ts").unwrap();
        host.parse_source(&path, source).expect("Failed to parse")
    }

    fn walk(source: &str, rules: &SourceRules<'_>) -> SourceWalkOutcome {
        let parsed = parse(source);
        let index = build_semantic_index(&parsed);
        walk_source(&parsed, &index, "@quartz/", rules)
    }

    fn class_rename() -> ClassRename {
        ClassRename {
            module: "@quartz/ui".to_string(),
            old_name: "QzDialog".to_string(),
            new_name: "QzModal".to_string(),
        }
    }

    #[test]
    fn test_class_rename_rewrites_import_and_references() {
        let source = "\
import { QzDialog } from '@quartz/ui';

const dialog = new QzDialog();
function open(d: QzDialog) {}
";
        let renames = [class_rename()];
        let rules = SourceRules {
            class_renames: &renames,
            ..Default::default()
        };
        let outcome = walk(source, &rules);

        let rewritten = apply_replacements(source, &outcome.replacements);
        assert!(rewritten.contains("import { QzModal } from '@quartz/ui';"));
        assert!(rewritten.contains("new QzModal()"));
        assert!(rewritten.contains("d: QzModal"));
        assert!(!rewritten.contains("QzDialog"));
    }

    #[test]
    fn test_class_rename_respects_alias() {
        let source = "\
import { QzDialog as Dialog } from '@quartz/ui';

const d = new Dialog();
";
        let renames = [class_rename()];
        let rules = SourceRules {
            class_renames: &renames,
            ..Default::default()
        };
        let outcome = walk(source, &rules);

        let rewritten = apply_replacements(source, &outcome.replacements);
        assert!(rewritten.contains("import { QzModal as Dialog } from '@quartz/ui';"));
        assert!(rewritten.contains("new Dialog()"), "alias references stay");
    }

    #[test]
    fn test_class_rename_skips_unrelated_import() {
        let source = "\
import { QzDialog } from 'some-other-lib';

const d = new QzDialog();
";
        let renames = [class_rename()];
        let rules = SourceRules {
            class_renames: &renames,
            ..Default::default()
        };
        let outcome = walk(source, &rules);
        assert!(outcome.replacements.is_empty(), "module did not match");
    }

    #[test]
    fn test_import_path_rename_covers_subpaths() {
        let source = "\
import { QzButton } from '@quartz/ui/legacy/button';
import '@quartz/ui/legacy';
export { QzChip } from '@quartz/ui/legacy/chip';
";
        let renames = [ImportPathRename {
            old_path: "@quartz/ui/legacy".to_string(),
            new_path: "@quartz/ui".to_string(),
        }];
        let rules = SourceRules {
            import_path_renames: &renames,
            ..Default::default()
        };
        let outcome = walk(source, &rules);
        assert_eq!(outcome.replacements.len(), 3);

        let rewritten = apply_replacements(source, &outcome.replacements);
        assert!(rewritten.contains("from '@quartz/ui/button'"));
        assert!(rewritten.contains("import '@quartz/ui';"));
        assert!(rewritten.contains("from '@quartz/ui/chip'"));
    }

    #[test]
    fn test_property_rename_on_typed_receiver() {
        let source = "\
import { QzTable } from '@quartz/ui';

const table = new QzTable();
table.rowData = [];
console.log(new QzTable().rowData);
";
        let renames = [PropertyRename {
            class_name: "QzTable".to_string(),
            old_property: "rowData".to_string(),
            new_property: "rows".to_string(),
        }];
        let rules = SourceRules {
            property_renames: &renames,
            ..Default::default()
        };
        let outcome = walk(source, &rules);

        let rewritten = apply_replacements(source, &outcome.replacements);
        assert!(rewritten.contains("table.rows = []"));
        assert!(rewritten.contains(".rows)"));
        assert!(!rewritten.contains("rowData"));
    }

    #[test]
    fn test_property_rename_skips_other_receivers() {
        let source = "\
import { QzTable } from '@quartz/ui';

const grid = new DataGrid();
grid.rowData = [];
";
        let renames = [PropertyRename {
            class_name: "QzTable".to_string(),
            old_property: "rowData".to_string(),
            new_property: "rows".to_string(),
        }];
        let rules = SourceRules {
            property_renames: &renames,
            ..Default::default()
        };
        let outcome = walk(source, &rules);
        assert!(outcome.replacements.is_empty());
    }

    #[test]
    fn test_method_call_check_reports_without_rewriting() {
        let source = "\
import { QzSnackbar } from '@quartz/ui';

const bar = new QzSnackbar();
bar.open('saved', 'ok', 3000);
bar.open('saved');
";
        let checks = [MethodCallCheck {
            class_name: "QzSnackbar".to_string(),
            method: "open".to_string(),
            invalid_arg_counts: vec![InvalidArgCount {
                count: 3,
                message: "open() no longer accepts 3 arguments".to_string(),
            }],
        }];
        let rules = SourceRules {
            method_call_checks: &checks,
            ..Default::default()
        };
        let outcome = walk(source, &rules);

        assert!(outcome.replacements.is_empty(), "check rules never rewrite");
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].line, 4);
        assert!(outcome.findings[0].message.contains("3 arguments"));
    }

    #[test]
    fn test_method_call_check_on_inline_construction() {
        let source = "new Foo().bar(x);\n";
        let checks = [MethodCallCheck {
            class_name: "Foo".to_string(),
            method: "bar".to_string(),
            invalid_arg_counts: vec![InvalidArgCount {
                count: 1,
                message: "bar() no longer accepts 1 argument".to_string(),
            }],
        }];
        let rules = SourceRules {
            method_call_checks: &checks,
            ..Default::default()
        };
        let outcome = walk(source, &rules);

        assert!(outcome.replacements.is_empty());
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].message, "bar() no longer accepts 1 argument");
    }

    #[test]
    fn test_local_class_is_never_a_target() {
        let source = "\
class QzSnackbar {
  open(a: string) {}
}
const bar = new QzSnackbar();
bar.open('x');
";
        let checks = [MethodCallCheck {
            class_name: "QzSnackbar".to_string(),
            method: "open".to_string(),
            invalid_arg_counts: vec![InvalidArgCount {
                count: 1,
                message: "open() changed".to_string(),
            }],
        }];
        let rules = SourceRules {
            method_call_checks: &checks,
            ..Default::default()
        };
        let outcome = walk(source, &rules);
        assert!(outcome.findings.is_empty(), "local declarations are unrelated");
    }

    #[test]
    fn test_component_metadata_extraction() {
        let source = "\
const component = {
  templateUrl: './panel.html',
  styleUrls: ['./panel.css', '../shared/theme.css'],
};
const inline = {
  template: '<div qz-tooltip=\"hi\"></div>',
  styles: ['.qz-dialog { }'],
};
";
        let rules = SourceRules::default();
        let outcome = walk(source, &rules);

        assert_eq!(
            outcome.external.template,
            Some(WorkspacePath::new("src/panel.html").unwrap())
        );
        assert_eq!(
            outcome.external.stylesheets,
            vec![
                WorkspacePath::new("src/panel.css").unwrap(),
                WorkspacePath::new("shared/theme.css").unwrap(),
            ]
        );
        assert_eq!(outcome.inline_templates.len(), 1);
        assert_eq!(outcome.inline_styles.len(), 1);

        let fragment = outcome.inline_templates[0];
        assert_eq!(
            &source[fragment.start..fragment.end],
            "<div qz-tooltip=\"hi\"></div>"
        );
    }
}
