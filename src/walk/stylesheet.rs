//! Stylesheet walker.
//!
//! Locates renamed selectors in plain stylesheet text. The sub-grammar is
//! deliberately small: a selector occurrence matches only on identifier
//! boundaries, so renaming `.qz-dialog` never touches
//! `.qz-dialog-title`. Pure with respect to the input text and rule data.

use crate::edit::TextReplacement;
use crate::registry::SelectorRename;
use crate::tree::WorkspacePath;

/// Walk stylesheet text for selector renames.
///
/// Returns sorted, non-overlapping replacements with offsets relative to
/// `text`.
pub fn walk_stylesheet(
    path: &WorkspacePath,
    text: &str,
    rules: &[SelectorRename],
) -> Vec<TextReplacement> {
    let mut replacements = Vec::new();

    for rule in rules {
        for start in occurrences(text, &rule.old_selector) {
            let end = start + rule.old_selector.len();
            if !on_selector_boundary(text, start, end) {
                continue;
            }
            replacements.push(TextReplacement::new(
                path.clone(),
                start,
                end,
                rule.new_selector.clone(),
            ));
        }
    }

    replacements.sort_by_key(|r| r.start);
    replacements
}

/// Byte offsets of every occurrence of `needle` in `text`.
fn occurrences(text: &str, needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(idx) = text[from..].find(needle) {
        found.push(from + idx);
        from += idx + needle.len();
    }
    found
}

/// True when the match at `[start, end)` sits on selector boundaries.
///
/// The right edge must not continue an identifier (`.qz-dialog` inside
/// `.qz-dialog-title`). The left edge only matters for bare element
/// selectors: a class or id selector carries its own `.`/`#` sigil, so a
/// preceding identifier (`div.qz-dialog`) is a legal compound selector.
fn on_selector_boundary(text: &str, start: usize, end: usize) -> bool {
    let first = text[start..end].chars().next();
    let starts_with_sigil = matches!(first, Some('.') | Some('#'));

    if let Some(c) = text[..start].chars().next_back() {
        if starts_with_sigil {
            if c == '.' || c == '#' {
                return false;
            }
        } else if is_ident_char(c) || c == '.' || c == '#' {
            return false;
        }
    }

    let after = text[end..].chars().next();
    if let Some(c) = after {
        if is_ident_char(c) {
            return false;
        }
    }
    true
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::apply_replacements;

    fn wp() -> WorkspacePath {
        WorkspacePath::new("styles.css").unwrap()
    }

    fn rename(old: &str, new: &str) -> SelectorRename {
        SelectorRename {
            old_selector: old.to_string(),
            new_selector: new.to_string(),
        }
    }

    #[test]
    fn test_renames_selector_everywhere() {
        let css = ".old-name { color: red; }\n.old-name:hover { color: blue; }\n";
        let rules = vec![rename(".old-name", ".new-name")];

        let reps = walk_stylesheet(&wp(), css, &rules);
        assert_eq!(reps.len(), 2);

        let rewritten = apply_replacements(css, &reps);
        assert!(rewritten.contains(".new-name"));
        assert!(!rewritten.contains(".old-name"));
    }

    #[test]
    fn test_does_not_touch_longer_selectors() {
        let css = ".qz-dialog-title { } .qz-dialog { }";
        let rules = vec![rename(".qz-dialog", ".qz-modal")];

        let reps = walk_stylesheet(&wp(), css, &rules);
        assert_eq!(reps.len(), 1);

        let rewritten = apply_replacements(css, &reps);
        assert_eq!(rewritten, ".qz-dialog-title { } .qz-modal { }");
    }

    #[test]
    fn test_matches_in_compound_selectors() {
        let css = "div.qz-dialog > .qz-dialog { }";
        let rules = vec![rename(".qz-dialog", ".qz-modal")];

        let reps = walk_stylesheet(&wp(), css, &rules);
        assert_eq!(reps.len(), 2);
        assert_eq!(
            apply_replacements(css, &reps),
            "div.qz-modal > .qz-modal { }"
        );
    }

    #[test]
    fn test_no_match_returns_empty() {
        let css = ".unrelated { }";
        let rules = vec![rename(".qz-dialog", ".qz-modal")];
        assert!(walk_stylesheet(&wp(), css, &rules).is_empty());
    }

    #[test]
    fn test_replacements_are_sorted() {
        let css = ".b { } .a { }";
        let rules = vec![rename(".a", ".a2"), rename(".b", ".b2")];

        let reps = walk_stylesheet(&wp(), css, &rules);
        assert_eq!(reps.len(), 2);
        assert!(reps[0].start < reps[1].start);
    }
}
