//! Template walker.
//!
//! Locates renamed attributes in markup text. The sub-grammar tracks tag
//! interiors and quoted attribute values, so an attribute name only
//! matches where an attribute can actually appear: never in text content,
//! never inside a value string. Handles the plain form (`qz-tooltip`) and
//! the bound forms (`[qzTooltip]`, `(qzTooltip)`).

use crate::edit::TextReplacement;
use crate::registry::AttributeRename;
use crate::tree::WorkspacePath;

/// Walk template text for attribute renames.
///
/// Returns sorted replacements with offsets relative to `text`.
pub fn walk_template(
    path: &WorkspacePath,
    text: &str,
    rules: &[AttributeRename],
) -> Vec<TextReplacement> {
    let map = TemplateMap::scan(text);
    let mut replacements = Vec::new();

    for rule in rules {
        for start in occurrences(text, &rule.old_attribute) {
            let end = start + rule.old_attribute.len();
            if !map.is_attribute_position(text, start, end) {
                continue;
            }
            replacements.push(TextReplacement::new(
                path.clone(),
                start,
                end,
                rule.new_attribute.clone(),
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

/// Structural map of a template: tag interiors and quoted spans.
struct TemplateMap {
    /// Byte ranges strictly between a tag's name and its closing `>`.
    tag_interiors: Vec<(usize, usize)>,
    /// Byte ranges inside quoted attribute values.
    quoted: Vec<(usize, usize)>,
}

impl TemplateMap {
    fn scan(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut tag_interiors = Vec::new();
        let mut quoted = Vec::new();

        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'<' {
                i += 1;
                continue;
            }
            // Only element tags introduce attributes; skip comments,
            // closing tags, doctypes.
            let next = bytes.get(i + 1).copied();
            if !matches!(next, Some(c) if c.is_ascii_alphabetic()) {
                i += 1;
                continue;
            }

            // Skip past the tag name.
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'-') {
                j += 1;
            }
            let interior_start = j;

            // Scan to the closing '>', recording quoted value spans.
            let mut quote: Option<(u8, usize)> = None;
            while j < bytes.len() {
                match (quote, bytes[j]) {
                    (None, b'"') | (None, b'\'') => quote = Some((bytes[j], j + 1)),
                    (Some((q, qstart)), c) if c == q => {
                        quoted.push((qstart, j));
                        quote = None;
                    }
                    (None, b'>') => break,
                    _ => {}
                }
                j += 1;
            }

            tag_interiors.push((interior_start, j.min(bytes.len())));
            i = j + 1;
        }

        TemplateMap {
            tag_interiors,
            quoted,
        }
    }

    /// True when `[start, end)` names an attribute.
    fn is_attribute_position(&self, text: &str, start: usize, end: usize) -> bool {
        let in_tag = self
            .tag_interiors
            .iter()
            .any(|&(s, e)| start >= s && end <= e);
        if !in_tag {
            return false;
        }
        if self.quoted.iter().any(|&(s, e)| start >= s && end <= e) {
            return false;
        }

        let before = text[..start].chars().next_back();
        match before {
            Some(' ') | Some('\t') | Some('\n') | Some('[') | Some('(') | Some('*') => {}
            _ => return false,
        }

        let after = text[end..].chars().next();
        matches!(
            after,
            Some('=') | Some(' ') | Some('\t') | Some('\n') | Some('>') | Some('/') | Some(']')
                | Some(')')
        )
    }
}
