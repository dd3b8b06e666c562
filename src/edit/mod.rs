//! Span-safe text replacement primitives.
//!
//! Walkers return lists of byte-range replacements against a file's
//! current content. Before application the set is validated: in bounds,
//! on UTF-8 boundaries, and non-overlapping. Application happens in
//! descending start order over a rope, so the result is independent of
//! the order the walkers produced the ranges in.

use crate::error::{Result, UpliftError};
use crate::tree::WorkspacePath;
use ropey::Rope;
use serde::Serialize;

/// A single byte-range replacement within one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextReplacement {
    /// File the replacement applies to.
    pub file: WorkspacePath,
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
    /// Replacement contents.
    pub replacement: String,
}

impl TextReplacement {
    /// Create a new replacement.
    pub fn new(file: WorkspacePath, start: usize, end: usize, replacement: String) -> Self {
        Self {
            file,
            start,
            end,
            replacement,
        }
    }

    /// Shift the replacement's range by `base` bytes.
    ///
    /// Used to rebase ranges computed against an inline fragment (an
    /// embedded template or style block) into the enclosing source file.
    pub fn rebase(mut self, base: usize) -> Self {
        self.start += base;
        self.end += base;
        self
    }
}

/// Validate a replacement set against the file content it targets.
///
/// Checks bounds, UTF-8 boundaries, and `start <= end` for each range,
/// and rejects overlapping ranges with `RuleConflict`: two rules landing
/// on the same bytes would make the migration depend on rule order, so
/// the file fails fast instead.
pub fn validate_replacements(
    path: &WorkspacePath,
    replacements: &[TextReplacement],
    source: &str,
) -> Result<()> {
    if replacements.is_empty() {
        return Ok(());
    }

    let mut sorted: Vec<&TextReplacement> = replacements.iter().collect();
    sorted.sort_by_key(|r| (r.start, r.end));

    let mut previous: Option<&TextReplacement> = None;
    for replacement in sorted {
        if replacement.start > replacement.end || replacement.end > source.len() {
            return Err(UpliftError::InvalidSpan {
                file: path.as_str().to_string(),
                start: replacement.start,
                end: replacement.end,
            });
        }

        if !source.is_char_boundary(replacement.start) || !source.is_char_boundary(replacement.end)
        {
            return Err(UpliftError::InvalidSpan {
                file: path.as_str().to_string(),
                start: replacement.start,
                end: replacement.end,
            });
        }

        if let Some(prev) = previous {
            if replacement.start < prev.end {
                return Err(UpliftError::RuleConflict {
                    path: path.as_str().to_string(),
                    first: (prev.start, prev.end),
                    second: (replacement.start, replacement.end),
                });
            }
        }
        previous = Some(replacement);
    }

    Ok(())
}

/// Apply a validated replacement set to `source`.
///
/// Ranges are applied in descending start order against a rope, so
/// earlier replacements never shift the offsets of later ones. Callers
/// must run [`validate_replacements`] first.
pub fn apply_replacements(source: &str, replacements: &[TextReplacement]) -> String {
    let mut sorted: Vec<&TextReplacement> = replacements.iter().collect();
    sorted.sort_by_key(|r| std::cmp::Reverse(r.start));

    let mut rope = Rope::from_str(source);
    for replacement in sorted {
        let start_char = rope.byte_to_char(replacement.start);
        let end_char = rope.byte_to_char(replacement.end);
        rope.remove(start_char..end_char);
        rope.insert(start_char, &replacement.replacement);
    }

    rope.to_string()
}
