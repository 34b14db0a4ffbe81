//! Unified diffs between a file and its canonical form

use similar::{ChangeTag, TextDiff};
use std::ops::Range;

/// Context lines around each hunk
pub const CONTEXT_LINES: usize = 3;

/// Diff lines a text summary prints across all files
pub const MAX_DIFF_LINES: usize = 50;

/// Diff lines every listed file gets, even once the budget is spent
pub const MIN_LINES_PER_FILE: usize = 4;

/// Files whose diff is printed; later files are only listed
pub const MAX_FILES_WITH_DIFF: usize = 10;

/// Git-style hunks turning `raw` into `canonical`, without file headers.
///
/// Carriage returns render as `␍` so a line ending change is visible.
/// Equal texts give an empty string.
pub fn unified_diff(raw: &str, canonical: &str) -> String {
    let diff = TextDiff::from_lines(raw, canonical);
    let mut out = String::new();
    for group in diff.grouped_ops(CONTEXT_LINES) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old = first.old_range().start..last.old_range().end;
        let new = first.new_range().start..last.new_range().end;
        out.push_str(&format!("@@ -{} +{} @@\n", hunk_range(old), hunk_range(new)));
        for op in &group {
            for change in diff.iter_changes(op) {
                out.push(match change.tag() {
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                    ChangeTag::Equal => ' ',
                });
                let value = change.value();
                let line = value.strip_suffix('\n');
                push_visible(&mut out, line.unwrap_or(value));
                out.push('\n');
                if line.is_none() {
                    out.push_str("\\ No newline at end of file\n");
                }
            }
        }
    }
    out
}

fn hunk_range(range: Range<usize>) -> String {
    match range.len() {
        0 => format!("{},0", range.start),
        1 => format!("{}", range.start + 1),
        len => format!("{},{}", range.start + 1, len),
    }
}

fn push_visible(out: &mut String, line: &str) {
    for c in line.chars() {
        match c {
            '\r' => out.push('␍'),
            c => out.push(c),
        }
    }
}

/// Shares [`MAX_DIFF_LINES`] between the files of one summary
#[derive(Debug)]
pub struct DiffBudget {
    remaining: usize,
    files: usize,
}

impl Default for DiffBudget {
    fn default() -> Self {
        Self {
            remaining: MAX_DIFF_LINES,
            files: 0,
        }
    }
}

impl DiffBudget {
    /// Lines of `diff` to print and how many were left out, or `None`
    /// once [`MAX_FILES_WITH_DIFF`] files have had theirs
    pub fn take<'a>(&mut self, diff: &'a str) -> Option<(Vec<&'a str>, usize)> {
        if self.files >= MAX_FILES_WITH_DIFF {
            return None;
        }
        self.files += 1;
        let mut lines: Vec<&str> = diff.lines().collect();
        let shown = lines.len().min(self.remaining.max(MIN_LINES_PER_FILE));
        let omitted = lines.len() - shown;
        self.remaining = self.remaining.saturating_sub(shown);
        lines.truncate(shown);
        Some((lines, omitted))
    }
}
