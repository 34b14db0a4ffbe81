//! Lints reported by steps, and suppressions that silence them

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder rendered when a lint has no line information
const LINE_UNDEFINED: &str = "LINE_UNDEFINED";

/// A single problem a step found in a file, which it could not (or would not) fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lint {
    /// 1-based first line, `None` when the step could not tell
    pub line_start: Option<usize>,
    /// 1-based last line (inclusive)
    pub line_end: Option<usize>,
    /// Short machine-friendly code, e.g. `no-tabs`
    pub short_code: String,
    /// Human readable detail, possibly multi-line
    pub detail: String,
}

impl Lint {
    /// Lint located on a single line
    pub fn at_line(line: usize, short_code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            line_start: Some(line),
            line_end: Some(line),
            short_code: short_code.into(),
            detail: detail.into(),
        }
    }

    /// Lint spanning `start..=end`
    pub fn at_line_range(
        start: usize,
        end: usize,
        short_code: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            line_start: Some(start),
            line_end: Some(end.max(start)),
            short_code: short_code.into(),
            detail: detail.into(),
        }
    }

    /// Lint without line information
    pub fn at_undefined_line(short_code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            line_start: None,
            line_end: None,
            short_code: short_code.into(),
            detail: detail.into(),
        }
    }

    /// Turn a step failure into lints.
    ///
    /// Failures that already carry lints keep them; anything else becomes a
    /// single lint without line information, coded by the error kind.
    pub fn from_error(err: &Error) -> Vec<Lint> {
        match err {
            Error::Lints(lints) => lints.clone(),
            other => vec![Lint::at_undefined_line(
                format!("{:?}", other.kind()),
                other.to_string(),
            )],
        }
    }

    /// Append `<line> <code>(<step>) <detail>` to `buf`.
    ///
    /// In one-line mode only the first line of the detail is kept, followed
    /// by ` (...)` when the detail had more.
    pub fn add_warning_message_to(&self, buf: &mut String, step_name: &str, one_line: bool) {
        self.write_line_range(buf);
        buf.push(' ');
        buf.push_str(&self.short_code);
        buf.push('(');
        buf.push_str(step_name);
        buf.push_str(") ");
        if one_line {
            match self.detail.split_once('\n') {
                Some((first, _)) => {
                    buf.push_str(first);
                    buf.push_str(" (...)");
                }
                None => buf.push_str(&self.detail),
            }
        } else {
            buf.push_str(&self.detail);
        }
    }

    fn write_line_range(&self, buf: &mut String) {
        match (self.line_start, self.line_end) {
            (Some(start), Some(end)) if start != end => {
                buf.push_str(&format!("{}-{}", start, end));
            }
            (Some(start), _) => buf.push_str(&start.to_string()),
            (None, _) => buf.push_str(LINE_UNDEFINED),
        }
    }
}

impl fmt::Display for Lint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut range = String::new();
        self.write_line_range(&mut range);
        write!(f, "{} {}: {}", range, self.short_code, self.detail)
    }
}

/// Silences lints matching a path, a step and a code. `*` matches anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintSuppression {
    /// Relative path (`/`-separated) or `*`
    #[serde(default = "wildcard")]
    pub path: String,
    /// Step name or `*`
    #[serde(default = "wildcard")]
    pub step: String,
    /// Lint short code or `*`
    #[serde(default = "wildcard")]
    pub short_code: String,
}

fn wildcard() -> String {
    "*".to_string()
}

impl Default for LintSuppression {
    fn default() -> Self {
        Self {
            path: wildcard(),
            step: wildcard(),
            short_code: wildcard(),
        }
    }
}

impl LintSuppression {
    /// Returns true if this suppression silences `lint` raised by `step_name` on `relative_path`.
    pub fn suppresses(&self, relative_path: &str, step_name: &str, lint: &Lint) -> bool {
        matches_or_wildcard(&self.path, relative_path)
            && matches_or_wildcard(&self.step, step_name)
            && matches_or_wildcard(&self.short_code, &lint.short_code)
    }
}

#[inline]
fn matches_or_wildcard(pattern: &str, value: &str) -> bool {
    pattern == "*" || pattern == value
}
