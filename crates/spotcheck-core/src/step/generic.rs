//! Generic text steps: replacements, regex lints, whitespace and indentation

use crate::error::Result;
use crate::lint::Lint;
use crate::traits::FormatterStep;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default ratio used by [`IndentStep`]
pub const DEFAULT_SPACES_PER_TAB: usize = 4;

/// Compile `pattern` with `^`/`$` matching at line boundaries
fn multi_line(pattern: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern).multi_line(true).build()?)
}

/// Literal search and replace
#[derive(Debug, Clone)]
pub struct ReplaceStep {
    name: String,
    target: String,
    replacement: String,
}

impl ReplaceStep {
    /// Replace every occurrence of `target`
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            replacement: replacement.into(),
        }
    }
}

impl FormatterStep for ReplaceStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self, raw_unix: &str, _file: &Path) -> Result<Option<String>> {
        if self.target.is_empty() || !raw_unix.contains(&self.target) {
            return Ok(None);
        }
        Ok(Some(raw_unix.replace(&self.target, &self.replacement)))
    }

    fn key(&self) -> serde_json::Value {
        serde_json::json!({ "target": self.target, "replacement": self.replacement })
    }
}

/// Regex replace-all; `$1`/`${name}` in the replacement refer to groups
#[derive(Debug, Clone)]
pub struct ReplaceRegexStep {
    name: String,
    regex: Regex,
    replacement: String,
}

impl ReplaceRegexStep {
    /// Fails with a configuration error on an invalid pattern
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            regex: multi_line(pattern)?,
            replacement: replacement.into(),
        })
    }
}

impl FormatterStep for ReplaceRegexStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self, raw_unix: &str, _file: &Path) -> Result<Option<String>> {
        Ok(Some(
            self.regex
                .replace_all(raw_unix, self.replacement.as_str())
                .into_owned(),
        ))
    }

    fn key(&self) -> serde_json::Value {
        serde_json::json!({ "regex": self.regex.as_str(), "replacement": self.replacement })
    }
}

/// Never changes content; reports one lint per regex match
#[derive(Debug, Clone)]
pub struct LintRegexStep {
    name: String,
    regex: Regex,
    detail: String,
}

impl LintRegexStep {
    /// Fails with a configuration error on an invalid pattern
    pub fn new(name: impl Into<String>, pattern: &str, detail: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            regex: multi_line(pattern)?,
            detail: detail.into(),
        })
    }
}

impl FormatterStep for LintRegexStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self, _raw_unix: &str, _file: &Path) -> Result<Option<String>> {
        Ok(None)
    }

    fn lint(&self, content: &str, _file: &Path) -> Result<Vec<Lint>> {
        let bytes = content.as_bytes();
        let lints = self
            .regex
            .find_iter(content)
            .map(|m| {
                let line = 1 + memchr::memchr_iter(b'\n', &bytes[..m.start()]).count();
                // short code is the first line of the trimmed match
                let code = m.as_str().trim();
                let code = code.split('\n').next().unwrap_or(code);
                Lint::at_line(line, code, self.detail.clone())
            })
            .collect();
        Ok(lints)
    }

    fn key(&self) -> serde_json::Value {
        serde_json::json!({ "regex": self.regex.as_str(), "detail": self.detail })
    }
}

/// Removes spaces and tabs at the end of every line
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimTrailingWhitespaceStep;

impl FormatterStep for TrimTrailingWhitespaceStep {
    fn name(&self) -> &str {
        "trimTrailingWhitespace"
    }

    fn format(&self, raw_unix: &str, _file: &Path) -> Result<Option<String>> {
        let mut out = String::with_capacity(raw_unix.len());
        for line in raw_unix.split_inclusive('\n') {
            match line.strip_suffix('\n') {
                Some(body) => {
                    out.push_str(body.trim_end_matches([' ', '\t']));
                    out.push('\n');
                }
                None => out.push_str(line.trim_end_matches([' ', '\t'])),
            }
        }
        if out.len() == raw_unix.len() {
            Ok(None)
        } else {
            Ok(Some(out))
        }
    }

    fn key(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Ends content with exactly one `\n`, dropping trailing blank space
#[derive(Debug, Clone, Copy, Default)]
pub struct EndWithNewlineStep;

impl FormatterStep for EndWithNewlineStep {
    fn name(&self) -> &str {
        "endWithNewline"
    }

    fn format(&self, raw_unix: &str, _file: &Path) -> Result<Option<String>> {
        let trimmed = raw_unix.trim_end();
        if trimmed.len() + 1 == raw_unix.len() && raw_unix.ends_with('\n') {
            return Ok(None);
        }
        let mut out = String::with_capacity(trimmed.len() + 1);
        out.push_str(trimmed);
        out.push('\n');
        Ok(Some(out))
    }

    fn key(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Leading whitespace style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndentKind {
    /// Indent with tabs
    Tab,
    /// Indent with spaces
    Space,
}

/// Rewrites leading whitespace of every line to tabs or spaces
#[derive(Debug, Clone)]
pub struct IndentStep {
    kind: IndentKind,
    spaces_per_tab: usize,
}

impl IndentStep {
    /// A ratio of zero is treated as one
    pub fn new(kind: IndentKind, spaces_per_tab: usize) -> Self {
        Self {
            kind,
            spaces_per_tab: spaces_per_tab.max(1),
        }
    }

    fn push_indent(&self, out: &mut String, num_spaces: usize) {
        match self.kind {
            IndentKind::Space => out.extend(std::iter::repeat(' ').take(num_spaces)),
            IndentKind::Tab => {
                out.extend(std::iter::repeat('\t').take(num_spaces / self.spaces_per_tab))
            }
        }
    }
}

impl FormatterStep for IndentStep {
    fn name(&self) -> &str {
        match self.kind {
            IndentKind::Tab => "indentWithTabs",
            IndentKind::Space => "indentWithSpaces",
        }
    }

    fn format(&self, raw_unix: &str, _file: &Path) -> Result<Option<String>> {
        let mut out = String::with_capacity(raw_unix.len());
        for line in raw_unix.split_inclusive('\n') {
            let content_start = line
                .find(|c: char| c != ' ' && c != '\t')
                .unwrap_or(line.len());
            let num_spaces: usize = line[..content_start]
                .bytes()
                .map(|b| if b == b'\t' { self.spaces_per_tab } else { 1 })
                .sum();
            self.push_indent(&mut out, num_spaces);
            out.push_str(&line[content_start..]);
        }
        Ok(Some(out))
    }

    fn key(&self) -> serde_json::Value {
        serde_json::json!({ "kind": self.kind, "spaces_per_tab": self.spaces_per_tab })
    }
}
