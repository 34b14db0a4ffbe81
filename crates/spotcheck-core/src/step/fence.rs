//! Fenced regions: format only inside, or everywhere except inside, an open/close pair

use crate::encoding::Encoding;
use crate::error::{Error, Result};
use crate::formatter::{ExceptionPolicy, Formatter};
use crate::traits::FormatterStep;
use crate::types::LineEnding;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the nested steps do relative to the fenced regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FenceMode {
    /// Nested steps format everything outside the fences, fenced text is kept verbatim
    Preserve,
    /// Nested steps format only the fenced text
    Apply,
}

/// Runs a nested step chain around or within `open ... close` regions.
pub struct FenceStep {
    name: String,
    open: String,
    close: String,
    mode: FenceMode,
    regex: Regex,
    nested: Formatter,
}

impl FenceStep {
    /// Keep fenced regions untouched while `steps` format the rest
    pub fn preserve_within(
        name: impl Into<String>,
        open: &str,
        close: &str,
        steps: Vec<Box<dyn FormatterStep>>,
    ) -> Result<Self> {
        Self::new(name, open, close, FenceMode::Preserve, steps)
    }

    /// Let `steps` format only the fenced regions
    pub fn apply_within(
        name: impl Into<String>,
        open: &str,
        close: &str,
        steps: Vec<Box<dyn FormatterStep>>,
    ) -> Result<Self> {
        Self::new(name, open, close, FenceMode::Apply, steps)
    }

    /// Build a fence step; `open` and `close` are literal markers
    pub fn new(
        name: impl Into<String>,
        open: &str,
        close: &str,
        mode: FenceMode,
        steps: Vec<Box<dyn FormatterStep>>,
    ) -> Result<Self> {
        if open.is_empty() || close.is_empty() {
            return Err(Error::Config(
                "fence open and close markers must not be empty".to_string(),
            ));
        }
        let regex = Regex::new(&format!(
            r"{}([\s\S]*?){}",
            regex::escape(open),
            regex::escape(close)
        ))?;
        // nested output stays internal, unix endings and utf-8 are enough
        let nested = Formatter::builder()
            .steps(steps)
            .encoding(Encoding::Utf8)
            .line_ending(LineEnding::Unix)
            .exception_policy(ExceptionPolicy::default())
            .build()?;
        Ok(Self {
            name: name.into(),
            open: open.to_string(),
            close: close.to_string(),
            mode,
            regex,
            nested,
        })
    }

    fn groups<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Put `groups` back into the fenced regions of `text`, in order
    fn assemble_groups<S: AsRef<str>>(&self, text: &str, groups: &[S]) -> Result<String> {
        if groups.is_empty() {
            return Ok(text.to_string());
        }
        let mut out = String::with_capacity(text.len());
        let mut last_end = 0;
        let mut idx = 0;
        for caps in self.regex.captures_iter(text) {
            let (Some(inner), Some(group)) = (caps.get(1), groups.get(idx)) else {
                return Err(self.removed_match());
            };
            out.push_str(&text[last_end..inner.start()]);
            out.push_str(group.as_ref());
            last_end = inner.end();
            idx += 1;
        }
        if idx != groups.len() {
            return Err(self.removed_match());
        }
        out.push_str(&text[last_end..]);
        Ok(out)
    }

    fn removed_match(&self) -> Error {
        Error::step_failed(format!(
            "An intermediate step removed a match of {} {}",
            self.open, self.close
        ))
    }
}

impl FormatterStep for FenceStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self, raw_unix: &str, file: &Path) -> Result<Option<String>> {
        match self.mode {
            FenceMode::Preserve => {
                let groups = self.groups(raw_unix);
                let formatted = self.nested.compute(raw_unix, file)?;
                self.assemble_groups(&formatted, &groups).map(Some)
            }
            FenceMode::Apply => {
                let groups = self
                    .groups(raw_unix)
                    .into_iter()
                    .map(|group| self.nested.compute(group, file))
                    .collect::<Result<Vec<_>>>()?;
                self.assemble_groups(raw_unix, &groups).map(Some)
            }
        }
    }

    fn key(&self) -> serde_json::Value {
        let steps: Vec<_> = self
            .nested
            .steps()
            .iter()
            .map(|s| serde_json::json!({ "name": s.name(), "key": s.key() }))
            .collect();
        serde_json::json!({
            "open": self.open,
            "close": self.close,
            "mode": self.mode,
            "steps": steps,
        })
    }

    fn finish(&self) {
        self.nested.close();
    }
}
