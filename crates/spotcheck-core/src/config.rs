//! YAML configuration: format groups, their globs and their step chains
//!
//! ```yaml
//! ratchet_from: origin/main
//! line_endings: unix
//! formats:
//!   - name: rust
//!     includes: ["**/*.rs"]
//!     excludes: ["target/**"]
//!     steps:
//!       - type: trim_trailing_whitespace
//!       - type: end_with_newline
//!       - type: indent
//!         style: space
//!         spaces_per_tab: 4
//!         only: ["src/**"]
//! ```

use crate::encoding::Encoding;
use crate::error::{Error, Result};
use crate::formatter::{ExceptionPolicy, Formatter};
use crate::lint::LintSuppression;
use crate::patterns::PatternMatcher;
use crate::step::generic::DEFAULT_SPACES_PER_TAB;
use crate::step::{
    EndWithNewlineStep, FenceMode, FenceStep, FilteredStep, IndentKind, IndentStep,
    LintRegexStep, ReplaceRegexStep, ReplaceStep, TrimTrailingWhitespaceStep,
};
use crate::traits::FormatterStep;
use crate::types::LineEnding;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Config file looked up in the project root when none is given
pub const DEFAULT_CONFIG_FILE: &str = "spotcheck.yml";

/// Whole configuration file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpotConfig {
    /// Baseline reference for every format without its own
    #[serde(default)]
    pub ratchet_from: Option<String>,
    /// Line ending policy for every format without its own
    #[serde(default)]
    pub line_endings: LineEnding,
    /// Charset for every format without its own
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Size of each worker pool (read, compute, write)
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// Directory receiving the intermediate outputs of misbehaving step
    /// chains, one subdirectory per format. Relative to the project root.
    #[serde(default)]
    pub diagnose_dir: Option<PathBuf>,
    /// Format groups, processed in order
    #[serde(default)]
    pub formats: Vec<FormatSpec>,
}

fn default_encoding() -> String {
    Encoding::Utf8.as_str().to_string()
}

impl SpotConfig {
    /// Parse and validate YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: SpotConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&yaml)
    }

    /// Check names, charsets and pool sizes
    pub fn validate(&self) -> Result<()> {
        Encoding::parse(&self.encoding)?;
        if self.concurrency == Some(0) {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        let mut names = HashSet::with_capacity(self.formats.len());
        for format in &self.formats {
            if format.name.is_empty() {
                return Err(Error::Config("format name must not be empty".to_string()));
            }
            if !names.insert(format.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate format name '{}'",
                    format.name
                )));
            }
            if let Some(encoding) = &format.encoding {
                Encoding::parse(encoding)?;
            }
        }
        Ok(())
    }

    /// Replace every format's baseline with `reference`
    pub fn override_ratchet_from(&mut self, reference: &str) {
        self.ratchet_from = Some(reference.to_string());
        for format in &mut self.formats {
            format.ratchet_from = Some(reference.to_string());
        }
    }
}

/// One format group
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatSpec {
    /// Unique name, used in reports
    pub name: String,
    /// Globs selecting files, relative to the root
    #[serde(default)]
    pub includes: Vec<String>,
    /// Globs removing files from the selection
    #[serde(default)]
    pub excludes: Vec<String>,
    /// Baseline reference overriding the global one
    #[serde(default)]
    pub ratchet_from: Option<String>,
    /// Line ending policy overriding the global one
    #[serde(default)]
    pub line_endings: Option<LineEnding>,
    /// Charset overriding the global one
    #[serde(default)]
    pub encoding: Option<String>,
    /// What to do when a step fails
    #[serde(default)]
    pub exception_policy: ExceptionPolicy,
    /// Lints to ignore
    #[serde(default)]
    pub lint_suppressions: Vec<LintSuppression>,
    /// Step chain, applied in order
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

impl FormatSpec {
    /// Baseline reference in effect for this format
    pub fn effective_ratchet_from<'a>(&'a self, config: &'a SpotConfig) -> Option<&'a str> {
        self.ratchet_from
            .as_deref()
            .or(config.ratchet_from.as_deref())
    }

    /// Include/exclude matcher for this format's files
    pub fn matcher(&self) -> Result<PatternMatcher> {
        PatternMatcher::new(&self.includes, &self.excludes)
    }

    /// Build the formatter for this format, rooted at `root`
    pub fn formatter(&self, config: &SpotConfig, root: &Path) -> Result<Formatter> {
        let encoding = Encoding::parse(self.encoding.as_deref().unwrap_or(&config.encoding))?;
        let steps = self
            .steps
            .iter()
            .map(|spec| spec.build(root))
            .collect::<Result<Vec<_>>>()?;
        Formatter::builder()
            .steps(steps)
            .encoding(encoding)
            .line_ending(self.line_endings.unwrap_or(config.line_endings))
            .exception_policy(self.exception_policy.clone())
            .root(root)
            .build()
            .map_err(|e| match e {
                Error::Config(msg) => Error::Config(format!("format '{}': {}", self.name, msg)),
                other => other,
            })
    }
}

/// A configured step, optionally restricted to some files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Step type and its settings
    #[serde(flatten)]
    pub kind: StepKind,
    /// Globs the step is limited to; empty means every file of the format
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub only: Vec<String>,
}

/// Step types available from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Literal replacement
    Replace {
        /// Step name, `replace` by default
        name: Option<String>,
        /// Text to find
        target: String,
        /// Text to put in its place
        replacement: String,
    },
    /// Multi-line regex replacement
    ReplaceRegex {
        /// Step name, `replaceRegex` by default
        name: Option<String>,
        /// Pattern
        regex: String,
        /// Replacement, may refer to groups
        replacement: String,
    },
    /// One lint per regex match
    LintRegex {
        /// Step name, `lintRegex` by default
        name: Option<String>,
        /// Pattern
        regex: String,
        /// Lint detail
        detail: String,
    },
    /// Remove trailing spaces and tabs
    TrimTrailingWhitespace,
    /// Exactly one trailing newline
    EndWithNewline,
    /// Leading whitespace style
    Indent {
        /// Tabs or spaces
        style: IndentKind,
        /// Width of a tab in spaces
        #[serde(default = "default_spaces_per_tab")]
        spaces_per_tab: usize,
    },
    /// Nested steps inside or around fenced regions
    Fence {
        /// Step name, `fence` by default
        name: Option<String>,
        /// Opening marker
        open: String,
        /// Closing marker
        close: String,
        /// Preserve or apply within the fences
        mode: FenceMode,
        /// Nested step chain
        steps: Vec<StepSpec>,
    },
}

fn default_spaces_per_tab() -> usize {
    DEFAULT_SPACES_PER_TAB
}

impl StepSpec {
    /// Instantiate the step; `only` globs are matched relative to `root`
    pub fn build(&self, root: &Path) -> Result<Box<dyn FormatterStep>> {
        let step: Box<dyn FormatterStep> = match &self.kind {
            StepKind::Replace {
                name,
                target,
                replacement,
            } => Box::new(ReplaceStep::new(
                name.as_deref().unwrap_or("replace"),
                target.as_str(),
                replacement.as_str(),
            )),
            StepKind::ReplaceRegex {
                name,
                regex,
                replacement,
            } => Box::new(ReplaceRegexStep::new(
                name.as_deref().unwrap_or("replaceRegex"),
                regex,
                replacement.as_str(),
            )?),
            StepKind::LintRegex {
                name,
                regex,
                detail,
            } => Box::new(LintRegexStep::new(
                name.as_deref().unwrap_or("lintRegex"),
                regex,
                detail.as_str(),
            )?),
            StepKind::TrimTrailingWhitespace => Box::new(TrimTrailingWhitespaceStep),
            StepKind::EndWithNewline => Box::new(EndWithNewlineStep),
            StepKind::Indent {
                style,
                spaces_per_tab,
            } => Box::new(IndentStep::new(*style, *spaces_per_tab)),
            StepKind::Fence {
                name,
                open,
                close,
                mode,
                steps,
            } => {
                let nested = steps
                    .iter()
                    .map(|spec| spec.build(root))
                    .collect::<Result<Vec<_>>>()?;
                Box::new(FenceStep::new(
                    name.as_deref().unwrap_or("fence"),
                    open,
                    close,
                    *mode,
                    nested,
                )?)
            }
        };

        if self.only.is_empty() {
            Ok(step)
        } else {
            Ok(Box::new(FilteredStep::new(step, self.only.clone(), root)?))
        }
    }
}
