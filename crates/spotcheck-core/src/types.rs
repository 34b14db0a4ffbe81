//! Core type definitions shared by the engine, the pipeline and the reports

use serde::{Deserialize, Serialize};

/// Line ending written back to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LineEnding {
    /// Per-file `eol` attribute, then `core.eol`, then platform native
    #[default]
    GitAttributes,
    /// `\r\n` on Windows, `\n` elsewhere
    PlatformNative,
    /// `\r\n`
    Windows,
    /// `\n`
    Unix,
    /// Whatever the first line of the file on disk uses
    Preserve,
}

impl LineEnding {
    /// Configuration name of this policy
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GitAttributes => "git_attributes",
            Self::PlatformNative => "platform_native",
            Self::Windows => "windows",
            Self::Unix => "unix",
            Self::Preserve => "preserve",
        }
    }

    /// The separator when it does not depend on the file, `None` otherwise
    #[inline]
    pub const fn fixed_str(&self) -> Option<&'static str> {
        match self {
            Self::PlatformNative => Some(native_line_ending()),
            Self::Windows => Some("\r\n"),
            Self::Unix => Some("\n"),
            Self::GitAttributes | Self::Preserve => None,
        }
    }
}

/// Line separator of the host platform
#[inline]
pub const fn native_line_ending() -> &'static str {
    if cfg!(windows) {
        "\r\n"
    } else {
        "\n"
    }
}

/// Whether a run only reports or also rewrites files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Report dirty files, never write
    #[default]
    Check,
    /// Write canonical bytes for dirty files
    Apply,
}

impl Mode {
    /// Get string representation
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Apply => "apply",
        }
    }
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Already in canonical form, no lints
    Clean,
    /// Content differs from its canonical form
    Dirty {
        /// Canonical bytes were written back
        written: bool,
        /// Padded cell summary when the step chain was not idempotent,
        /// e.g. "cycles between 2 steps"
        #[serde(skip_serializing_if = "Option::is_none")]
        misbehaved: Option<String>,
        /// Unified diff from the file to its canonical form, in check mode
        #[serde(skip_serializing_if = "Option::is_none")]
        diff: Option<String>,
    },
    /// The step chain diverges on this file, left untouched
    DidNotConverge {
        /// Padded cell summary, e.g. "diverges after 10 steps"
        message: String,
    },
    /// Steps reported lints that no suppression silenced
    Lints {
        /// One line per lint
        detail: String,
    },
    /// Reading, formatting or writing failed
    Failed {
        /// Rendered error
        error: String,
    },
}

impl FileOutcome {
    /// Dirty, from a well-behaved step chain and without a diff
    pub const fn dirty(written: bool) -> Self {
        Self::Dirty {
            written,
            misbehaved: None,
            diff: None,
        }
    }

    /// Get string representation
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Dirty { .. } => "dirty",
            Self::DidNotConverge { .. } => "did_not_converge",
            Self::Lints { .. } => "lints",
            Self::Failed { .. } => "failed",
        }
    }

    /// True for outcomes that should fail the run in the given mode
    pub const fn is_problem(&self, mode: Mode) -> bool {
        match self {
            Self::Clean => false,
            Self::Dirty { written, .. } => match mode {
                Mode::Check => true,
                Mode::Apply => !*written,
            },
            Self::DidNotConverge { .. } | Self::Lints { .. } | Self::Failed { .. } => true,
        }
    }
}

/// Per-file entry of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    /// Path relative to the run root, `/`-separated
    pub path: String,
    /// Outcome of formatting this file
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Report for one format group
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupReport {
    /// Format name from the configuration
    pub name: String,
    /// Baseline reference when the group ratchets
    pub ratchet_from: Option<String>,
    /// Files matching the group's globs, before ratcheting
    pub files_matched: usize,
    /// Every file that went through the pipeline
    pub files: Vec<FileReport>,
}

impl GroupReport {
    /// Number of files with the given outcome name (see [`FileOutcome::as_str`])
    pub fn count(&self, outcome: &str) -> usize {
        self.files
            .iter()
            .filter(|f| f.outcome.as_str() == outcome)
            .count()
    }
}

/// Report for a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Mode the run executed in
    pub mode: Mode,
    /// One entry per format group, in configuration order
    pub groups: Vec<GroupReport>,
}

impl RunReport {
    /// Iterate over every file report of every group
    pub fn files(&self) -> impl Iterator<Item = &FileReport> {
        self.groups.iter().flat_map(|g| g.files.iter())
    }

    /// Check: every file clean. Apply: every dirty file written, nothing else wrong.
    pub fn is_success(&self) -> bool {
        !self.files().any(|f| f.outcome.is_problem(self.mode))
    }
}
