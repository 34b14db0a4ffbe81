//! Error types for spotcheck-core

use crate::lint::Lint;

/// Result type alias for spotcheck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for spotcheck operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Git operation error (unknown ref, missing repository, corrupt metadata)
    #[error("Git error: {0}")]
    Git(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Runtime error (Tokio, threading, etc.)
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Pattern matching error
    #[error("Pattern error: {0}")]
    Pattern(String),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Content could not be decoded or encoded with the configured charset
    #[error("{0}")]
    Encoding(String),

    /// Raised by a step for content it cannot handle
    #[error("{0}")]
    StepFailed(String),

    /// Raised by a step that can describe the problem as lints
    #[error("{}", describe_lints(.0))]
    Lints(Vec<Lint>),

    /// A step failure with the step and file attached
    #[error("Step '{step}' failed on '{path}': {message}")]
    Step {
        /// Name of the failing step
        step: String,
        /// Path of the file relative to the formatter root
        path: String,
        /// Underlying failure message
        message: String,
    },

    /// Canonical form requested from a diverging result
    #[error("No canonical form: {0}")]
    Diverged(String),

    /// Operation not valid for the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Internal engine defect
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

fn describe_lints(lints: &[Lint]) -> String {
    lints
        .iter()
        .map(|lint| lint.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        Error::Git(err.message().to_string())
    }
}

impl From<globset::Error> for Error {
    fn from(err: globset::Error) -> Self {
        Error::Pattern(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Config(format!("invalid regex: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Other(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        match err.into_io_error() {
            Some(io) => Error::Io(io),
            None => Error::InvalidPath("filesystem loop while walking".to_string()),
        }
    }
}

/// Fieldless error category for zero-cost pattern matching.
///
/// Single byte representation (`#[repr(u8)]`), `Copy`, no allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorKind {
    /// Git operation error
    Git,
    /// Configuration error
    Config,
    /// Invalid file path error
    InvalidPath,
    /// I/O operation error
    Io,
    /// Runtime error
    Runtime,
    /// Pattern matching error
    Pattern,
    /// YAML parsing error
    Yaml,
    /// Charset error
    Encoding,
    /// Step-raised failure
    StepFailed,
    /// Step-raised lints
    Lints,
    /// Step failure with context
    Step,
    /// Diverging result
    Diverged,
    /// Invalid state
    InvalidState,
    /// Engine defect
    Invariant,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind, zero allocation.
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::Git(_) => ErrorKind::Git,
            Error::Config(_) => ErrorKind::Config,
            Error::InvalidPath(_) => ErrorKind::InvalidPath,
            Error::Io(_) => ErrorKind::Io,
            Error::Runtime(_) => ErrorKind::Runtime,
            Error::Pattern(_) => ErrorKind::Pattern,
            Error::Yaml(_) => ErrorKind::Yaml,
            Error::Encoding(_) => ErrorKind::Encoding,
            Error::StepFailed(_) => ErrorKind::StepFailed,
            Error::Lints(_) => ErrorKind::Lints,
            Error::Step { .. } => ErrorKind::Step,
            Error::Diverged(_) => ErrorKind::Diverged,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::Invariant(_) => ErrorKind::Invariant,
            Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Borrow the error message, zero allocation.
    #[inline]
    pub fn message(&self) -> &str {
        match self {
            Error::Git(msg)
            | Error::Config(msg)
            | Error::InvalidPath(msg)
            | Error::Runtime(msg)
            | Error::Pattern(msg)
            | Error::Yaml(msg)
            | Error::Encoding(msg)
            | Error::StepFailed(msg)
            | Error::Diverged(msg)
            | Error::InvalidState(msg)
            | Error::Invariant(msg)
            | Error::Other(msg) => msg,
            Error::Step { message, .. } => message,
            Error::Lints(_) => "step reported lints",
            Error::Io(_) => "I/O error",
        }
    }

    /// Create a step failure, the error a step returns for malformed input.
    pub fn step_failed(msg: impl Into<String>) -> Self {
        Error::StepFailed(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_is_copy() {
        let err = Error::Git("test".to_string());
        let k = err.kind();
        let k2 = k;
        assert_eq!(k, k2);
    }

    #[test]
    fn test_error_kind_repr_u8() {
        assert_eq!(std::mem::size_of::<ErrorKind>(), 1);
    }

    #[test]
    fn test_error_message_borrows() {
        let err = Error::Config("bad config".to_string());
        let msg: &str = err.message();
        assert_eq!(msg, "bad config");
    }

    #[test]
    fn test_step_error_display_names_step_and_path() {
        let err = Error::Step {
            step: "trimTrailingWhitespace".into(),
            path: "src/main.rs".into(),
            message: "boom".into(),
        };
        let display = err.to_string();
        assert!(display.contains("trimTrailingWhitespace"));
        assert!(display.contains("src/main.rs"));
        assert!(display.contains("boom"));
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn test_lints_display_lists_every_lint() {
        let err = Error::Lints(vec![
            Lint::at_line(3, "no-tabs", "tab found"),
            Lint::at_line(7, "no-tabs", "tab found"),
        ]);
        let display = err.to_string();
        assert!(display.contains("3 no-tabs"));
        assert!(display.contains("7 no-tabs"));
    }

    #[test]
    fn test_all_error_variants_have_kind() {
        let cases: Vec<(Error, ErrorKind)> = vec![
            (Error::Git("g".into()), ErrorKind::Git),
            (Error::Config("c".into()), ErrorKind::Config),
            (Error::InvalidPath("p".into()), ErrorKind::InvalidPath),
            (Error::Io(std::io::Error::other("io")), ErrorKind::Io),
            (Error::Runtime("r".into()), ErrorKind::Runtime),
            (Error::Pattern("pat".into()), ErrorKind::Pattern),
            (Error::Yaml("y".into()), ErrorKind::Yaml),
            (Error::Encoding("e".into()), ErrorKind::Encoding),
            (Error::step_failed("s"), ErrorKind::StepFailed),
            (Error::Lints(Vec::new()), ErrorKind::Lints),
            (
                Error::Step {
                    step: "s".into(),
                    path: "p".into(),
                    message: "m".into(),
                },
                ErrorKind::Step,
            ),
            (Error::Diverged("d".into()), ErrorKind::Diverged),
            (Error::InvalidState("i".into()), ErrorKind::InvalidState),
            (Error::Invariant("inv".into()), ErrorKind::Invariant),
            (Error::Other("o".into()), ErrorKind::Other),
        ];

        for (err, expected_kind) in cases {
            assert_eq!(err.kind(), expected_kind, "Mismatch for {:?}", err);
        }
    }
}
