//! Formatter: an ordered step chain with encoding, line endings and exception policy

use crate::encoding::Encoding;
use crate::error::{Error, Result};
use crate::line_ending::{from_unix, policy_for, to_unix};
use crate::lint::LintSuppression;
use crate::traits::{FormatterStep, LineEndingPolicy};
use crate::types::LineEnding;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// One optional value per step of a formatter, indexed like its steps
#[derive(Debug)]
pub struct PerStep<T> {
    values: Vec<Option<T>>,
}

impl<T> PerStep<T> {
    /// Empty slots for `len` steps
    pub fn new(len: usize) -> Self {
        Self {
            values: std::iter::repeat_with(|| None).take(len).collect(),
        }
    }

    /// Set the value for step `idx`, replacing any previous one
    pub fn set(&mut self, idx: usize, value: T) {
        if let Some(slot) = self.values.get_mut(idx) {
            *slot = Some(value);
        }
    }

    /// Value for step `idx`
    pub fn get(&self, idx: usize) -> Option<&T> {
        self.values.get(idx).and_then(Option::as_ref)
    }

    /// Index of the first step holding a value
    pub fn index_of_first_value(&self) -> Option<usize> {
        self.values.iter().position(Option::is_some)
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when there are no slots
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(step index, value)` over filled slots
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (i, v)))
    }
}

/// What to do when a step fails on a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExceptionPolicy {
    /// Fail the file instead of logging and continuing
    pub strict: bool,
    /// Step names whose failures are ignored
    pub exclude_steps: Vec<String>,
    /// Relative paths whose failures are ignored
    pub exclude_paths: Vec<String>,
}

impl Default for ExceptionPolicy {
    fn default() -> Self {
        Self {
            strict: true,
            exclude_steps: Vec::new(),
            exclude_paths: Vec::new(),
        }
    }
}

impl ExceptionPolicy {
    /// Log and continue on every failure
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Default::default()
        }
    }

    /// Exclusions expressed as lint suppressions, for callers that report
    /// failures as lints
    pub fn as_suppressions(&self) -> Vec<LintSuppression> {
        let steps = self.exclude_steps.iter().map(|step| LintSuppression {
            step: step.clone(),
            ..Default::default()
        });
        let paths = self.exclude_paths.iter().map(|path| LintSuppression {
            path: path.clone(),
            ..Default::default()
        });
        steps.chain(paths).collect()
    }

    /// Decide the fate of a failure of `step` on `relative_path`
    pub fn handle(&self, err: &Error, step: &str, relative_path: &str) -> Result<()> {
        if self.exclude_steps.iter().any(|s| s == step)
            || self.exclude_paths.iter().any(|p| p == relative_path)
        {
            debug!(step, path = relative_path, error = %err, "step failure excluded by policy");
            return Ok(());
        }
        if self.strict {
            error!(step, path = relative_path, "step found problem:\n{}", err);
            return Err(Error::Step {
                step: step.to_string(),
                path: relative_path.to_string(),
                message: err.to_string(),
            });
        }
        warn!(step, path = relative_path, error = %err, "unable to apply step");
        Ok(())
    }
}

/// An immutable chain of steps plus the encoding and line endings used to write files.
///
/// Dropping a formatter closes it, releasing every step's resources.
pub struct Formatter {
    steps: Vec<Box<dyn FormatterStep>>,
    encoding: Encoding,
    line_ending: LineEnding,
    line_endings: Arc<dyn LineEndingPolicy>,
    exception_policy: ExceptionPolicy,
    root: PathBuf,
    closed: AtomicBool,
}

impl Formatter {
    /// Start building a formatter
    pub fn builder() -> FormatterBuilder {
        FormatterBuilder::default()
    }

    /// Steps in application order
    pub fn steps(&self) -> &[Box<dyn FormatterStep>] {
        &self.steps
    }

    /// Charset of the files this formatter reads and writes
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Configured line ending choice
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Policy resolving the line ending per file
    pub fn line_endings_policy(&self) -> &Arc<dyn LineEndingPolicy> {
        &self.line_endings
    }

    /// Exception policy applied by [`Formatter::compute`]
    pub fn exception_policy(&self) -> &ExceptionPolicy {
        &self.exception_policy
    }

    /// Directory that relative paths in diagnostics are computed from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `file` relative to the root, `/`-separated; the path itself when outside the root
    pub fn relative_path(&self, file: &Path) -> String {
        let rel = file.strip_prefix(&self.root).unwrap_or(file);
        rel.to_string_lossy().replace('\\', "/")
    }

    /// Apply every step in order, failing according to the exception policy.
    pub fn compute(&self, unix: &str, file: &Path) -> Result<String> {
        let mut failures = PerStep::new(self.steps.len());
        let result = self.compute_with_lint(unix, file, &mut failures);
        self.check_failures(file, &failures)?;
        Ok(result)
    }

    /// Apply every step in order, recording failures instead of returning them.
    ///
    /// A failed step leaves the content as it was; `None` from a step means
    /// no change. Step output is re-normalized to `\n`.
    pub fn compute_with_lint(
        &self,
        unix: &str,
        file: &Path,
        failures: &mut PerStep<Error>,
    ) -> String {
        let mut current = unix.to_string();
        for (idx, step) in self.steps.iter().enumerate() {
            match step.format(&current, file) {
                Ok(Some(formatted)) => {
                    let normalized = match to_unix(&formatted) {
                        Cow::Owned(clean) => Some(clean),
                        Cow::Borrowed(_) => None,
                    };
                    current = normalized.unwrap_or(formatted);
                }
                Ok(None) => {}
                Err(err) => failures.set(idx, err),
            }
        }
        current
    }

    /// Run recorded failures through the exception policy, in step order
    pub fn check_failures(&self, file: &Path, failures: &PerStep<Error>) -> Result<()> {
        if failures.index_of_first_value().is_none() {
            return Ok(());
        }
        let relative = self.relative_path(file);
        for (idx, err) in failures.iter() {
            let name = self.steps.get(idx).map(|s| s.name()).unwrap_or("unknown");
            self.exception_policy.handle(err, name, &relative)?;
        }
        Ok(())
    }

    /// Convert `\n` to the ending the policy picks for `file`
    pub fn compute_line_endings<'a>(&self, unix: &'a str, file: &Path) -> Result<Cow<'a, str>> {
        if self.line_endings.is_unix() {
            return Ok(Cow::Borrowed(unix));
        }
        let ending = self.line_endings.ending_for(file)?;
        Ok(from_unix(unix, ending))
    }

    /// Call `finish` on every step. Later calls do nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for step in &self.steps {
            step.finish();
        }
    }

    /// True once [`Formatter::close`] ran
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Formatter {
    fn drop(&mut self) {
        self.close();
    }
}

impl PartialEq for Formatter {
    fn eq(&self, other: &Self) -> bool {
        self.encoding == other.encoding
            && self.line_ending == other.line_ending
            && self.root == other.root
            && self.steps.len() == other.steps.len()
            && self
                .steps
                .iter()
                .zip(other.steps.iter())
                .all(|(a, b)| a.name() == b.name() && a.key() == b.key())
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatter")
            .field(
                "steps",
                &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("encoding", &self.encoding)
            .field("line_ending", &self.line_ending)
            .field("root", &self.root)
            .finish()
    }
}

/// Builder for [`Formatter`]
#[derive(Default)]
pub struct FormatterBuilder {
    steps: Vec<Box<dyn FormatterStep>>,
    encoding: Encoding,
    line_ending: Option<LineEnding>,
    line_endings: Option<Arc<dyn LineEndingPolicy>>,
    exception_policy: ExceptionPolicy,
    root: Option<PathBuf>,
}

impl FormatterBuilder {
    /// Append a step
    pub fn step(mut self, step: impl FormatterStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Append boxed steps
    pub fn steps(mut self, steps: impl IntoIterator<Item = Box<dyn FormatterStep>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Charset, UTF-8 by default
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Line ending choice; the policy is resolved against the root at build time
    pub fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = Some(line_ending);
        self
    }

    /// Use an already built policy instead of resolving one
    pub fn line_endings_policy(mut self, policy: Arc<dyn LineEndingPolicy>) -> Self {
        self.line_endings = Some(policy);
        self
    }

    /// Exception policy, strict by default
    pub fn exception_policy(mut self, policy: ExceptionPolicy) -> Self {
        self.exception_policy = policy;
        self
    }

    /// Root directory, the current directory by default
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Build the formatter. Two steps with the same name are rejected.
    pub fn build(self) -> Result<Formatter> {
        let mut seen = HashSet::with_capacity(self.steps.len());
        for step in &self.steps {
            if !seen.insert(step.name()) {
                return Err(Error::Config(format!(
                    "Multiple steps with name '{}'",
                    step.name()
                )));
            }
        }

        let root = self.root.unwrap_or_default();
        let line_ending = self.line_ending.unwrap_or_default();
        let line_endings = match self.line_endings {
            Some(policy) => policy,
            None => policy_for(line_ending, &root),
        };

        Ok(Formatter {
            steps: self.steps,
            encoding: self.encoding,
            line_ending,
            line_endings,
            exception_policy: self.exception_policy,
            root,
            closed: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::FnStep;
    use assert_matches::assert_matches;
    use std::sync::atomic::AtomicUsize;

    fn unix_formatter(steps: Vec<Box<dyn FormatterStep>>) -> Formatter {
        Formatter::builder()
            .steps(steps)
            .line_ending(LineEnding::Unix)
            .root("/project")
            .build()
            .unwrap()
    }

    #[test]
    fn test_steps_apply_in_order() {
        let formatter = unix_formatter(vec![
            Box::new(FnStep::new("upper", |s: &str| Ok(s.to_uppercase()))),
            Box::new(FnStep::new("exclaim", |s: &str| Ok(format!("{}!", s)))),
        ]);
        let out = formatter.compute("hi", Path::new("/project/a.txt")).unwrap();
        assert_eq!(out, "HI!");
    }

    #[test]
    fn test_step_output_is_renormalized() {
        let formatter = unix_formatter(vec![Box::new(FnStep::new("crlf", |s: &str| {
            Ok(s.replace('\n', "\r\n"))
        }))]);
        let out = formatter
            .compute("a\nb\n", Path::new("/project/a.txt"))
            .unwrap();
        assert_eq!(out, "a\nb\n");
    }

    #[test]
    fn test_duplicate_step_names_rejected() {
        let result = Formatter::builder()
            .step(FnStep::new("same", |s: &str| Ok(s.to_string())))
            .step(FnStep::new("same", |s: &str| Ok(s.to_string())))
            .build();
        assert_matches!(result, Err(Error::Config(_)));
    }

    #[test]
    fn test_strict_policy_attaches_step_and_path() {
        let formatter = unix_formatter(vec![Box::new(FnStep::new("boom", |_: &str| {
            Err(Error::step_failed("bad input"))
        }))]);
        let err = formatter
            .compute("x", Path::new("/project/src/a.txt"))
            .unwrap_err();
        assert_matches!(
            err,
            Error::Step { ref step, ref path, ref message }
                if step == "boom" && path == "src/a.txt" && message == "bad input"
        );
    }

    #[test]
    fn test_lenient_and_excluded_failures_keep_content() {
        let failing = || -> Vec<Box<dyn FormatterStep>> {
            vec![
                Box::new(FnStep::new("boom", |_: &str| {
                    Err(Error::step_failed("bad input"))
                })),
                Box::new(FnStep::new("suffix", |s: &str| Ok(format!("{}.", s)))),
            ]
        };

        let lenient = Formatter::builder()
            .steps(failing())
            .line_ending(LineEnding::Unix)
            .exception_policy(ExceptionPolicy::lenient())
            .build()
            .unwrap();
        assert_eq!(lenient.compute("x", Path::new("a")).unwrap(), "x.");

        let by_step = Formatter::builder()
            .steps(failing())
            .line_ending(LineEnding::Unix)
            .exception_policy(ExceptionPolicy {
                exclude_steps: vec!["boom".into()],
                ..Default::default()
            })
            .build()
            .unwrap();
        assert_eq!(by_step.compute("x", Path::new("a")).unwrap(), "x.");

        let by_path = Formatter::builder()
            .steps(failing())
            .line_ending(LineEnding::Unix)
            .exception_policy(ExceptionPolicy {
                exclude_paths: vec!["legacy/old.txt".into()],
                ..Default::default()
            })
            .root("/p")
            .build()
            .unwrap();
        assert_eq!(
            by_path
                .compute("x", Path::new("/p/legacy/old.txt"))
                .unwrap(),
            "x."
        );
        assert!(by_path.compute("x", Path::new("/p/new.txt")).is_err());
    }

    #[test]
    fn test_exclusions_as_suppressions() {
        let policy = ExceptionPolicy {
            exclude_steps: vec!["flaky".to_string()],
            exclude_paths: vec!["gen/a.txt".to_string()],
            ..Default::default()
        };
        let suppressions = policy.as_suppressions();
        assert_eq!(suppressions.len(), 2);
        assert_eq!(suppressions[0].step, "flaky");
        assert_eq!(suppressions[0].path, "*");
        assert_eq!(suppressions[1].path, "gen/a.txt");
        assert_eq!(suppressions[1].short_code, "*");
    }

    #[test]
    fn test_compute_with_lint_records_failures() {
        let formatter = unix_formatter(vec![
            Box::new(FnStep::new("ok", |s: &str| Ok(s.to_string()))),
            Box::new(FnStep::new("boom", |_: &str| Err(Error::step_failed("no")))),
        ]);
        let mut failures = PerStep::new(2);
        let out = formatter.compute_with_lint("x", Path::new("a"), &mut failures);
        assert_eq!(out, "x");
        assert!(failures.get(0).is_none());
        assert_eq!(failures.index_of_first_value(), Some(1));
    }

    #[test]
    fn test_compute_line_endings() {
        let windows = Formatter::builder()
            .line_ending(LineEnding::Windows)
            .build()
            .unwrap();
        assert_eq!(
            windows
                .compute_line_endings("a\nb\n", Path::new("a"))
                .unwrap(),
            "a\r\nb\r\n"
        );
        let unix = Formatter::builder()
            .line_ending(LineEnding::Unix)
            .build()
            .unwrap();
        assert_matches!(
            unix.compute_line_endings("a\nb\n", Path::new("a")).unwrap(),
            Cow::Borrowed(_)
        );
    }

    #[test]
    fn test_close_finishes_steps_once() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);
        let step = FnStep::new("s", |s: &str| Ok(s.to_string()))
            .on_finish(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let formatter = Formatter::builder().step(step).build().unwrap();
        formatter.close();
        formatter.close();
        assert!(formatter.is_closed());
        drop(formatter);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_equality_is_stepwise() {
        let make = |key: &str| {
            Formatter::builder()
                .step(FnStep::new("s", |s: &str| Ok(s.to_string())).with_key(key))
                .line_ending(LineEnding::Unix)
                .build()
                .unwrap()
        };
        assert_eq!(make("a"), make("a"));
        assert_ne!(make("a"), make("b"));
    }
}
