//! Formatter steps: closure-backed steps, file filtering, and a small generic catalog

pub mod fence;
pub mod generic;

pub use fence::{FenceMode, FenceStep};
pub use generic::{
    EndWithNewlineStep, IndentKind, IndentStep, LintRegexStep, ReplaceRegexStep, ReplaceStep,
    TrimTrailingWhitespaceStep,
};

use crate::error::Result;
use crate::lint::Lint;
use crate::traits::FormatterStep;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

type FormatFn = dyn Fn(&str, &Path) -> Result<String> + Send + Sync;
type FinishFn = dyn Fn() + Send + Sync;

/// A step backed by a closure, identified by its name and an explicit key
pub struct FnStep {
    name: String,
    key: serde_json::Value,
    func: Box<FormatFn>,
    on_finish: Option<Box<FinishFn>>,
}

impl FnStep {
    /// Step applying `func` to the content only
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        Self::with_file(name, move |content: &str, _file: &Path| func(content))
    }

    /// Step applying `func` to the content and the file it came from
    pub fn with_file<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str, &Path) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            key: serde_json::Value::Null,
            func: Box::new(func),
            on_finish: None,
        }
    }

    /// Set the serializable configuration that identifies this step
    pub fn with_key(mut self, key: impl Serialize) -> Self {
        self.key = serde_json::to_value(key).unwrap_or(serde_json::Value::Null);
        self
    }

    /// Run `finish` when the owning formatter closes
    pub fn on_finish<F>(mut self, finish: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_finish = Some(Box::new(finish));
        self
    }
}

impl FormatterStep for FnStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self, raw_unix: &str, file: &Path) -> Result<Option<String>> {
        (self.func)(raw_unix, file).map(Some)
    }

    fn key(&self) -> serde_json::Value {
        self.key.clone()
    }

    fn finish(&self) {
        if let Some(finish) = &self.on_finish {
            finish();
        }
    }
}

impl fmt::Debug for FnStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish()
    }
}

/// Applies the wrapped step only to files whose root-relative path matches `only`
pub struct FilteredStep {
    inner: Box<dyn FormatterStep>,
    globs: Vec<String>,
    matcher: GlobSet,
    root: PathBuf,
}

impl FilteredStep {
    /// Wrap `inner`; paths are matched relative to `root`, `/`-separated
    pub fn new(
        inner: Box<dyn FormatterStep>,
        globs: Vec<String>,
        root: impl Into<PathBuf>,
    ) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &globs {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            inner,
            globs,
            matcher: builder.build()?,
            root: root.into(),
        })
    }

    fn applies_to(&self, file: &Path) -> bool {
        let rel = file.strip_prefix(&self.root).unwrap_or(file);
        let rel = rel.to_string_lossy().replace('\\', "/");
        self.matcher.is_match(rel.as_str())
    }
}

impl FormatterStep for FilteredStep {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn format(&self, raw_unix: &str, file: &Path) -> Result<Option<String>> {
        if self.applies_to(file) {
            self.inner.format(raw_unix, file)
        } else {
            Ok(None)
        }
    }

    fn lint(&self, content: &str, file: &Path) -> Result<Vec<Lint>> {
        if self.applies_to(file) {
            self.inner.lint(content, file)
        } else {
            Ok(Vec::new())
        }
    }

    fn key(&self) -> serde_json::Value {
        serde_json::json!({
            "only": self.globs,
            "step": self.inner.key(),
        })
    }

    fn finish(&self) {
        self.inner.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_fn_step_with_file() {
        let step = FnStep::with_file("path", |content: &str, file: &Path| {
            Ok(format!("{}:{}", file.display(), content))
        });
        let out = step.format("x", Path::new("a.txt")).unwrap();
        assert_eq!(out.as_deref(), Some("a.txt:x"));
        assert_eq!(step.key(), serde_json::Value::Null);
    }

    #[test]
    fn test_fn_step_propagates_errors() {
        let step = FnStep::new("fail", |_: &str| Err(Error::step_failed("nope")));
        assert!(step.format("x", Path::new("a")).is_err());
    }

    #[test]
    fn test_filtered_step_only_matching_files() {
        let inner = FnStep::new("upper", |s: &str| Ok(s.to_uppercase())).with_key("v1");
        let step = FilteredStep::new(Box::new(inner), vec!["src/**/*.rs".into()], "/p").unwrap();

        assert_eq!(
            step.format("abc", Path::new("/p/src/lib.rs")).unwrap().as_deref(),
            Some("ABC")
        );
        assert_eq!(step.format("abc", Path::new("/p/README.md")).unwrap(), None);
        assert_eq!(step.name(), "upper");
        assert_eq!(step.key()["step"], "v1");
    }

    #[test]
    fn test_filtered_step_rejects_bad_glob() {
        let inner = FnStep::new("s", |s: &str| Ok(s.to_string()));
        assert!(FilteredStep::new(Box::new(inner), vec!["a[".into()], "/").is_err());
    }
}
