//! Trait definitions at the seams of the engine

use crate::error::Result;
use crate::lint::Lint;
use std::hash::Hash;
use std::path::{Path, PathBuf};

/// A named text transform.
///
/// Implementations must be a pure function of their input plus the
/// configuration captured in [`FormatterStep::key`], and safe to call from
/// several threads at once.
pub trait FormatterStep: Send + Sync {
    /// Name used in diagnostics, unique within a formatter
    fn name(&self) -> &str;

    /// Format `raw_unix` (always `\n`-separated) for `file`.
    ///
    /// `Ok(None)` means the step leaves the content untouched.
    fn format(&self, raw_unix: &str, file: &Path) -> Result<Option<String>>;

    /// Report problems the step cannot fix. Most steps have none.
    fn lint(&self, _content: &str, _file: &Path) -> Result<Vec<Lint>> {
        Ok(Vec::new())
    }

    /// Serializable configuration; two steps with equal name and key are equal
    fn key(&self) -> serde_json::Value;

    /// Release resources held by the step
    fn finish(&self) {}
}

/// Chooses the line ending written for each file
pub trait LineEndingPolicy: Send + Sync {
    /// Separator for `file`, `"\n"` or `"\r\n"`
    fn ending_for(&self, file: &Path) -> Result<&'static str>;

    /// True when every file gets `\n`
    fn is_unix(&self) -> bool {
        false
    }
}

/// A build-tool project the ratchet can locate a repository for.
///
/// Projects form a tree through [`RatchetProject::parent`]; the ratchet walks
/// from a project's dir up to its parent's dir looking for a repository, then
/// delegates to the parent.
pub trait RatchetProject: Clone + Eq + Hash + Send + Sync {
    /// Project directory
    fn dir(&self) -> &Path;

    /// Enclosing project, if any
    fn parent(&self) -> Option<Self>;
}

impl RatchetProject for PathBuf {
    fn dir(&self) -> &Path {
        self
    }

    fn parent(&self) -> Option<Self> {
        Path::parent(self).map(Path::to_path_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pathbuf_project_parent() {
        let project = PathBuf::from("/a/b/c");
        assert_eq!(project.dir(), Path::new("/a/b/c"));
        assert_eq!(
            RatchetProject::parent(&project),
            Some(PathBuf::from("/a/b"))
        );
        assert_eq!(RatchetProject::parent(&PathBuf::from("/")), None);
    }
}
