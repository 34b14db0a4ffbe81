//! Git repository handle

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Git repository wrapper that handles Send/Sync constraints
///
/// git2::Repository is not Sync due to internal raw pointers.
/// We work around this by storing the paths and reopening the
/// repository for every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRepository {
    git_dir: PathBuf,
    workdir: PathBuf,
    identity: PathBuf,
}

impl GitRepository {
    /// Open the repository whose work tree (or git dir) is exactly `dir`.
    ///
    /// Returns `Ok(None)` when `dir` is not a repository root.
    pub fn open_exact<P: AsRef<Path>>(dir: P) -> Result<Option<Self>> {
        match git2::Repository::open_ext(
            dir.as_ref(),
            git2::RepositoryOpenFlags::NO_SEARCH,
            &[] as &[&std::ffi::OsStr],
        ) {
            Ok(repo) => Self::from_repo(&repo).map(Some),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Discover a repository starting from the given path
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = git2::Repository::discover(path.as_ref()).map_err(|e| {
            Error::Git(format!(
                "Cannot find git repository for '{}': {}",
                path.as_ref().display(),
                e.message()
            ))
        })?;
        Self::from_repo(&repo)
    }

    fn from_repo(repo: &git2::Repository) -> Result<Self> {
        let git_dir = repo.path().to_path_buf();
        let workdir = repo
            .workdir()
            .ok_or_else(|| {
                Error::Git(format!(
                    "Repository '{}' is bare, there is no work tree to format",
                    git_dir.display()
                ))
            })?
            .to_path_buf();
        Ok(Self {
            identity: canonical(&git_dir),
            workdir: canonical(&workdir),
            git_dir,
        })
    }

    /// The git directory
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Canonical work tree root
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Canonical git directory; equal for every handle on the same repository
    pub fn identity(&self) -> &Path {
        &self.identity
    }

    /// Reopen the repository.
    ///
    /// Always reopen: git2 has internal caching so this is cheap.
    pub fn repo(&self) -> Result<git2::Repository> {
        Ok(git2::Repository::open(&self.git_dir)?)
    }

    /// Resolve `reference` to a commit, failing with `No such reference '<ref>'`
    pub fn resolve_commit<'r>(
        repo: &'r git2::Repository,
        reference: &str,
    ) -> Result<git2::Commit<'r>> {
        repo.revparse_single(reference)
            .and_then(|object| object.peel_to_commit())
            .map_err(|_| Error::Git(format!("No such reference '{}'", reference)))
    }

    /// `path` relative to the work tree, `/`-separated.
    ///
    /// `path` may be relative to the work tree already, or absolute; it does
    /// not need to exist.
    pub fn relative_path(&self, path: &Path) -> Result<String> {
        if path.is_relative() {
            return Ok(to_slash(path));
        }
        if let Ok(rel) = path.strip_prefix(&self.workdir) {
            return Ok(to_slash(rel));
        }
        let resolved = canonical_allow_missing(path);
        resolved
            .strip_prefix(&self.workdir)
            .map(to_slash)
            .map_err(|_| {
                Error::InvalidPath(format!(
                    "'{}' is not inside the work tree '{}'",
                    path.display(),
                    self.workdir.display()
                ))
            })
    }
}

/// `/`-separated form of a relative path
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Canonicalize the longest existing ancestor and re-append the rest
fn canonical_allow_missing(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    let mut missing = Vec::new();
    let mut current = path;
    while let Some(parent) = current.parent() {
        if let Some(name) = current.file_name() {
            missing.push(name.to_os_string());
        }
        if let Ok(resolved) = parent.canonicalize() {
            let mut out = resolved;
            out.extend(missing.iter().rev());
            return out;
        }
        current = parent;
    }
    path.to_path_buf()
}
