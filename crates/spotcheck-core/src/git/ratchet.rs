//! Per-file "has this changed since `<ref>`" decisions
//!
//! A [`GitRatchet`] answers whether a file differs from the tree of the merge
//! base between `HEAD` and a reference. Repositories are located per project
//! and shared by identity, so every project inside the same repository reuses
//! one handle and one set of resolved trees. libgit2 objects are not
//! thread-safe, so the repository and its index are reopened per operation.

use crate::error::{Error, Result};
use crate::git::index_diff::diff_options;
use crate::git::repository::GitRepository;
use crate::traits::RatchetProject;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument};

struct RatchetState<P> {
    repositories: HashMap<P, Arc<GitRepository>>,
    by_identity: HashMap<PathBuf, Arc<GitRepository>>,
    root_tree_shas: HashMap<(PathBuf, String), git2::Oid>,
    subtree_shas: HashMap<(P, git2::Oid), git2::Oid>,
}

impl<P> Default for RatchetState<P> {
    fn default() -> Self {
        Self {
            repositories: HashMap::new(),
            by_identity: HashMap::new(),
            root_tree_shas: HashMap::new(),
            subtree_shas: HashMap::new(),
        }
    }
}

/// Git ratchet shared by every formatter of a run.
///
/// All caches sit behind one coarse lock. [`GitRatchet::is_clean`] takes the
/// lock only to fetch the repository handle, then works on its own
/// `git2::Repository` and index, so concurrent calls do not contend.
pub struct GitRatchet<P: RatchetProject> {
    state: Mutex<RatchetState<P>>,
}

impl<P: RatchetProject> Default for GitRatchet<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: RatchetProject> std::fmt::Debug for GitRatchet<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("GitRatchet")
            .field("repositories", &state.by_identity.len())
            .field("subtrees", &state.subtree_shas.len())
            .field("root_trees", &state.root_tree_shas.len())
            .finish()
    }
}

impl<P: RatchetProject> GitRatchet<P> {
    /// Create an empty ratchet
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RatchetState::default()),
        }
    }

    /// Repository that owns `project`.
    ///
    /// Checks the project dir itself, then each ancestor up to (excluding) the
    /// parent project's dir, then delegates to the parent project.
    pub fn repository_for(&self, project: &P) -> Result<Arc<GitRepository>> {
        let mut state = self.state.lock();
        Self::repository_for_locked(&mut state, project)
    }

    fn repository_for_locked(
        state: &mut RatchetState<P>,
        project: &P,
    ) -> Result<Arc<GitRepository>> {
        if let Some(repo) = state.repositories.get(project) {
            return Ok(Arc::clone(repo));
        }

        let found = match GitRepository::open_exact(project.dir())? {
            Some(repo) => repo,
            None => {
                let parent = project.parent();
                let stop = parent.as_ref().map(|p| p.dir().to_path_buf());
                match traverse_parents_until(project.dir(), stop.as_deref())? {
                    Some(repo) => repo,
                    None => match parent {
                        Some(parent) => {
                            let repo = Self::repository_for_locked(state, &parent)?;
                            state.repositories.insert(project.clone(), Arc::clone(&repo));
                            return Ok(repo);
                        }
                        None => {
                            return Err(Error::Git(format!(
                                "Cannot find git repository in any parent directory of '{}'",
                                project.dir().display()
                            )))
                        }
                    },
                }
            }
        };

        let shared = Arc::clone(
            state
                .by_identity
                .entry(found.identity().to_path_buf())
                .or_insert_with(|| Arc::new(found)),
        );
        state.repositories.insert(project.clone(), Arc::clone(&shared));
        Ok(shared)
    }

    /// Tree of the merge base between `HEAD` and `reference`.
    ///
    /// Falls back to `reference`'s own tree when `HEAD` is unborn or the two
    /// share no history. Cached per repository and reference.
    #[instrument(skip(self, project), fields(project = %project.dir().display()), level = "debug")]
    pub fn root_tree_sha_of(&self, project: &P, reference: &str) -> Result<git2::Oid> {
        let mut state = self.state.lock();
        let handle = Self::repository_for_locked(&mut state, project)?;
        let key = (handle.identity().to_path_buf(), reference.to_string());
        if let Some(sha) = state.root_tree_shas.get(&key) {
            return Ok(*sha);
        }

        let repo = handle.repo()?;
        let target = GitRepository::resolve_commit(&repo, reference)?;
        let base = match repo.head().and_then(|head| head.peel_to_commit()) {
            Ok(head) => match repo.merge_base(head.id(), target.id()) {
                Ok(base) => repo.find_commit(base)?,
                Err(e) if e.code() == git2::ErrorCode::NotFound => {
                    debug!("no merge base between HEAD and {}, using its own tree", reference);
                    target
                }
                Err(e) => return Err(e.into()),
            },
            Err(e) if is_unborn(&e) => {
                debug!("HEAD is unborn, using the tree of {}", reference);
                target
            }
            Err(e) => return Err(e.into()),
        };
        let tree = base.tree_id();
        debug!(commit = %base.id(), tree = %tree, "ratchet baseline");

        state.root_tree_shas.insert(key, tree);
        Ok(tree)
    }

    /// Tree of `project`'s dir inside `root_tree_sha`, or the zero id when
    /// the dir is absent from that tree
    pub fn subtree_sha_of(&self, project: &P, root_tree_sha: git2::Oid) -> Result<git2::Oid> {
        let mut state = self.state.lock();
        let key = (project.clone(), root_tree_sha);
        if let Some(sha) = state.subtree_shas.get(&key) {
            return Ok(*sha);
        }
        let handle = Self::repository_for_locked(&mut state, project)?;
        let rel = handle.relative_path(&absolute(project.dir())?)?;

        let sha = if rel.is_empty() {
            root_tree_sha
        } else {
            let repo = handle.repo()?;
            let tree = repo.find_tree(root_tree_sha)?;
            match tree.get_path(Path::new(&rel)) {
                Ok(entry) => entry.id(),
                Err(_) => git2::Oid::zero(),
            }
        };
        state.subtree_shas.insert(key, sha);
        Ok(sha)
    }

    /// True when `file` needs no formatting because it matches the tree
    /// `tree_sha` (a root tree).
    ///
    /// A path that no longer exists is clean. Unmerged paths are dirty.
    pub fn is_clean(&self, project: &P, tree_sha: git2::Oid, file: &Path) -> Result<bool> {
        let handle = self.repository_for(project)?;
        let rel = handle.relative_path(&absolute(file)?)?;
        let repo = handle.repo()?;
        let index = repo.index()?;
        let path = Path::new(&rel);

        if (1..=3).any(|stage| index.get_path(path, stage).is_some()) {
            return Ok(false);
        }
        if std::fs::symlink_metadata(handle.workdir().join(path)).is_err() {
            return Ok(true);
        }

        let tree = if tree_sha.is_zero() {
            None
        } else {
            Some(repo.find_tree(tree_sha)?)
        };

        let mut opts = diff_options(Some(&rel));
        let tree_equals_index_diff = repo
            .diff_tree_to_index(tree.as_ref(), Some(&index), Some(&mut opts))?
            .deltas()
            .len()
            == 0;
        let mut opts = diff_options(Some(&rel));
        let index_equals_wc = repo
            .diff_index_to_workdir(Some(&index), Some(&mut opts))?
            .deltas()
            .len()
            == 0;
        if tree_equals_index_diff && index_equals_wc {
            return Ok(true);
        }

        let Some(tree_entry) = tree.as_ref().and_then(|t| t.get_path(path).ok()) else {
            // new file
            return Ok(false);
        };
        let Some(index_entry) = index.get_path(path, 0) else {
            return tree_equals_workdir(&repo, tree.as_ref(), &rel);
        };

        let tree_equals_index = tree_entry.id() == index_entry.id
            && tree_entry.filemode() as u32 == index_entry.mode;
        if tree_equals_index != index_equals_wc {
            Ok(false)
        } else if tree_equals_index {
            Err(Error::Invariant(format!(
                "'{}' matches tree, index and work tree but passed the index diff filter",
                rel
            )))
        } else {
            tree_equals_workdir(&repo, tree.as_ref(), &rel)
        }
    }

    /// Release every cached repository handle and tree
    pub fn close(&self) {
        let mut state = self.state.lock();
        *state = RatchetState::default();
    }

}

fn is_unborn(err: &git2::Error) -> bool {
    matches!(
        err.code(),
        git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
    )
}

fn tree_equals_workdir(
    repo: &git2::Repository,
    tree: Option<&git2::Tree<'_>>,
    rel: &str,
) -> Result<bool> {
    let mut opts = diff_options(Some(rel));
    Ok(repo
        .diff_tree_to_workdir(tree, Some(&mut opts))?
        .deltas()
        .len()
        == 0)
}

/// Look for a repository rooted at an ancestor of `dir`, stopping before `stop`
fn traverse_parents_until(dir: &Path, stop: Option<&Path>) -> Result<Option<GitRepository>> {
    for ancestor in dir.ancestors().skip(1) {
        if Some(ancestor) == stop {
            break;
        }
        if let Some(repo) = GitRepository::open_exact(ancestor)? {
            return Ok(Some(repo));
        }
    }
    Ok(None)
}

pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
