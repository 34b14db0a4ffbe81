//! Tree / index / work tree comparison sets

use crate::error::Result;
use std::collections::BTreeSet;
use std::path::Path;

/// Paths (relative to the work tree, `/`-separated) classified by how the
/// ratchet tree, the index and the work tree differ.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexDiff {
    /// In tree and index, with different content or mode
    pub changed: BTreeSet<String>,
    /// In index, not in tree
    pub added: BTreeSet<String>,
    /// In tree, not in index
    pub removed: BTreeSet<String>,
    /// In index, not in work tree
    pub missing: BTreeSet<String>,
    /// In index and work tree, with different content
    pub modified: BTreeSet<String>,
    /// In work tree, not in index, not ignored
    pub untracked: BTreeSet<String>,
    /// Unmerged index entries
    pub conflicting: BTreeSet<String>,
}

impl IndexDiff {
    /// Compare `tree` (or the empty tree) against `index` and the work tree
    pub fn compute(
        repo: &git2::Repository,
        index: &git2::Index,
        tree: Option<&git2::Tree<'_>>,
    ) -> Result<Self> {
        let mut out = Self::default();

        let mut opts = diff_options(None);
        let staged = repo.diff_tree_to_index(tree, Some(index), Some(&mut opts))?;
        for delta in staged.deltas() {
            let Some(path) = delta_path(&delta) else {
                continue;
            };
            match delta.status() {
                git2::Delta::Added => out.added.insert(path),
                git2::Delta::Deleted => out.removed.insert(path),
                git2::Delta::Modified | git2::Delta::Typechange => out.changed.insert(path),
                git2::Delta::Conflicted => out.conflicting.insert(path),
                _ => false,
            };
        }

        let mut opts = diff_options(None);
        let unstaged = repo.diff_index_to_workdir(Some(index), Some(&mut opts))?;
        for delta in unstaged.deltas() {
            let Some(path) = delta_path(&delta) else {
                continue;
            };
            match delta.status() {
                git2::Delta::Modified | git2::Delta::Typechange => out.modified.insert(path),
                git2::Delta::Deleted => out.missing.insert(path),
                git2::Delta::Untracked => out.untracked.insert(path),
                git2::Delta::Conflicted => out.conflicting.insert(path),
                _ => false,
            };
        }

        if index.has_conflicts() {
            for conflict in index.conflicts()? {
                let conflict = conflict?;
                for entry in [conflict.ancestor, conflict.our, conflict.their]
                    .into_iter()
                    .flatten()
                {
                    out.conflicting
                        .insert(String::from_utf8_lossy(&entry.path).into_owned());
                }
            }
        }

        Ok(out)
    }
}

/// Diff options shared by every comparison: untracked files included,
/// optionally limited to one literal path
pub(crate) fn diff_options(pathspec: Option<&str>) -> git2::DiffOptions {
    let mut opts = git2::DiffOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_typechange(true);
    if let Some(path) = pathspec {
        opts.pathspec(path).disable_pathspec_match(true);
    }
    opts
}

fn delta_path(delta: &git2::DiffDelta<'_>) -> Option<String> {
    delta
        .new_file()
        .path()
        .or_else(|| delta.old_file().path())
        .map(|p: &Path| crate::git::repository::to_slash(p))
}
