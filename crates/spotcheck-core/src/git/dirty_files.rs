//! Bulk dirty-file listing for a project

use crate::error::Result;
use crate::git::index_diff::IndexDiff;
use crate::git::ratchet::{absolute, GitRatchet};
use crate::traits::RatchetProject;
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::debug;

impl<P: RatchetProject> GitRatchet<P> {
    /// Every file under `project`'s dir that [`GitRatchet::is_clean`] would
    /// report as dirty against `ratchet_from`, relative to the project dir
    /// and `/`-separated.
    ///
    /// Files whose status alone decides the answer are taken straight from the
    /// index diff; paths where tree, index and work tree may still agree are
    /// re-checked one by one in parallel.
    pub fn dirty_files(&self, project: &P, ratchet_from: &str) -> Result<BTreeSet<String>> {
        let tree_sha = self.root_tree_sha_of(project, ratchet_from)?;
        let handle = self.repository_for(project)?;

        let diff = {
            let repo = handle.repo()?;
            let index = repo.index()?;
            let tree = if tree_sha.is_zero() {
                None
            } else {
                Some(repo.find_tree(tree_sha)?)
            };
            IndexDiff::compute(&repo, &index, tree.as_ref())?
        };
        debug!(
            changed = diff.changed.len(),
            modified = diff.modified.len(),
            untracked = diff.untracked.len(),
            "index diff"
        );

        let mut dirty: BTreeSet<String> = diff
            .changed
            .difference(&diff.modified)
            .chain(&diff.added)
            .chain(&diff.conflicting)
            .chain(diff.untracked.difference(&diff.removed))
            .cloned()
            .collect();

        let recheck: Vec<&String> = diff
            .modified
            .union(&diff.removed)
            .filter(|path| !diff.conflicting.contains(*path))
            .collect();
        let workdir = handle.workdir();
        let still_dirty = recheck
            .par_iter()
            .filter_map(|path| match self.is_clean(project, tree_sha, &workdir.join(path)) {
                Ok(true) => None,
                Ok(false) => Some(Ok((*path).clone())),
                Err(err) => Some(Err(err)),
            })
            .collect::<Result<Vec<_>>>()?;
        dirty.extend(still_dirty);

        for missing in &diff.missing {
            dirty.remove(missing);
        }

        let base = handle.relative_path(&absolute(project.dir())?)?;
        let prefix = if base.is_empty() {
            String::new()
        } else {
            format!("{}/", base)
        };
        Ok(dirty
            .into_iter()
            .filter_map(|path| path.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::process::Command;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(["-c", "user.name=t", "-c", "user.email=t@t", "-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    #[test]
    fn test_dirty_files_relative_to_project() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        git(root, &["init", "-q", "-b", "main"]);
        fs::create_dir(root.join("module")).unwrap();
        fs::write(root.join("module/kept.txt"), "a\n").unwrap();
        fs::write(root.join("module/edited.txt"), "a\n").unwrap();
        fs::write(root.join("outside.txt"), "a\n").unwrap();
        git(root, &["add", "."]);
        git(root, &["commit", "-q", "-m", "init"]);

        fs::write(root.join("module/edited.txt"), "bb\n").unwrap();
        fs::write(root.join("module/new.txt"), "n\n").unwrap();
        fs::write(root.join("outside.txt"), "bb\n").unwrap();

        let ratchet = GitRatchet::<PathBuf>::new();
        let dirty = ratchet
            .dirty_files(&root.join("module"), "HEAD")
            .unwrap();
        let expected: BTreeSet<String> =
            ["edited.txt", "new.txt"].iter().map(|s| s.to_string()).collect();
        assert_eq!(dirty, expected);
    }

    #[test]
    fn test_reverted_edit_is_clean() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        git(root, &["init", "-q", "-b", "main"]);
        fs::write(root.join("f.txt"), "HELLO\n").unwrap();
        git(root, &["add", "."]);
        git(root, &["commit", "-q", "-m", "init"]);

        // staged change, work tree back at the committed content
        fs::write(root.join("f.txt"), "HELLO WORLD\n").unwrap();
        git(root, &["add", "f.txt"]);
        fs::write(root.join("f.txt"), "HELLO\n").unwrap();

        let ratchet = GitRatchet::<PathBuf>::new();
        assert!(ratchet
            .dirty_files(&root.to_path_buf(), "HEAD")
            .unwrap()
            .is_empty());
    }
}
