//! Main file processing coordinator

use crate::config::{FormatSpec, SpotConfig};
use crate::diagnose;
use crate::dirty_state::DirtyState;
use crate::error::{Error, Result};
use crate::formatter::Formatter;
use crate::git::GitRatchet;
use crate::lint::LintSuppression;
use crate::lint_state::LintState;
use crate::output::unified_diff;
use crate::padded_cell::PaddedCell;
use crate::patterns::PatternMatcher;
use crate::types::{FileOutcome, FileReport, GroupReport, Mode};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One configured format: which files, which formatter, which baseline
#[derive(Debug)]
pub struct FormatGroup {
    name: String,
    matcher: PatternMatcher,
    formatter: Arc<Formatter>,
    ratchet_from: Option<String>,
    lint_suppressions: Arc<[LintSuppression]>,
}

impl FormatGroup {
    /// Create a group from its parts
    pub fn new(
        name: impl Into<String>,
        matcher: PatternMatcher,
        formatter: Formatter,
        ratchet_from: Option<String>,
        lint_suppressions: Vec<LintSuppression>,
    ) -> Self {
        Self {
            name: name.into(),
            matcher,
            formatter: Arc::new(formatter),
            ratchet_from,
            lint_suppressions: lint_suppressions.into(),
        }
    }

    /// Build the group for `format`, rooted at `root`
    ///
    /// Steps and paths excluded by the format's exception policy are
    /// suppressed along with its configured lint suppressions.
    pub fn from_format(format: &FormatSpec, config: &SpotConfig, root: &Path) -> Result<Self> {
        let mut suppressions = format.lint_suppressions.clone();
        suppressions.extend(format.exception_policy.as_suppressions());
        Ok(Self::new(
            format.name.clone(),
            format.matcher()?,
            format.formatter(config, root)?,
            format.effective_ratchet_from(config).map(str::to_string),
            suppressions,
        ))
    }

    /// Format name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Formatter shared by every file of the group
    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    /// Baseline reference, when the group ratchets
    pub fn ratchet_from(&self) -> Option<&str> {
        self.ratchet_from.as_deref()
    }
}

/// Result of the compute stage for one file
enum Computed {
    Clean,
    Dirty {
        canonical: Vec<u8>,
        lints: Option<String>,
        misbehaved: Option<String>,
        diff: Option<String>,
    },
    DidNotConverge(String),
    Lints(String),
}

/// File processor that runs every file of a group through
/// read, compute and write stages, each with its own bounded pool
pub struct FileProcessor {
    root: PathBuf,
    ratchet: Arc<GitRatchet<PathBuf>>,
    concurrency: usize,
    diagnose_dir: Option<PathBuf>,
    read_permits: Semaphore,
    compute_permits: Semaphore,
    write_permits: Semaphore,
}

impl FileProcessor {
    /// Create a processor for files under `root` (absolute)
    pub fn new(root: impl Into<PathBuf>, ratchet: Arc<GitRatchet<PathBuf>>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            root: root.into(),
            ratchet,
            concurrency,
            diagnose_dir: None,
            read_permits: Semaphore::new(concurrency),
            compute_permits: Semaphore::new(concurrency),
            write_permits: Semaphore::new(concurrency),
        }
    }

    /// Write the padded cell steps of misbehaving files below `dir`,
    /// one subdirectory per group
    pub fn with_diagnose_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.diagnose_dir = dir;
        self
    }

    /// Root every reported path is relative to
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every regular file under the root, skipping `.git`, as sorted
    /// `/`-separated relative paths
    pub fn list_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git");
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                files.push(crate::git::repository::to_slash(rel));
            }
        }
        files.sort();
        Ok(files)
    }

    /// Run `group` over the candidate `files` (relative paths from
    /// [`FileProcessor::list_files`]).
    ///
    /// Baseline resolution errors abort the group; any other failure is
    /// reported against its file.
    pub async fn process(&self, group: &FormatGroup, files: &[String], mode: Mode) -> Result<GroupReport> {
        let matched = group.matcher.filter_paths_parallel(files);
        let files_matched = matched.len();

        let selected = match group.ratchet_from() {
            Some(reference) => {
                let dirty = self.ratchet_dirty_files(reference).await?;
                matched
                    .into_iter()
                    .filter(|path| dirty.contains(path))
                    .collect()
            }
            None => matched,
        };
        info!(
            group = %group.name,
            matched = files_matched,
            selected = selected.len(),
            "processing"
        );
        if let Some(dir) = self.group_diagnose_dir(group) {
            diagnose::clear(&dir).await?;
        }

        let mut files: Vec<FileReport> = stream::iter(
            selected
                .into_iter()
                .map(|rel| self.process_file(group, rel, mode)),
        )
        .buffer_unordered(self.concurrency * 3)
        .collect()
        .await;
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(GroupReport {
            name: group.name.clone(),
            ratchet_from: group.ratchet_from.clone(),
            files_matched,
            files,
        })
    }

    fn group_diagnose_dir(&self, group: &FormatGroup) -> Option<PathBuf> {
        self.diagnose_dir.as_ref().map(|dir| dir.join(&group.name))
    }

    async fn ratchet_dirty_files(&self, reference: &str) -> Result<BTreeSet<String>> {
        let ratchet = Arc::clone(&self.ratchet);
        let root = self.root.clone();
        let reference = reference.to_string();
        tokio::task::spawn_blocking(move || ratchet.dirty_files(&root, &reference))
            .await
            .map_err(|e| Error::Runtime(e.to_string()))?
    }

    async fn process_file(&self, group: &FormatGroup, rel: String, mode: Mode) -> FileReport {
        let outcome = match self.run_file(group, &rel, mode).await {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(file = %rel, error = %err, "failed");
                FileOutcome::Failed {
                    error: err.to_string(),
                }
            }
        };
        FileReport { path: rel, outcome }
    }

    async fn run_file(&self, group: &FormatGroup, rel: &str, mode: Mode) -> Result<FileOutcome> {
        let path = self.root.join(rel);

        let raw = {
            let _permit = self
                .read_permits
                .acquire()
                .await
                .map_err(|e| Error::Runtime(e.to_string()))?;
            tokio::fs::read(&path).await?
        };

        let (computed, cell) = {
            let _permit = self
                .compute_permits
                .acquire()
                .await
                .map_err(|e| Error::Runtime(e.to_string()))?;
            let formatter = Arc::clone(&group.formatter);
            let suppressions = Arc::clone(&group.lint_suppressions);
            let rel = rel.to_string();
            let path = path.clone();
            tokio::task::spawn_blocking(move || {
                compute(&formatter, &path, &rel, &raw, &suppressions, mode)
            })
            .await
            .map_err(|e| Error::Runtime(e.to_string()))??
        };

        if let (Some(dir), Some(cell)) = (self.group_diagnose_dir(group), &cell) {
            let _permit = self
                .write_permits
                .acquire()
                .await
                .map_err(|e| Error::Runtime(e.to_string()))?;
            diagnose::write_steps(&dir, rel, cell, group.formatter.encoding()).await?;
            info!(file = %rel, dir = %dir.display(), "{}", cell.user_message());
        }

        match computed {
            Computed::Clean => Ok(FileOutcome::Clean),
            Computed::DidNotConverge(message) => {
                warn!(file = %rel, "{}", message);
                Ok(FileOutcome::DidNotConverge { message })
            }
            Computed::Lints(detail) => Ok(FileOutcome::Lints { detail }),
            Computed::Dirty {
                canonical,
                lints,
                misbehaved,
                diff,
            } => {
                let written = match mode {
                    Mode::Check => false,
                    Mode::Apply => {
                        let _permit = self
                            .write_permits
                            .acquire()
                            .await
                            .map_err(|e| Error::Runtime(e.to_string()))?;
                        tokio::fs::write(&path, &canonical).await?;
                        debug!(file = %rel, "written");
                        true
                    }
                };
                if let Some(message) = &misbehaved {
                    warn!(file = %rel, "{}", message);
                }
                match lints {
                    Some(detail) if written => Ok(FileOutcome::Lints { detail }),
                    _ => Ok(FileOutcome::Dirty {
                        written,
                        misbehaved,
                        diff,
                    }),
                }
            }
        }
    }
}

/// Compute one file's outcome, plus its padded cell when the step chain misbehaved
fn compute(
    formatter: &Formatter,
    path: &Path,
    rel: &str,
    raw: &[u8],
    suppressions: &[LintSuppression],
    mode: Mode,
) -> Result<(Computed, Option<PaddedCell>)> {
    let state =
        LintState::of(formatter, path, raw)?.with_removed_suppressions(formatter, rel, suppressions)?;
    let lints = if state.has_lints() {
        Some(state.as_string_detailed(path, formatter)?)
    } else {
        None
    };

    let (dirty_state, cell) = state.into_parts();
    let cell = cell.filter(PaddedCell::misbehaved);
    let computed = match dirty_state {
        DirtyState::Clean => match lints {
            Some(detail) => Computed::Lints(detail),
            None => Computed::Clean,
        },
        DirtyState::Dirty(canonical) => {
            let diff = match mode {
                Mode::Check => {
                    let encoding = formatter.encoding();
                    Some(unified_diff(
                        &encoding.decode(raw)?,
                        &encoding.decode(&canonical)?,
                    ))
                }
                Mode::Apply => None,
            };
            Computed::Dirty {
                canonical,
                lints,
                misbehaved: cell.as_ref().map(PaddedCell::user_message),
                diff,
            }
        }
        DirtyState::DidNotConverge => {
            let message = cell.as_ref().map(PaddedCell::user_message).ok_or_else(|| {
                Error::Invariant("did not converge without a padded cell".to_string())
            })?;
            Computed::DidNotConverge(message)
        }
    };
    Ok((computed, cell))
}
