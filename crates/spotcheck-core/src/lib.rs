//! # Spotcheck Core
//!
//! Idempotence-checked source formatting with git ratchet change detection.
//!
//! A [`Formatter`] applies an ordered chain of steps to a file. Because step
//! chains are not always idempotent, the engine iterates them until the
//! output converges, cycles or diverges ([`PaddedCell`]) and reduces the
//! result to a [`DirtyState`]. A [`GitRatchet`] narrows the work to files
//! that differ from the merge base with a reference branch.
//!
//! This library is built from:
//! - **git2** for merge bases, the index and work tree comparisons
//! - **Rayon** for parallel path filtering and ratchet re-checks
//! - **Tokio** for the bounded read / compute / write pipeline
//!
//! ## Example
//!
//! ```no_run
//! use spotcheck_core::{run, Mode, SpotConfig};
//! use std::path::Path;
//!
//! # async fn example() -> spotcheck_core::Result<()> {
//! let config = SpotConfig::load(Path::new("spotcheck.yml"))?;
//! let report = run(&config, Path::new("."), Mode::Check).await?;
//! println!("clean: {}", report.is_success());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod coordination;
pub mod diagnose;
pub mod dirty_state;
pub mod encoding;
pub mod error;
pub mod formatter;
pub mod git;
pub mod line_ending;
pub mod lint;
pub mod lint_state;
pub mod output;
pub mod padded_cell;
pub mod patterns;
pub mod step;
pub mod traits;
pub mod types;

pub use config::{FormatSpec, SpotConfig, StepKind, StepSpec, DEFAULT_CONFIG_FILE};
pub use coordination::{FileProcessor, FormatGroup};
pub use dirty_state::DirtyState;
pub use encoding::Encoding;
pub use error::{Error, ErrorKind, Result};
pub use formatter::{ExceptionPolicy, Formatter, FormatterBuilder};
pub use git::{GitRatchet, GitRepository};
pub use lint::{Lint, LintSuppression};
pub use lint_state::LintState;
pub use padded_cell::{PaddedCell, PaddedCellType};
pub use patterns::PatternMatcher;
pub use traits::{FormatterStep, LineEndingPolicy, RatchetProject};
pub use types::{FileOutcome, FileReport, GroupReport, LineEnding, Mode, RunReport};

use std::path::Path;
use std::sync::Arc;

/// Run every format of `config` over the files under `root`
///
/// All groups share one [`GitRatchet`], closed once the run ends. A group
/// whose baseline cannot be resolved aborts the run; per-file failures are
/// reported in the returned [`RunReport`].
pub async fn run(config: &SpotConfig, root: &Path, mode: Mode) -> Result<RunReport> {
    config.validate()?;
    let root = root.canonicalize().map_err(|e| {
        Error::InvalidPath(format!("{}: {}", root.display(), e))
    })?;

    let groups = config
        .formats
        .iter()
        .map(|format| FormatGroup::from_format(format, config, &root))
        .collect::<Result<Vec<_>>>()?;

    let concurrency = config.concurrency.unwrap_or_else(default_concurrency);
    let ratchet = Arc::new(GitRatchet::new());
    let diagnose_dir = config.diagnose_dir.as_ref().map(|dir| root.join(dir));
    let processor = FileProcessor::new(root, Arc::clone(&ratchet), concurrency)
        .with_diagnose_dir(diagnose_dir);

    let result = process_groups(&processor, &groups, mode).await;
    ratchet.close();
    result
}

async fn process_groups(
    processor: &FileProcessor,
    groups: &[FormatGroup],
    mode: Mode,
) -> Result<RunReport> {
    let files = processor.list_files()?;
    let mut report = RunReport {
        mode,
        groups: Vec::with_capacity(groups.len()),
    };
    for group in groups {
        report.groups.push(processor.process(group, &files, mode).await?);
    }
    Ok(report)
}

/// Synchronous variant of [`run`]
///
/// This creates a new Tokio runtime and blocks on the async version.
/// Prefer the async version if you're already in an async context.
pub fn run_sync(config: &SpotConfig, root: &Path, mode: Mode) -> Result<RunReport> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Runtime(e.to_string()))?
        .block_on(run(config, root, mode))
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
