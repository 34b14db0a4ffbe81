//! Padded cell: classify the orbit of repeatedly applying a formatter.
//!
//! A well-behaved formatter is idempotent: `F(F(x)) == F(x)`. Misbehaving
//! step chains are iterated until they reach a fixed point (`Converge`),
//! revisit an earlier output (`Cycle`), or exhaust [`MAX_CYCLE`] iterations
//! (`Diverge`). Cycles pick a deterministic canonical element: shortest,
//! then lexicographically smallest.

use crate::dirty_state::DirtyState;
use crate::error::{Error, Result};
use crate::formatter::Formatter;
use crate::line_ending::to_unix;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Iteration bound of [`PaddedCell::check`]
pub const MAX_CYCLE: usize = 10;

/// Shape of the orbit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddedCellType {
    /// Reached a fixed point
    Converge,
    /// Revisited an earlier output
    Cycle,
    /// No repeat within the iteration bound
    Diverge,
}

impl PaddedCellType {
    /// Lowercase name, as used in diagnose file extensions
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Converge => "converge",
            Self::Cycle => "cycle",
            Self::Diverge => "diverge",
        }
    }

    /// Build a result of this type directly
    pub fn create(self, file: impl Into<PathBuf>, steps: Vec<String>) -> PaddedCell {
        PaddedCell {
            file: file.into(),
            kind: self,
            steps,
        }
    }
}

/// Result of a padded cell check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedCell {
    file: PathBuf,
    kind: PaddedCellType,
    steps: Vec<String>,
}

impl PaddedCell {
    /// Check `original_unix` with `formatter`, up to [`MAX_CYCLE`] applications.
    ///
    /// Step failures propagate according to the formatter's exception policy.
    pub fn check(formatter: &Formatter, file: &Path, original_unix: &str) -> Result<Self> {
        Self::check_with(file, original_unix, MAX_CYCLE, |input| {
            formatter.compute(input, file)
        })
    }

    /// Read `file` from disk, decode and normalize it, then [`PaddedCell::check`] it
    pub fn check_file(formatter: &Formatter, file: &Path) -> Result<Self> {
        let raw_bytes = std::fs::read(file)?;
        let raw = formatter.encoding().decode(&raw_bytes)?;
        let original = to_unix(&raw);
        Self::check(formatter, file, &original)
    }

    /// Core iteration over an arbitrary `compute` function.
    ///
    /// `max_length` bounds the number of distinct outputs kept and must be at
    /// least 2.
    pub fn check_with<F>(file: &Path, original: &str, max_length: usize, mut compute: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<String>,
    {
        if max_length < 2 {
            return Err(Error::Config(
                "maxLength must be at least 2".to_string(),
            ));
        }

        let applied_once = compute(original)?;
        if applied_once == original {
            return Ok(PaddedCellType::Converge.create(file, vec![applied_once]));
        }

        let applied_twice = compute(&applied_once)?;
        if applied_twice == applied_once {
            return Ok(PaddedCellType::Converge.create(file, vec![applied_once]));
        }

        let mut applied = vec![applied_once, applied_twice];
        while applied.len() < max_length {
            let input = applied.last().map(String::as_str).unwrap_or_default();
            let output = compute(input)?;
            if output == input {
                return Ok(PaddedCellType::Converge.create(file, applied));
            }
            if let Some(idx) = applied.iter().position(|seen| *seen == output) {
                applied.drain(..idx);
                return Ok(PaddedCellType::Cycle.create(file, applied));
            }
            applied.push(output);
        }
        Ok(PaddedCellType::Diverge.create(file, applied))
    }

    /// See [`DirtyState::calculate`]
    pub fn calculate_dirty_state(
        formatter: &Formatter,
        file: &Path,
        raw_bytes: &[u8],
    ) -> Result<DirtyState> {
        DirtyState::calculate(formatter, file, raw_bytes)
    }

    /// File the check ran on
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Orbit shape
    pub fn kind(&self) -> PaddedCellType {
        self.kind
    }

    /// Distinct outputs, in the order they were produced
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Anything other than converging in a single step
    pub fn misbehaved(&self) -> bool {
        let well_behaved = self.kind == PaddedCellType::Converge && self.steps.len() <= 1;
        !well_behaved
    }

    /// A canonical form exists
    pub fn is_resolvable(&self) -> bool {
        self.kind != PaddedCellType::Diverge
    }

    /// Canonical output. Fails for a diverging result.
    pub fn canonical(&self) -> Result<&str> {
        match self.kind {
            PaddedCellType::Converge => self
                .steps
                .last()
                .map(String::as_str)
                .ok_or_else(|| Error::Invariant("converged without any output".to_string())),
            PaddedCellType::Cycle => self
                .steps
                .iter()
                .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
                .map(String::as_str)
                .ok_or_else(|| Error::Invariant("cycle without any output".to_string())),
            PaddedCellType::Diverge => Err(Error::Diverged(format!(
                "{} {}",
                self.file.display(),
                self.user_message()
            ))),
        }
    }

    /// One-line summary, e.g. `cycles between 2 steps`
    pub fn user_message(&self) -> String {
        let verb = match self.kind {
            PaddedCellType::Converge => "converges after",
            PaddedCellType::Cycle => "cycles between",
            PaddedCellType::Diverge => "diverges after",
        };
        format!("{} {} steps", verb, self.steps.len())
    }
}
