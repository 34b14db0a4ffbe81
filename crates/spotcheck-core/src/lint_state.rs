//! Dirty state plus the lints each step reported

use crate::dirty_state::DirtyState;
use crate::error::{Error, Result};
use crate::formatter::{Formatter, PerStep};
use crate::line_ending::to_unix;
use crate::lint::{Lint, LintSuppression};
use crate::padded_cell::PaddedCell;
use std::path::Path;

/// A file's [`DirtyState`] and its lints, indexed by step
#[derive(Debug)]
pub struct LintState {
    dirty_state: DirtyState,
    lints_per_step: Option<PerStep<Vec<Lint>>>,
    padded_cell: Option<PaddedCell>,
}

impl LintState {
    /// Clean, without lints
    pub fn clean() -> Self {
        Self {
            dirty_state: DirtyState::Clean,
            lints_per_step: None,
            padded_cell: None,
        }
    }

    /// Read `file` and compute its [`LintState::of`]
    pub fn of_file(formatter: &Formatter, file: &Path) -> Result<Self> {
        let raw_bytes = std::fs::read(file)?;
        Self::of(formatter, file, &raw_bytes)
    }

    /// Compute the dirty state and collect lints.
    ///
    /// Step failures do not propagate; they become lints of the failing step.
    /// Steps that did not fail lint the canonical text, or the raw text when
    /// the file is clean or does not converge.
    pub fn of(formatter: &Formatter, file: &Path, raw_bytes: &[u8]) -> Result<Self> {
        let steps = formatter.steps();
        let mut failures = PerStep::new(steps.len());
        let (dirty_state, padded_cell) =
            DirtyState::calculate_with_cell(formatter, file, raw_bytes, &mut failures)?;

        let to_lint = match &dirty_state {
            DirtyState::Dirty(canonical) => formatter.encoding().decode(canonical)?,
            DirtyState::Clean | DirtyState::DidNotConverge => {
                formatter.encoding().decode(raw_bytes)?
            }
        };
        let to_lint = to_unix(&to_lint).into_owned();

        let mut lints = PerStep::new(steps.len());
        for (idx, step) in steps.iter().enumerate() {
            if failures.get(idx).is_some() {
                continue;
            }
            match step.lint(&to_lint, file) {
                Ok(found) if !found.is_empty() => lints.set(idx, found),
                Ok(_) => {}
                Err(err) => lints.set(idx, Lint::from_error(&err)),
            }
        }

        // failures were raised against intermediate content; re-run the
        // failing step on the linted text so line numbers match what the user sees
        for (idx, step) in steps.iter().enumerate().rev() {
            if failures.get(idx).is_none() {
                continue;
            }
            if let Err(err) = step.format(&to_lint, file) {
                let found = Lint::from_error(&err);
                if !found.is_empty() {
                    lints.set(idx, found);
                }
            }
        }

        let lints_per_step = lints.index_of_first_value().map(|_| lints);
        Ok(Self {
            dirty_state,
            lints_per_step,
            padded_cell,
        })
    }

    /// The underlying dirty state
    pub fn dirty_state(&self) -> &DirtyState {
        &self.dirty_state
    }

    /// Padded cell of a step chain that was not idempotent on the first pass
    pub fn padded_cell(&self) -> Option<&PaddedCell> {
        self.padded_cell.as_ref()
    }

    /// Consume into the dirty state and the padded cell, if one ran
    pub fn into_parts(self) -> (DirtyState, Option<PaddedCell>) {
        (self.dirty_state, self.padded_cell)
    }

    /// Consume into the dirty state
    pub fn into_dirty_state(self) -> DirtyState {
        self.dirty_state
    }

    /// Some step reported a lint
    pub fn has_lints(&self) -> bool {
        self.lints_per_step.is_some()
    }

    /// Clean and no lints
    pub fn is_clean(&self) -> bool {
        self.dirty_state.is_clean() && !self.has_lints()
    }

    fn checked_lints(&self, formatter: &Formatter) -> Result<Option<&PerStep<Vec<Lint>>>> {
        match &self.lints_per_step {
            Some(lints) if lints.len() != formatter.steps().len() => Err(Error::InvalidState(
                "LintState was created with a different formatter".to_string(),
            )),
            other => Ok(other.as_ref()),
        }
    }

    /// Lints keyed by step name, in step order
    pub fn lints_by_step<'f>(&self, formatter: &'f Formatter) -> Result<Vec<(&'f str, &[Lint])>> {
        let Some(lints) = self.checked_lints(formatter)? else {
            return Err(Error::InvalidState("check `has_lints` first".to_string()));
        };
        Ok(lints
            .iter()
            .map(|(idx, found)| (formatter.steps()[idx].name(), found.as_slice()))
            .collect())
    }

    /// Drop lints silenced by `suppressions` for the file at `relative_path`
    pub fn with_removed_suppressions(
        self,
        formatter: &Formatter,
        relative_path: &str,
        suppressions: &[LintSuppression],
    ) -> Result<Self> {
        if self.checked_lints(formatter)?.is_none() || suppressions.is_empty() {
            return Ok(self);
        }
        let Self {
            dirty_state,
            lints_per_step,
            padded_cell,
        } = self;
        let Some(lints_per_step) = lints_per_step else {
            return Ok(Self::from_parts(dirty_state, None, padded_cell));
        };

        let mut filtered = PerStep::new(lints_per_step.len());
        for (idx, lints) in lints_per_step.iter() {
            let step_name = formatter.steps()[idx].name();
            let kept: Vec<Lint> = lints
                .iter()
                .filter(|lint| {
                    !suppressions
                        .iter()
                        .any(|s| s.suppresses(relative_path, step_name, lint))
                })
                .cloned()
                .collect();
            if !kept.is_empty() {
                filtered.set(idx, kept);
            }
        }
        let remaining = filtered.index_of_first_value().map(|_| filtered);
        Ok(Self::from_parts(dirty_state, remaining, padded_cell))
    }

    fn from_parts(
        dirty_state: DirtyState,
        lints_per_step: Option<PerStep<Vec<Lint>>>,
        padded_cell: Option<PaddedCell>,
    ) -> Self {
        Self {
            dirty_state,
            lints_per_step,
            padded_cell,
        }
    }

    /// One lint per line, full detail: `<file name>:<line> <code>(<step>) <detail>`
    pub fn as_string_detailed(&self, file: &Path, formatter: &Formatter) -> Result<String> {
        self.as_string(file, formatter, false)
    }

    /// Like [`LintState::as_string_detailed`], keeping only the first line of each detail
    pub fn as_string_one_line(&self, file: &Path, formatter: &Formatter) -> Result<String> {
        self.as_string(file, formatter, true)
    }

    fn as_string(&self, file: &Path, formatter: &Formatter, one_line: bool) -> Result<String> {
        let Some(lints_per_step) = self.checked_lints(formatter)? else {
            return Ok("(none)".to_string());
        };
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut out = String::new();
        for (idx, lints) in lints_per_step.iter() {
            let step_name = formatter.steps()[idx].name();
            for lint in lints {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&file_name);
                out.push(':');
                lint.add_warning_message_to(&mut out, step_name, one_line);
            }
        }
        Ok(out)
    }
}
