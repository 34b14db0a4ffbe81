//! Decide whether a file needs rewriting and compute the bytes to write

use crate::error::{Error, Result};
use crate::formatter::{Formatter, PerStep};
use crate::line_ending::to_unix;
use crate::padded_cell::{PaddedCell, MAX_CYCLE};
use std::io::Write;
use std::path::Path;

/// Formatting state of one file's bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirtyState {
    /// The bytes are already canonical
    Clean,
    /// The step chain diverges; nothing should be written
    DidNotConverge,
    /// The canonical bytes, which differ from the input
    Dirty(Vec<u8>),
}

impl DirtyState {
    /// Already canonical
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }

    /// Step chain diverged
    pub fn did_not_converge(&self) -> bool {
        matches!(self, Self::DidNotConverge)
    }

    /// Canonical bytes of a dirty file
    pub fn canonical_bytes(&self) -> Result<&[u8]> {
        match self {
            Self::Dirty(bytes) => Ok(bytes),
            Self::Clean | Self::DidNotConverge => Err(Error::InvalidState(
                "first make sure the state is neither clean nor did-not-converge".to_string(),
            )),
        }
    }

    /// Overwrite `file` with the canonical bytes
    pub fn write_canonical_to(&self, file: &Path) -> Result<()> {
        std::fs::write(file, self.canonical_bytes()?)?;
        Ok(())
    }

    /// Write the canonical bytes to `out`
    pub fn write_canonical_to_writer<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(self.canonical_bytes()?)?;
        Ok(())
    }

    /// Read `file` and [`DirtyState::calculate`] its state
    pub fn of_file(formatter: &Formatter, file: &Path) -> Result<Self> {
        let raw_bytes = std::fs::read(file)?;
        Self::calculate(formatter, file, &raw_bytes)
    }

    /// State of `raw_bytes`; step failures propagate through the exception policy.
    pub fn calculate(formatter: &Formatter, file: &Path, raw_bytes: &[u8]) -> Result<Self> {
        calculate_inner(formatter, file, raw_bytes, |input| {
            formatter.compute(input, file)
        })
        .map(|(state, _)| state)
    }

    /// State of `raw_bytes`, recording step failures in `failures` instead of returning them
    pub fn calculate_with_failures(
        formatter: &Formatter,
        file: &Path,
        raw_bytes: &[u8],
        failures: &mut PerStep<Error>,
    ) -> Result<Self> {
        Self::calculate_with_cell(formatter, file, raw_bytes, failures).map(|(state, _)| state)
    }

    /// Like [`DirtyState::calculate_with_failures`], also returning the
    /// padded cell when the step chain was not idempotent on the first pass.
    ///
    /// The cell is `None` for files that are clean or idempotent-dirty.
    pub fn calculate_with_cell(
        formatter: &Formatter,
        file: &Path,
        raw_bytes: &[u8],
        failures: &mut PerStep<Error>,
    ) -> Result<(Self, Option<PaddedCell>)> {
        calculate_inner(formatter, file, raw_bytes, |input| {
            Ok(formatter.compute_with_lint(input, file, failures))
        })
    }
}

fn calculate_inner<F>(
    formatter: &Formatter,
    file: &Path,
    raw_bytes: &[u8],
    mut compute: F,
) -> Result<(DirtyState, Option<PaddedCell>)>
where
    F: FnMut(&str) -> Result<String>,
{
    let encoding = formatter.encoding();
    let raw = encoding.decode(raw_bytes)?;
    let raw_unix = to_unix(&raw);

    let formatted_unix = compute(&raw_unix)?;
    let formatted = formatter.compute_line_endings(&formatted_unix, file)?;
    let formatted_bytes = encoding.encode(&formatted)?;
    if *formatted_bytes == *raw_bytes {
        return Ok((DirtyState::Clean, None));
    }

    // most dirty files are idempotent-dirty
    let double_formatted = compute(&formatted_unix)?;
    if double_formatted == formatted_unix {
        return Ok((DirtyState::Dirty(formatted_bytes.into_owned()), None));
    }

    let cell = PaddedCell::check_with(file, &raw_unix, MAX_CYCLE, &mut compute)?;
    if !cell.is_resolvable() {
        return Ok((DirtyState::DidNotConverge, Some(cell)));
    }

    let canonical = formatter.compute_line_endings(cell.canonical()?, file)?;
    let canonical_bytes = encoding.encode(&canonical)?;
    let state = if *canonical_bytes != *raw_bytes {
        DirtyState::Dirty(canonical_bytes.into_owned())
    } else {
        DirtyState::Clean
    };
    Ok((state, Some(cell)))
}
