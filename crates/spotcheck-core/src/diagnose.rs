//! Dump the intermediate outputs of misbehaving step chains.
//!
//! For a file `src/a.txt` whose chain cycles between two outputs, the
//! diagnose directory receives `src/a.txt.cycle0` and `src/a.txt.cycle1`,
//! each encoded with the format's charset.

use crate::encoding::Encoding;
use crate::error::Result;
use crate::padded_cell::PaddedCell;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where step `index` of `cell` is written for the file at `rel`
pub fn step_path(dir: &Path, rel: &str, cell: &PaddedCell, index: usize) -> PathBuf {
    let mut path = dir.join(rel).into_os_string();
    path.push(format!(".{}{}", cell.kind().as_str(), index));
    PathBuf::from(path)
}

/// Remove `dir` and everything below it. A missing directory is fine.
pub async fn clear(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Write every step of `cell` below `dir`, returning the written paths
pub async fn write_steps(
    dir: &Path,
    rel: &str,
    cell: &PaddedCell,
    encoding: Encoding,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(cell.steps().len());
    for (index, step) in cell.steps().iter().enumerate() {
        let path = step_path(dir, rel, cell, index);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, encoding.encode(step)?).await?;
        written.push(path);
    }
    debug!(file = %rel, steps = written.len(), "wrote diagnose steps");
    Ok(written)
}
