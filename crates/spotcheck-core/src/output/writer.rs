//! Human-readable report output

use super::diff::DiffBudget;
use crate::error::Result;
use crate::types::{FileOutcome, RunReport};
use std::io::Write;

const DETAIL_INDENT: &str = "               ";

/// Output writer
pub struct OutputWriter;

impl OutputWriter {
    /// Write a per-group summary listing every file that is not clean,
    /// followed by a one-line verdict.
    ///
    /// Diffs of dirty files share one line budget across the report.
    pub fn write_text_summary<W: Write>(out: &mut W, report: &RunReport) -> Result<()> {
        let mut budget = DiffBudget::default();
        for group in &report.groups {
            write!(
                out,
                "{}: {} matched, {} checked",
                group.name,
                group.files_matched,
                group.files.len()
            )?;
            if let Some(reference) = &group.ratchet_from {
                write!(out, " (ratchet from {})", reference)?;
            }
            writeln!(out)?;

            for file in &group.files {
                match &file.outcome {
                    FileOutcome::Clean => {}
                    FileOutcome::Dirty {
                        written,
                        misbehaved,
                        diff,
                    } => {
                        let label = if *written { "fixed" } else { "dirty" };
                        write!(out, "  {}      {}", label, file.path)?;
                        if let Some(message) = misbehaved {
                            write!(out, " ({})", message)?;
                        }
                        writeln!(out)?;
                        let Some((lines, omitted)) = diff.as_deref().and_then(|d| budget.take(d))
                        else {
                            continue;
                        };
                        for line in lines {
                            writeln!(out, "{}{}", DETAIL_INDENT, line)?;
                        }
                        if omitted > 0 {
                            writeln!(
                                out,
                                "{}... ({} more lines that didn't fit)",
                                DETAIL_INDENT, omitted
                            )?;
                        }
                    }
                    FileOutcome::DidNotConverge { message } => {
                        writeln!(out, "  unstable   {} ({})", file.path, message)?
                    }
                    FileOutcome::Lints { detail } => {
                        writeln!(out, "  lints      {}", file.path)?;
                        for line in detail.lines() {
                            writeln!(out, "{}{}", DETAIL_INDENT, line)?;
                        }
                    }
                    FileOutcome::Failed { error } => {
                        writeln!(out, "  failed     {}: {}", file.path, error)?
                    }
                }
            }
        }

        let problems = report
            .files()
            .filter(|f| f.outcome.is_problem(report.mode))
            .count();
        if problems == 0 {
            writeln!(out, "{}: ok", report.mode.as_str())?;
        } else {
            let (noun, verb) = if problems == 1 {
                ("file", "needs")
            } else {
                ("files", "need")
            };
            writeln!(
                out,
                "{}: {} {} {} attention",
                report.mode.as_str(),
                problems,
                noun,
                verb
            )?;
        }
        Ok(())
    }

    /// Write the report as JSON
    pub fn write_json<W: Write>(out: &mut W, report: &RunReport) -> Result<()> {
        let content = super::json_format::format_report_json(report)?;
        writeln!(out, "{}", content)?;
        Ok(())
    }
}
