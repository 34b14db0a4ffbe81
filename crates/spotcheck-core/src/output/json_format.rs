//! JSON rendering of run reports

use crate::error::Result;
use crate::types::RunReport;

/// Render the whole report as pretty-printed JSON
pub fn format_report_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// JSON array of the paths that fail the run, in report order
pub fn format_problem_files_json(report: &RunReport) -> Result<String> {
    let paths: Vec<&str> = report
        .files()
        .filter(|f| f.outcome.is_problem(report.mode))
        .map(|f| f.path.as_str())
        .collect();
    Ok(serde_json::to_string(&paths)?)
}
