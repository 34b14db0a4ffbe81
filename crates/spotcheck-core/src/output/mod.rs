//! Report rendering

pub mod diff;
pub mod json_format;
pub mod writer;

pub use diff::unified_diff;
pub use json_format::{format_problem_files_json, format_report_json};
pub use writer::OutputWriter;
