//! Main coordination logic

pub mod processor;

pub use processor::{FileProcessor, FormatGroup};
