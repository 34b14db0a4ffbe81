//! Pattern matching module

pub mod matcher;

pub use matcher::PatternMatcher;
