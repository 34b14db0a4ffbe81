//! Pattern matching with parallel filtering

use crate::error::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;

/// Pattern matcher with precompiled include/exclude glob sets.
///
/// Paths are `/`-separated and relative to the run root. Excludes always win;
/// an empty include set matches everything.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    include_set: GlobSet,
    exclude_set: GlobSet,
}

impl PatternMatcher {
    /// Create a new pattern matcher
    pub fn new<S: AsRef<str>>(includes: &[S], excludes: &[S]) -> Result<Self> {
        Ok(Self {
            include_set: build_set(includes)?,
            exclude_set: build_set(excludes)?,
        })
    }

    /// Create from a single list where `!pattern` marks an exclude
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            match pattern.strip_prefix('!') {
                Some(stripped) => excludes.push(stripped),
                None => includes.push(pattern),
            }
        }
        Self::new(&includes, &excludes)
    }

    /// Synchronous match for use with rayon - zero allocation
    #[inline]
    pub fn matches_sync(&self, path: &str) -> bool {
        if self.exclude_set.is_match(path) {
            return false;
        }
        self.include_set.is_empty() || self.include_set.is_match(path)
    }

    /// Parallel filter using rayon, keeping input order
    pub fn filter_paths_parallel(&self, paths: &[String]) -> Vec<String> {
        paths
            .par_iter()
            .filter(|path| self.matches_sync(path))
            .cloned()
            .collect()
    }
}

fn build_set<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern.as_ref())?);
    }
    Ok(builder.build()?)
}
