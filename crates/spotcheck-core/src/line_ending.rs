//! Line ending normalization and per-file line ending policies

use crate::error::Result;
use crate::traits::LineEndingPolicy;
use crate::types::{native_line_ending, LineEnding};
use parking_lot::{Mutex, RwLock};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Normalize to `\n`.
///
/// Content without any `\n` is returned as is (a lone `\r` is not a line
/// break); otherwise every `\r` is removed.
pub fn to_unix(input: &str) -> Cow<'_, str> {
    let bytes = input.as_bytes();
    if memchr::memchr(b'\n', bytes).is_none() || memchr::memchr(b'\r', bytes).is_none() {
        return Cow::Borrowed(input);
    }
    Cow::Owned(input.replace('\r', ""))
}

/// Convert `\n`-separated content to `ending`
pub fn from_unix<'a>(unix: &'a str, ending: &str) -> Cow<'a, str> {
    if ending == "\n" || memchr::memchr(b'\n', unix.as_bytes()).is_none() {
        Cow::Borrowed(unix)
    } else {
        Cow::Owned(unix.replace('\n', ending))
    }
}

/// Build the policy for `ending`, resolving repository state under `root`
pub fn policy_for(ending: LineEnding, root: &Path) -> Arc<dyn LineEndingPolicy> {
    match ending {
        LineEnding::GitAttributes => Arc::new(GitAttributesPolicy::new(root)),
        LineEnding::Preserve => Arc::new(PreservePolicy),
        LineEnding::PlatformNative => Arc::new(FixedPolicy(native_line_ending())),
        LineEnding::Windows => Arc::new(FixedPolicy("\r\n")),
        LineEnding::Unix => Arc::new(FixedPolicy("\n")),
    }
}

/// Same ending for every file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPolicy(pub &'static str);

impl LineEndingPolicy for FixedPolicy {
    fn ending_for(&self, _file: &Path) -> Result<&'static str> {
        Ok(self.0)
    }

    fn is_unix(&self) -> bool {
        self.0 == "\n"
    }
}

/// Keeps the ending of the first line of the file on disk
#[derive(Debug, Clone, Copy, Default)]
pub struct PreservePolicy;

/// Bytes inspected when looking for the first line break
const PRESERVE_SCAN_LIMIT: u64 = 64 * 1024;

impl LineEndingPolicy for PreservePolicy {
    fn ending_for(&self, file: &Path) -> Result<&'static str> {
        let handle = match std::fs::File::open(file) {
            Ok(handle) => handle,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(native_line_ending())
            }
            Err(err) => return Err(err.into()),
        };
        let mut head = Vec::new();
        handle.take(PRESERVE_SCAN_LIMIT).read_to_end(&mut head)?;
        Ok(first_line_ending(&head).unwrap_or_else(native_line_ending))
    }
}

/// Ending of the first line in `bytes`, `None` when there is no `\n`
pub fn first_line_ending(bytes: &[u8]) -> Option<&'static str> {
    let idx = memchr::memchr(b'\n', bytes)?;
    if idx > 0 && bytes[idx - 1] == b'\r' {
        Some("\r\n")
    } else {
        Some("\n")
    }
}

/// Map a git `eol` value to a separator; unknown values fall back to native
pub fn eol_to_ending(eol: &str, file: &Path) -> &'static str {
    match eol.to_ascii_lowercase().as_str() {
        "lf" => "\n",
        "crlf" => "\r\n",
        "native" => native_line_ending(),
        other => {
            warn!(
                eol = other,
                file = %file.display(),
                "unspecified eol value in git attributes, defaulting to platform native"
            );
            native_line_ending()
        }
    }
}

/// Cached answers kept before the cache is reset
const ATTRIBUTE_CACHE_SIZE: usize = 4096;

/// Reads the `eol` attribute through git, falling back to `core.eol`, then native.
pub struct GitAttributesPolicy {
    repo: Option<Mutex<git2::Repository>>,
    workdir: Option<PathBuf>,
    default_ending: &'static str,
    cache: RwLock<HashMap<PathBuf, &'static str>>,
}

impl GitAttributesPolicy {
    /// Discover the repository containing `root`; without one every file gets native
    pub fn new(root: &Path) -> Self {
        let repo = match git2::Repository::discover(root) {
            Ok(repo) => Some(repo),
            Err(err) => {
                debug!(root = %root.display(), error = %err.message(), "no repository for git attributes");
                None
            }
        };

        let default_ending = repo
            .as_ref()
            .and_then(|r| r.config().ok())
            .and_then(|config| config.get_string("core.eol").ok())
            .map(|eol| eol_to_ending(&eol, root))
            .unwrap_or_else(native_line_ending);

        let workdir = repo
            .as_ref()
            .and_then(|r| r.workdir())
            .map(|w| w.canonicalize().unwrap_or_else(|_| w.to_path_buf()));

        Self {
            repo: repo.map(Mutex::new),
            workdir,
            default_ending,
            cache: RwLock::new(HashMap::with_capacity(256)),
        }
    }

    fn lookup(&self, file: &Path) -> Result<&'static str> {
        let (Some(repo), Some(workdir)) = (&self.repo, &self.workdir) else {
            return Ok(self.default_ending);
        };
        let Some(relative) = relative_to(workdir, file) else {
            return Ok(self.default_ending);
        };

        let repo = repo.lock();
        let eol = repo.get_attr(&relative, "eol", git2::AttrCheckFlags::FILE_THEN_INDEX)?;
        Ok(match eol {
            Some(value) => match git2::AttrValue::from_string(Some(value)) {
                git2::AttrValue::String(s) => eol_to_ending(s, file),
                _ => self.default_ending,
            },
            None => self.default_ending,
        })
    }
}

impl LineEndingPolicy for GitAttributesPolicy {
    fn ending_for(&self, file: &Path) -> Result<&'static str> {
        {
            let cache = self.cache.read();
            if let Some(&cached) = cache.get(file) {
                return Ok(cached);
            }
        }

        let ending = self.lookup(file)?;

        {
            let mut cache = self.cache.write();
            if cache.len() >= ATTRIBUTE_CACHE_SIZE {
                cache.clear();
            }
            cache.insert(file.to_path_buf(), ending);
        }

        Ok(ending)
    }
}

/// `file` relative to `root`, trying the canonical form when the literal one does not match
fn relative_to(root: &Path, file: &Path) -> Option<PathBuf> {
    if let Ok(rel) = file.strip_prefix(root) {
        return Some(rel.to_path_buf());
    }
    let canonical = match file.canonicalize() {
        Ok(path) => path,
        // the file may not exist yet; canonicalize its directory instead
        Err(_) => {
            let parent = file.parent()?.canonicalize().ok()?;
            parent.join(file.file_name()?)
        }
    };
    canonical.strip_prefix(root).ok().map(Path::to_path_buf)
}
