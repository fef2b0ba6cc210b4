//! Path-level ignore matching: built-in defaults, an optional subscription-root
//! ignore file, and programmatic additions, layered with `ignore::gitignore`
//! semantics (trailing `/` for directory-only, `!` negation, glob wildcards).

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Default ignore patterns applied to every subscription regardless of any
/// ignore file: version-control metadata, dependency caches, log files, OS
/// artifacts.
const BUILTIN_PATTERNS: &[&str] = &[
  ".git/",
  ".hg/",
  ".svn/",
  "node_modules/",
  "target/",
  "dist/",
  "build/",
  ".venv/",
  "venv/",
  "__pycache__/",
  "*.log",
  ".DS_Store",
  "Thumbs.db",
];

/// Name of the optional per-subscription ignore file, checked alongside
/// `.gitignore` at the subscription root.
pub const IGNORE_FILE_NAME: &str = ".graphdexignore";

pub struct PathMatcher {
  gitignore: Gitignore,
}

impl PathMatcher {
  /// Build a matcher for `root`, loading built-in defaults, `.gitignore`,
  /// `IGNORE_FILE_NAME` (if present), and `extra_patterns` in that order. A
  /// missing ignore file is not an error.
  pub fn new(root: &Path, extra_patterns: &[String]) -> Self {
    let mut builder = GitignoreBuilder::new(root);

    for pattern in BUILTIN_PATTERNS {
      let _ = builder.add_line(None, pattern);
    }

    let _ = builder.add(root.join(".gitignore"));
    let _ = builder.add(root.join(IGNORE_FILE_NAME));

    for pattern in extra_patterns {
      let _ = builder.add_line(None, pattern);
    }

    let gitignore = builder.build().unwrap_or_else(|_| Gitignore::empty());
    Self { gitignore }
  }

  /// Decide ignore/keep for `path`, relative to the matcher's root. Empty or
  /// root paths are never ignored.
  pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
    if path.as_os_str().is_empty() || path == Path::new(".") {
      return false;
    }
    self.gitignore.matched(path, is_dir).is_ignore()
  }
}
