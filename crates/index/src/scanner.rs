use crate::path_matcher::PathMatcher;
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Walk error: {0}")]
  Walk(#[from] ignore::Error),
}

/// Result of scanning a single file.
#[derive(Debug, Clone)]
pub struct ScannedFile {
  pub path: PathBuf,
  pub relative_path: String,
  pub size: u64,
  pub mtime: u64,
}

/// Result of scanning a directory.
#[derive(Debug)]
pub struct ScanResult {
  pub files: Vec<ScannedFile>,
  pub skipped_count: u32,
  pub total_bytes: u64,
  pub scan_duration: Duration,
}

/// Progress callback data.
#[derive(Debug, Clone)]
pub struct ScanProgress {
  pub scanned: u32,
  pub path: PathBuf,
}

/// Phase-1 fast filesystem walker: PathMatcher-filtered, content-agnostic
/// (TextClassifier/DocumentExtractor decide what's actually indexable once a
/// file is opened — this only rules out ignored paths and oversized files).
pub struct Scanner {
  max_file_size: u64,
  follow_links: bool,
}

impl Default for Scanner {
  fn default() -> Self {
    Self::new()
  }
}

impl Scanner {
  pub fn new() -> Self {
    Self {
      max_file_size: 50 * 1024 * 1024, // 50MB
      follow_links: false,
    }
  }

  pub fn with_max_file_size(mut self, size: u64) -> Self {
    self.max_file_size = size;
    self
  }

  /// Walk `root` in parallel, filtering through `matcher`, reporting
  /// `progress` every 100 files scanned.
  pub fn scan<F>(&self, root: &Path, matcher: &PathMatcher, progress: F) -> ScanResult
  where
    F: Fn(ScanProgress) + Send + Sync,
  {
    let start = Instant::now();
    let scanned = AtomicU32::new(0);
    let skipped = AtomicU32::new(0);
    let total_bytes = AtomicU64::new(0);

    let walker = WalkBuilder::new(root)
      .follow_links(self.follow_links)
      .hidden(false)
      .git_ignore(false)
      .git_global(false)
      .git_exclude(false)
      .standard_filters(false)
      .build();

    // par_bridge avoids collecting the walk first, which matters once a tree
    // has 100k+ entries.
    let files: Vec<ScannedFile> = walker
      .filter_map(|e| e.ok())
      .par_bridge()
      .filter_map(|entry| {
        let path = entry.path();
        let is_dir = entry.file_type().is_none_or(|ft| ft.is_dir());

        let relative = path.strip_prefix(root).ok()?;
        if matcher.is_ignored(relative, is_dir) {
          return None;
        }
        if is_dir {
          return None;
        }

        let count = scanned.fetch_add(1, Ordering::Relaxed);
        if count.is_multiple_of(100) {
          progress(ScanProgress {
            scanned: count,
            path: path.to_path_buf(),
          });
        }

        let metadata = entry.metadata().ok()?;
        if metadata.len() == 0 {
          skipped.fetch_add(1, Ordering::Relaxed);
          return None;
        }
        if metadata.len() > self.max_file_size {
          skipped.fetch_add(1, Ordering::Relaxed);
          return None;
        }

        let mtime = metadata.modified().ok()?.duration_since(UNIX_EPOCH).ok()?.as_secs();
        total_bytes.fetch_add(metadata.len(), Ordering::Relaxed);

        Some(ScannedFile {
          path: path.to_path_buf(),
          relative_path: relative.to_string_lossy().into(),
          size: metadata.len(),
          mtime,
        })
      })
      .collect();

    ScanResult {
      files,
      skipped_count: skipped.load(Ordering::Relaxed),
      total_bytes: total_bytes.load(Ordering::Relaxed),
      scan_duration: start.elapsed(),
    }
  }

  /// Scan a single file, for use from fs-event handlers where the walker
  /// hasn't already produced a `ScannedFile`.
  pub fn scan_file(&self, path: &Path, root: &Path) -> Option<ScannedFile> {
    let metadata = path.metadata().ok()?;
    if metadata.len() == 0 || metadata.len() > self.max_file_size {
      return None;
    }

    let mtime = metadata.modified().ok()?.duration_since(UNIX_EPOCH).ok()?.as_secs();

    Some(ScannedFile {
      path: path.to_path_buf(),
      relative_path: path.strip_prefix(root).ok()?.to_string_lossy().into(),
      size: metadata.len(),
      mtime,
    })
  }
}
