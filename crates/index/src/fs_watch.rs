//! Filesystem event source plus write-stabilisation debounce. A writer that
//! touches a file in several rapid syscalls (truncate, write, fsync) would
//! otherwise trigger a premature index pass on a half-written file; batching
//! events per path and only emitting once a path has been quiet for the
//! configured debounce period lets the write finish first.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, channel};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum WatchError {
  #[error("Notify error: {0}")]
  Notify(#[from] notify::Error),
  #[error("Channel receive error")]
  ChannelRecv,
}

/// Type of file change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
  Created,
  Modified,
  Deleted,
}

#[derive(Debug, Clone)]
pub struct FileChange {
  pub path: PathBuf,
  pub kind: ChangeKind,
}

/// Raw, undebounced filesystem event source for a subscription root.
pub struct FileWatcher {
  _watcher: RecommendedWatcher,
  receiver: Receiver<Result<Event, notify::Error>>,
  root: PathBuf,
}

impl FileWatcher {
  pub fn new(root: &Path) -> Result<Self, WatchError> {
    Self::with_poll_interval(root, Duration::from_secs(2))
  }

  pub fn with_poll_interval(root: &Path, poll_interval: Duration) -> Result<Self, WatchError> {
    let (tx, rx) = channel();
    let config = Config::default().with_poll_interval(poll_interval);

    let mut watcher = RecommendedWatcher::new(
      move |res| {
        let _ = tx.send(res);
      },
      config,
    )?;

    watcher.watch(root, RecursiveMode::Recursive)?;

    Ok(Self {
      _watcher: watcher,
      receiver: rx,
      root: root.to_path_buf(),
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Poll for the next event, non-blocking.
  pub fn poll(&self) -> Option<FileChange> {
    match self.receiver.try_recv() {
      Ok(Ok(event)) => self.process_event(event),
      Ok(Err(e)) => {
        warn!("watch error: {}", e);
        None
      }
      Err(_) => None,
    }
  }

  pub fn collect_pending(&self) -> Vec<FileChange> {
    let mut changes = Vec::new();
    while let Some(change) = self.poll() {
      changes.push(change);
    }
    changes
  }

  fn process_event(&self, event: Event) -> Option<FileChange> {
    let path = event.paths.first()?.clone();
    if path.is_dir() {
      return None;
    }

    let kind = match event.kind {
      EventKind::Create(_) => ChangeKind::Created,
      EventKind::Modify(_) => ChangeKind::Modified,
      EventKind::Remove(_) => ChangeKind::Deleted,
      EventKind::Any | EventKind::Access(_) | EventKind::Other => {
        debug!("ignoring {:?} event for {:?}", event.kind, path);
        return None;
      }
    };

    Some(FileChange { path, kind })
  }
}

/// Debounce configuration. Spec requires a quiet period of at least 2s before
/// a write is considered stable enough to index.
#[derive(Debug, Clone)]
pub struct DebounceConfig {
  pub file_debounce_ms: u64,
  pub max_pending_events: usize,
}

impl Default for DebounceConfig {
  fn default() -> Self {
    Self {
      file_debounce_ms: 2000,
      max_pending_events: 500,
    }
  }
}

#[derive(Debug, Clone)]
struct PendingChange {
  kind: ChangeKind,
  last_seen: Instant,
}

impl PendingChange {
  fn new(kind: ChangeKind) -> Self {
    Self {
      kind,
      last_seen: Instant::now(),
    }
  }

  fn update(&mut self, kind: ChangeKind) {
    self.last_seen = Instant::now();
    match (&self.kind, &kind) {
      (ChangeKind::Created, ChangeKind::Modified) => {}
      (ChangeKind::Deleted, ChangeKind::Created) => self.kind = ChangeKind::Modified,
      (ChangeKind::Created, ChangeKind::Deleted) => self.kind = ChangeKind::Deleted,
      _ => self.kind = kind,
    }
  }
}

/// Coalesces raw filesystem events per path and releases them once a path
/// has gone quiet for `file_debounce_ms`.
pub struct DebouncedWatcher {
  watcher: FileWatcher,
  config: DebounceConfig,
  pending: HashMap<PathBuf, PendingChange>,
}

impl DebouncedWatcher {
  pub fn new(root: &Path, config: DebounceConfig) -> Result<Self, WatchError> {
    Ok(Self {
      watcher: FileWatcher::new(root)?,
      config,
      pending: HashMap::new(),
    })
  }

  pub fn with_defaults(root: &Path) -> Result<Self, WatchError> {
    Self::new(root, DebounceConfig::default())
  }

  pub fn root(&self) -> &Path {
    self.watcher.root()
  }

  fn poll_raw(&mut self) {
    while let Some(change) = self.watcher.poll() {
      if let Some(pending) = self.pending.get_mut(&change.path) {
        pending.update(change.kind);
      } else {
        self.pending.insert(change.path, PendingChange::new(change.kind));
      }
    }
  }

  /// Return changes whose quiet period has elapsed, removing them from the
  /// pending set.
  pub fn collect_ready(&mut self) -> Vec<FileChange> {
    self.poll_raw();

    let now = Instant::now();
    let debounce_duration = Duration::from_millis(self.config.file_debounce_ms);

    let mut ready = Vec::new();
    let mut to_remove = Vec::new();

    for (path, pending) in &self.pending {
      if now.duration_since(pending.last_seen) >= debounce_duration {
        ready.push(FileChange {
          path: path.clone(),
          kind: pending.kind.clone(),
        });
        to_remove.push(path.clone());
      }
    }

    for path in to_remove {
      self.pending.remove(&path);
    }

    ready
  }

  /// Force-release all pending changes regardless of quiet period, used when
  /// `should_force_flush` trips or on shutdown.
  pub fn collect_all(&mut self) -> Vec<FileChange> {
    self.poll_raw();
    self
      .pending
      .drain()
      .map(|(path, pending)| FileChange { path, kind: pending.kind })
      .collect()
  }

  pub fn pending_count(&self) -> usize {
    self.pending.len()
  }

  pub fn should_force_flush(&self) -> bool {
    self.pending.len() >= self.config.max_pending_events
  }
}

/// Periodic batch driver over a [`DebouncedWatcher`].
pub struct BatchProcessor {
  watcher: DebouncedWatcher,
  batch_interval: Duration,
  last_batch: Instant,
}

impl BatchProcessor {
  pub fn new(watcher: DebouncedWatcher) -> Self {
    Self::with_interval(watcher, Duration::from_secs(1))
  }

  pub fn with_interval(watcher: DebouncedWatcher, interval: Duration) -> Self {
    Self {
      watcher,
      batch_interval: interval,
      last_batch: Instant::now(),
    }
  }

  pub fn process_batch<F>(&mut self, handler: F) -> Result<usize, WatchError>
  where
    F: FnMut(FileChange),
  {
    let now = Instant::now();
    if now.duration_since(self.last_batch) < self.batch_interval && !self.watcher.should_force_flush() {
      return Ok(0);
    }

    let changes = if self.watcher.should_force_flush() {
      self.watcher.collect_all()
    } else {
      self.watcher.collect_ready()
    };

    let count = changes.len();
    changes.into_iter().for_each(handler);
    self.last_batch = now;
    Ok(count)
  }

  pub fn watcher(&self) -> &DebouncedWatcher {
    &self.watcher
  }

  pub fn watcher_mut(&mut self) -> &mut DebouncedWatcher {
    &mut self.watcher
  }
}
