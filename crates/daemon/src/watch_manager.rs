//! Subscription lifecycle: own a filesystem watcher and an indexing job per
//! watched root, and keep [`ProgressBus`] current for both.
//!
//! Each subscription gets two background tasks: a watch loop that turns
//! debounced filesystem events into incremental `index`/`delete_file_cascade`
//! calls, and an indexing job that walks the whole tree once (Phase 1 fast
//! scan + mtime skip, Phase 2 bounded-concurrency indexing). Both share one
//! `CancellationToken` so `abortIndexing`/`stopWatch` can cut either off
//! cooperatively: in-flight file indexing finishes, nothing new starts.

use crate::progress::{ProgressBus, ProgressEvent};
use db::GraphStore;
use embedding::{EmbeddingProvider, VlClient};
use futures::stream::{self, StreamExt};
use graphdex_core::{ConcurrencySettings, Subscription, SubscriptionStatus, file_id};
use index::{DebouncedWatcher, ChangeKind, FileIndexer, FileIndexerConfig, PathMatcher, Scanner};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Minimum row count before building a LanceDB vector/FTS index is worth the
/// cost; matches the threshold `GraphStore::ensure_chunk_indices`/`ensure_file_indices`
/// gate on.
const MIN_ROWS_FOR_INDEX: usize = 256;

#[derive(Debug, Error)]
pub enum WatchManagerError {
  #[error("subscription {0} is already being watched")]
  AlreadyWatching(String),
  #[error("subscription {0} is not being watched")]
  NotWatching(String),
  #[error("watch error: {0}")]
  Watch(#[from] index::WatchError),
  #[error("graph store error: {0}")]
  Db(#[from] db::DbError),
  #[error("{0}")]
  Validation(#[from] graphdex_core::ValidationError),
}

/// Maps directly onto `ConcurrencySettings`; kept as its own type so the
/// watch manager doesn't need to know about config-file loading.
#[derive(Debug, Clone, Copy)]
pub struct WatchManagerConfig {
  pub scan_concurrency: usize,
  pub index_concurrency: usize,
  pub max_concurrent_subscriptions: usize,
  pub inter_call_delay_ms: u64,
}

impl Default for WatchManagerConfig {
  fn default() -> Self {
    ConcurrencySettings::default().into()
  }
}

impl From<ConcurrencySettings> for WatchManagerConfig {
  fn from(c: ConcurrencySettings) -> Self {
    Self {
      scan_concurrency: c.scan_concurrency,
      index_concurrency: c.index_concurrency,
      max_concurrent_subscriptions: c.max_concurrent_subscriptions,
      inter_call_delay_ms: c.inter_call_delay_ms,
    }
  }
}

struct ManagedSubscription {
  cancellation: CancellationToken,
  watch_handle: JoinHandle<()>,
  index_handle: JoinHandle<()>,
}

pub struct WatchManager {
  store: Arc<GraphStore>,
  embedder: Arc<dyn EmbeddingProvider + Send + Sync>,
  vl_client: Option<Arc<VlClient>>,
  progress: Arc<ProgressBus>,
  config: WatchManagerConfig,
  subscription_semaphore: Arc<Semaphore>,
  subscriptions: RwLock<HashMap<String, ManagedSubscription>>,
}

impl WatchManager {
  pub fn new(
    store: Arc<GraphStore>,
    embedder: Arc<dyn EmbeddingProvider + Send + Sync>,
    vl_client: Option<Arc<VlClient>>,
    config: WatchManagerConfig,
  ) -> Self {
    Self {
      store,
      embedder,
      vl_client,
      progress: Arc::new(ProgressBus::new()),
      subscription_semaphore: Arc::new(Semaphore::new(config.max_concurrent_subscriptions.max(1))),
      config,
      subscriptions: RwLock::new(HashMap::new()),
    }
  }

  pub fn progress(&self) -> &ProgressBus {
    &self.progress
  }

  /// Start watching `subscription.root_path`: rejects a duplicate, starts a
  /// debounced watcher, and enqueues a whole-tree indexing job.
  pub async fn start_subscription(
    &self,
    subscription: &Subscription,
    extra_ignore_patterns: &[String],
  ) -> Result<(), WatchManagerError> {
    {
      let subs = self.subscriptions.read().await;
      if subs.contains_key(&subscription.id) {
        return Err(WatchManagerError::AlreadyWatching(subscription.id.clone()));
      }
    }

    let root = graphdex_core::validate_root_path(&subscription.root_path)?;
    graphdex_core::validate_debounce_ms(subscription.debounce_ms)?;
    graphdex_core::validate_ignore_patterns(extra_ignore_patterns)?;
    let matcher = Arc::new(PathMatcher::new(&root, extra_ignore_patterns));
    let watcher = DebouncedWatcher::with_defaults(&root)?;
    let cancellation = CancellationToken::new();

    let indexer = Arc::new(FileIndexer::new(
      self.store.clone(),
      self.embedder.clone(),
      self.vl_client.clone(),
      FileIndexerConfig {
        subscription_id: Some(subscription.id.clone()),
        generate_embeddings: subscription.generate_embeddings,
        ..Default::default()
      },
    ));

    self.progress.publish(ProgressEvent::queued(&subscription.id)).await;

    let watch_handle = tokio::spawn(run_watch_loop(
      watcher,
      indexer.clone(),
      self.store.clone(),
      root.clone(),
      cancellation.clone(),
    ));

    let index_handle = self.spawn_indexing_job(subscription.id.clone(), root, matcher, indexer, cancellation.clone());

    self.subscriptions.write().await.insert(
      subscription.id.clone(),
      ManagedSubscription {
        cancellation,
        watch_handle,
        index_handle,
      },
    );

    Ok(())
  }

  fn spawn_indexing_job(
    &self,
    subscription_id: String,
    root: PathBuf,
    matcher: Arc<PathMatcher>,
    indexer: Arc<FileIndexer>,
    cancellation: CancellationToken,
  ) -> JoinHandle<()> {
    let store = self.store.clone();
    let progress = self.progress.clone();
    let config = self.config;
    let semaphore = self.subscription_semaphore.clone();

    tokio::spawn(async move {
      let permit = tokio::select! {
        _ = cancellation.cancelled() => return,
        permit = semaphore.acquire_owned() => match permit {
          Ok(permit) => permit,
          Err(_) => return,
        },
      };
      run_indexing_job(subscription_id, root, matcher, indexer, store, progress, config, cancellation).await;
      drop(permit);
    })
  }

  /// Set the cancellation token; the indexing job finishes its current file
  /// and reports `Cancelled` rather than stopping mid-write.
  pub async fn abort_indexing(&self, subscription_id: &str) {
    if let Some(managed) = self.subscriptions.read().await.get(subscription_id) {
      managed.cancellation.cancel();
    }
  }

  /// Cancel, await the indexing job's finalisation (cancelled counts as a
  /// clean stop), and drop the watch loop so its watcher closes.
  pub async fn stop_watch(&self, subscription_id: &str) -> Result<(), WatchManagerError> {
    let managed = self
      .subscriptions
      .write()
      .await
      .remove(subscription_id)
      .ok_or_else(|| WatchManagerError::NotWatching(subscription_id.to_string()))?;

    managed.cancellation.cancel();
    let _ = managed.index_handle.await;
    let _ = managed.watch_handle.await;
    Ok(())
  }

  pub async fn is_watching(&self, subscription_id: &str) -> bool {
    self.subscriptions.read().await.contains_key(subscription_id)
  }
}

async fn run_watch_loop(
  mut watcher: DebouncedWatcher,
  indexer: Arc<FileIndexer>,
  store: Arc<GraphStore>,
  root: PathBuf,
  cancellation: CancellationToken,
) {
  loop {
    if cancellation.is_cancelled() {
      return;
    }

    for change in watcher.collect_ready() {
      if cancellation.is_cancelled() {
        return;
      }
      let Ok(relative) = change.path.strip_prefix(&root) else {
        continue;
      };
      let relative_path = relative.to_string_lossy().into_owned();

      match change.kind {
        ChangeKind::Created | ChangeKind::Modified => {
          if let Err(e) = indexer.index_file(&change.path, &relative_path).await {
            warn!(path = %change.path.display(), "indexing watched file failed: {}", e);
          }
        }
        ChangeKind::Deleted => {
          let id = file_id(&change.path.to_string_lossy());
          if let Err(e) = store.delete_file_cascade(&id).await {
            warn!(path = %change.path.display(), "cascade delete of watched file failed: {}", e);
          }
        }
      }
    }

    tokio::select! {
      _ = cancellation.cancelled() => return,
      _ = tokio::time::sleep(Duration::from_millis(500)) => {}
    }
  }
}

#[allow(clippy::too_many_arguments)]
async fn run_indexing_job(
  subscription_id: String,
  root: PathBuf,
  matcher: Arc<PathMatcher>,
  indexer: Arc<FileIndexer>,
  store: Arc<GraphStore>,
  progress: Arc<ProgressBus>,
  config: WatchManagerConfig,
  cancellation: CancellationToken,
) {
  progress
    .publish(ProgressEvent {
      status: SubscriptionStatus::Indexing,
      ..ProgressEvent::queued(&subscription_id)
    })
    .await;

  let scanner = Scanner::new();
  let scan_result = scanner.scan(&root, &matcher, |_| {});
  let scanned = scan_result.files.len() as u32;

  // Phase 1: bounded-concurrency mtime fast-skip. Scanner mtimes are in
  // seconds, stored FileRecord mtimes are in milliseconds (graphdex_core::now_millis).
  let store_for_scan = store.clone();
  let to_index: Vec<_> = stream::iter(scan_result.files)
    .map(|scanned_file| {
      let store = store_for_scan.clone();
      async move {
        match store.get_file_by_path(&scanned_file.path.to_string_lossy()).await {
          Ok(Some(existing)) if existing.mtime >= scanned_file.mtime as i64 * 1000 => None,
          _ => Some(scanned_file),
        }
      }
    })
    .buffer_unordered(config.scan_concurrency.max(1))
    .collect::<Vec<_>>()
    .await
    .into_iter()
    .flatten()
    .collect();

  let fast_skipped = scanned - to_index.len() as u32;

  progress
    .publish(ProgressEvent {
      status: SubscriptionStatus::Indexing,
      scanned,
      fast_skipped,
      ..ProgressEvent::queued(&subscription_id)
    })
    .await;

  // Phase 2: bounded-concurrency indexing, cancellation-aware at file boundaries.
  let mut indexed = 0u32;
  let mut skipped = 0u32;
  let mut errored = 0u32;
  let phase2_semaphore = Arc::new(Semaphore::new(config.index_concurrency.max(1)));
  let mut handles = Vec::with_capacity(to_index.len());

  for scanned_file in to_index {
    if cancellation.is_cancelled() {
      break;
    }
    let permit = match phase2_semaphore.clone().acquire_owned().await {
      Ok(permit) => permit,
      Err(_) => break,
    };
    let indexer = indexer.clone();
    let relative_path = scanned_file.relative_path.clone();
    handles.push(tokio::spawn(async move {
      let _permit = permit;
      let result = indexer.index_file(&scanned_file.path, &relative_path).await;
      (relative_path, result)
    }));
    if config.inter_call_delay_ms > 0 {
      tokio::time::sleep(Duration::from_millis(config.inter_call_delay_ms)).await;
    }
  }

  for handle in handles {
    let Ok((relative_path, result)) = handle.await else {
      errored += 1;
      continue;
    };
    match result {
      Ok(outcome) if outcome.skipped => skipped += 1,
      Ok(_) => indexed += 1,
      Err(e) => {
        warn!(path = %relative_path, "file indexing failed: {}", e);
        errored += 1;
      }
    }
    progress
      .publish(ProgressEvent {
        status: SubscriptionStatus::Indexing,
        scanned,
        fast_skipped,
        indexed,
        skipped,
        errored,
        current_file: Some(relative_path),
        ..ProgressEvent::queued(&subscription_id)
      })
      .await;
  }

  let final_status = if cancellation.is_cancelled() {
    SubscriptionStatus::Cancelled
  } else {
    SubscriptionStatus::Completed
  };

  if final_status == SubscriptionStatus::Completed {
    if let Err(e) = store.ensure_chunk_indices(MIN_ROWS_FOR_INDEX).await {
      warn!(%subscription_id, "failed to build file_chunks index: {}", e);
    }
    if let Err(e) = store.ensure_file_indices(MIN_ROWS_FOR_INDEX).await {
      warn!(%subscription_id, "failed to build files index: {}", e);
    }
  }

  progress
    .publish(ProgressEvent {
      status: final_status,
      scanned,
      fast_skipped,
      indexed,
      skipped,
      errored,
      ..ProgressEvent::queued(&subscription_id)
    })
    .await;

  if let Ok(Some(mut record)) = store.get_subscription(&subscription_id).await {
    record.status = final_status;
    record.files_indexed = indexed as u64;
    record.last_indexed_time = Some(graphdex_core::now_millis());
    let _ = store.upsert_subscription(&record).await;
  }
}
