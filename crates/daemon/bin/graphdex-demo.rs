//! Minimal end-to-end smoke test: subscribe a temp directory, wait for the
//! initial index to complete via the progress stream, run a hybrid search,
//! then unsubscribe. Runs fully offline (embeddings disabled, search falls
//! back to BM25-only) so it never depends on a live embedding backend —
//! `embedding::build_provider` is exercised separately by `embedding`'s own
//! unit tests.

use daemon::{HybridSearchService, SearchRequest, WatchManager, WatchManagerConfig};
use db::GraphStore;
use graphdex_core::{Subscription, SubscriptionStatus};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let workdir = tempfile::tempdir().expect("create temp workdir");
  std::fs::write(
    workdir.path().join("readme.md"),
    "graphdex indexes a directory and makes it hybrid-searchable",
  )
  .expect("write sample file");
  std::fs::write(
    workdir.path().join("notes.txt"),
    "unrelated scratch notes about lunch",
  )
  .expect("write sample file");

  let db_dir = tempfile::tempdir().expect("create temp db dir");
  let store = Arc::new(
    GraphStore::open_at_path(workdir.path().to_path_buf(), db_dir.path().to_path_buf(), 8)
      .await
      .expect("open graph store"),
  );

  let embedder: Arc<dyn embedding::EmbeddingProvider + Send + Sync> =
    embedding::build_provider(&graphdex_core::EmbeddingSettings::default());
  let manager = WatchManager::new(store.clone(), embedder, None, WatchManagerConfig::default());

  let mut subscription = Subscription::new("demo-sub", workdir.path().to_string_lossy().into_owned());
  subscription.generate_embeddings = false;

  let mut progress = manager.progress().subscribe(&subscription.id).await;
  manager
    .start_subscription(&subscription, &[])
    .await
    .expect("start subscription");

  let terminal = tokio::time::timeout(Duration::from_secs(30), async {
    loop {
      let event = progress.recv().await.expect("progress channel closed early");
      tracing::info!(status = ?event.status, indexed = event.indexed, "indexing progress");
      if matches!(
        event.status,
        SubscriptionStatus::Completed | SubscriptionStatus::Cancelled | SubscriptionStatus::Error
      ) {
        break event;
      }
    }
  })
  .await
  .expect("indexing did not finish in time");

  assert_eq!(terminal.status, SubscriptionStatus::Completed, "initial index should complete cleanly");

  let search = HybridSearchService::new(store, None);
  let response = search
    .search(SearchRequest {
      query: "hybrid searchable directory".to_string(),
      ..Default::default()
    })
    .await;

  tracing::info!(hits = response.results.len(), "search complete");
  for result in &response.results {
    println!("{:>6.3}  {}  {}", result.score, result.path, result.preview);
  }

  manager.stop_watch(&subscription.id).await.expect("stop watch");
  println!("demo complete: {} files indexed, {} search hits", terminal.indexed, response.results.len());
}
