//! End-to-end smoke test: subscribe a temp directory, wait for the initial
//! index via the progress stream, run a hybrid search, unsubscribe.

use daemon::{HybridSearchService, SearchRequest, WatchManager, WatchManagerConfig};
use db::GraphStore;
use graphdex_core::{Subscription, SubscriptionStatus};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn subscribe_index_search_unsubscribe() {
  let _ = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).try_init();

  let workdir = tempfile::tempdir().unwrap();
  std::fs::write(
    workdir.path().join("readme.md"),
    "graphdex indexes a directory and makes it hybrid-searchable",
  )
  .unwrap();
  std::fs::write(workdir.path().join("notes.txt"), "unrelated scratch notes about lunch").unwrap();

  let db_dir = tempfile::tempdir().unwrap();
  let store = Arc::new(
    GraphStore::open_at_path(workdir.path().to_path_buf(), db_dir.path().to_path_buf(), 8)
      .await
      .unwrap(),
  );

  let embedder: Arc<dyn embedding::EmbeddingProvider + Send + Sync> =
    embedding::build_provider(&graphdex_core::EmbeddingSettings::default());
  let manager = WatchManager::new(store.clone(), embedder, None, WatchManagerConfig::default());

  let mut subscription = Subscription::new("test-sub", workdir.path().to_string_lossy().into_owned());
  subscription.generate_embeddings = false;

  let mut progress = manager.progress().subscribe(&subscription.id).await;
  manager.start_subscription(&subscription, &[]).await.unwrap();

  let terminal = tokio::time::timeout(Duration::from_secs(30), async {
    loop {
      let event = progress.recv().await.unwrap();
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

  assert_eq!(terminal.status, SubscriptionStatus::Completed);
  assert_eq!(terminal.indexed, 2);

  let search = HybridSearchService::new(store, None);
  let response = search
    .search(SearchRequest {
      query: "hybrid searchable directory".to_string(),
      ..Default::default()
    })
    .await;

  assert!(!response.results.is_empty());
  assert!(response.results.iter().any(|r| r.path.ends_with("readme.md")));

  manager.stop_watch(&subscription.id).await.unwrap();
  assert!(!manager.is_watching(&subscription.id).await);
}
