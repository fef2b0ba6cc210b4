// Subscription CRUD over the subscriptions table.

use arrow_array::{BooleanArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray, UInt64Array};
use futures::TryStreamExt;
use graphdex_core::{Subscription, SubscriptionStatus};
use lancedb::query::{ExecutableQuery, QueryBase};
use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::{DbError, GraphStore, Result};
use crate::schema::subscriptions_schema;

fn status_str(status: SubscriptionStatus) -> &'static str {
  match status {
    SubscriptionStatus::Active => "active",
    SubscriptionStatus::Indexing => "indexing",
    SubscriptionStatus::Completed => "completed",
    SubscriptionStatus::Cancelled => "cancelled",
    SubscriptionStatus::Error => "error",
  }
}

fn status_from_str(s: &str) -> Result<SubscriptionStatus> {
  match s {
    "active" => Ok(SubscriptionStatus::Active),
    "indexing" => Ok(SubscriptionStatus::Indexing),
    "completed" => Ok(SubscriptionStatus::Completed),
    "cancelled" => Ok(SubscriptionStatus::Cancelled),
    "error" => Ok(SubscriptionStatus::Error),
    other => Err(DbError::NotFound(format!("unknown subscription status {other}"))),
  }
}

impl GraphStore {
  /// Insert or replace a subscription by id.
  pub async fn upsert_subscription(&self, sub: &Subscription) -> Result<()> {
    let table = self.subscriptions_table().await?;
    let _ = table.delete(&format!("id = '{}'", sub.id)).await;

    let batch = subscription_to_batch(sub)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], subscriptions_schema());
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  pub async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>> {
    let table = self.subscriptions_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("id = '{}'", id))
      .execute()
      .await?
      .try_collect()
      .await?;

    for batch in &results {
      if batch.num_rows() > 0 {
        return Ok(Some(batch_to_subscription(batch, 0)?));
      }
    }
    Ok(None)
  }

  pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
    let table = self.subscriptions_table().await?;
    let results: Vec<RecordBatch> = table.query().execute().await?.try_collect().await?;

    let mut out = Vec::new();
    for batch in results {
      for row in 0..batch.num_rows() {
        out.push(batch_to_subscription(&batch, row)?);
      }
    }
    Ok(out)
  }

  pub async fn delete_subscription(&self, id: &str) -> Result<()> {
    let table = self.subscriptions_table().await?;
    table.delete(&format!("id = '{}'", id)).await?;
    Ok(())
  }
}

fn subscription_to_batch(sub: &Subscription) -> Result<RecordBatch> {
  let batch = RecordBatch::try_new(
    subscriptions_schema(),
    vec![
      Arc::new(StringArray::from(vec![sub.id.clone()])),
      Arc::new(StringArray::from(vec![sub.root_path.clone()])),
      Arc::new(BooleanArray::from(vec![sub.recursive])),
      Arc::new(StringArray::from(vec![serde_json::to_string(&sub.file_patterns)?])),
      Arc::new(StringArray::from(vec![serde_json::to_string(&sub.ignore_patterns)?])),
      Arc::new(UInt64Array::from(vec![sub.debounce_ms])),
      Arc::new(BooleanArray::from(vec![sub.generate_embeddings])),
      Arc::new(StringArray::from(vec![status_str(sub.status)])),
      Arc::new(UInt64Array::from(vec![sub.files_indexed])),
      Arc::new(Int64Array::from(vec![sub.last_indexed_time])),
      Arc::new(StringArray::from(vec![sub.error.clone()])),
      Arc::new(StringArray::from(vec![serde_json::to_string(&sub.extra)?])),
    ],
  )?;
  Ok(batch)
}

fn batch_to_subscription(batch: &RecordBatch, row: usize) -> Result<Subscription> {
  let get_string = |name: &str| -> Result<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .map(|a| a.value(row).to_string())
      .ok_or_else(|| DbError::NotFound(format!("column {name}")))
  };
  let get_opt_string = |name: &str| -> Option<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .filter(|a| !a.is_null(row))
      .map(|a| a.value(row).to_string())
  };
  let get_bool = |name: &str| -> Result<bool> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<BooleanArray>())
      .map(|a| a.value(row))
      .ok_or_else(|| DbError::NotFound(format!("column {name}")))
  };
  let get_u64 = |name: &str| -> Result<u64> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
      .map(|a| a.value(row))
      .ok_or_else(|| DbError::NotFound(format!("column {name}")))
  };
  let get_opt_i64 = |name: &str| -> Option<i64> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
      .filter(|a| !a.is_null(row))
      .map(|a| a.value(row))
  };

  let file_patterns: Vec<String> = serde_json::from_str(&get_string("file_patterns")?)?;
  let ignore_patterns: Vec<String> = serde_json::from_str(&get_string("ignore_patterns")?)?;
  let extra: HashMap<String, serde_json::Value> = serde_json::from_str(&get_string("extra")?)?;

  Ok(Subscription {
    id: get_string("id")?,
    root_path: get_string("root_path")?,
    recursive: get_bool("recursive")?,
    file_patterns,
    ignore_patterns,
    debounce_ms: get_u64("debounce_ms")?,
    generate_embeddings: get_bool("generate_embeddings")?,
    status: status_from_str(&get_string("status")?)?,
    files_indexed: get_u64("files_indexed")?,
    last_indexed_time: get_opt_i64("last_indexed_time"),
    error: get_opt_string("error"),
    extra,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;
  use tempfile::TempDir;

  async fn create_test_store() -> (TempDir, GraphStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = GraphStore::open_at_path(Path::new("/test").to_path_buf(), temp_dir.path().join("test.lancedb"), 8)
      .await
      .unwrap();
    (temp_dir, store)
  }

  #[tokio::test]
  async fn upsert_and_get_subscription() {
    let (_temp, store) = create_test_store().await;
    let sub = Subscription::new("sub-1", "/tmp/proj");

    store.upsert_subscription(&sub).await.unwrap();

    let found = store.get_subscription("sub-1").await.unwrap().unwrap();
    assert_eq!(found.root_path, "/tmp/proj");
    assert_eq!(found.status, SubscriptionStatus::Active);
  }

  #[tokio::test]
  async fn upsert_replaces_status() {
    let (_temp, store) = create_test_store().await;
    let mut sub = Subscription::new("sub-1", "/tmp/proj");
    store.upsert_subscription(&sub).await.unwrap();

    sub.status = SubscriptionStatus::Completed;
    sub.files_indexed = 12;
    store.upsert_subscription(&sub).await.unwrap();

    let found = store.get_subscription("sub-1").await.unwrap().unwrap();
    assert_eq!(found.status, SubscriptionStatus::Completed);
    assert_eq!(found.files_indexed, 12);
  }

  #[tokio::test]
  async fn list_subscriptions_returns_all() {
    let (_temp, store) = create_test_store().await;
    store.upsert_subscription(&Subscription::new("sub-1", "/a")).await.unwrap();
    store.upsert_subscription(&Subscription::new("sub-2", "/b")).await.unwrap();

    assert_eq!(store.list_subscriptions().await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn delete_subscription_removes_row() {
    let (_temp, store) = create_test_store().await;
    store.upsert_subscription(&Subscription::new("sub-1", "/a")).await.unwrap();
    store.delete_subscription("sub-1").await.unwrap();
    assert!(store.get_subscription("sub-1").await.unwrap().is_none());
  }
}
