// Typed edge CRUD with cascade deletion.

use arrow_array::{Int64Array, RecordBatch, RecordBatchIterator, StringArray, UInt32Array};
use futures::TryStreamExt;
use graphdex_core::{Edge, EdgeKind};
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;

use crate::connection::{DbError, GraphStore, Result};
use crate::schema::edges_schema;

fn edge_kind_str(kind: EdgeKind) -> &'static str {
  match kind {
    EdgeKind::HasChunk => "HAS_CHUNK",
    EdgeKind::Watches => "WATCHES",
    EdgeKind::WatchedBy => "WATCHED_BY",
  }
}

fn edge_kind_from_str(s: &str) -> Result<EdgeKind> {
  match s {
    "HAS_CHUNK" => Ok(EdgeKind::HasChunk),
    "WATCHES" => Ok(EdgeKind::Watches),
    "WATCHED_BY" => Ok(EdgeKind::WatchedBy),
    other => Err(DbError::NotFound(format!("unknown edge kind {other}"))),
  }
}

impl GraphStore {
  /// Insert a single typed edge.
  pub async fn add_edge(&self, edge: &Edge) -> Result<()> {
    let table = self.edges_table().await?;
    let id = graphdex_core::chunk_id(&edge.from_id, edge.index.unwrap_or(0), &edge.to_id);

    let batch = RecordBatch::try_new(
      edges_schema(),
      vec![
        Arc::new(StringArray::from(vec![id])),
        Arc::new(StringArray::from(vec![edge_kind_str(edge.kind)])),
        Arc::new(StringArray::from(vec![edge.from_id.clone()])),
        Arc::new(StringArray::from(vec![edge.to_id.clone()])),
        Arc::new(UInt32Array::from(vec![edge.index])),
        Arc::new(Int64Array::from(vec![graphdex_core::now_millis()])),
      ],
    )?;

    let batches = RecordBatchIterator::new(vec![Ok(batch)], edges_schema());
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  /// All edges of `kind` originating at `from_id`, ordered by `edge_index`.
  pub async fn edges_from(&self, from_id: &str, kind: EdgeKind) -> Result<Vec<Edge>> {
    let table = self.edges_table().await?;
    let filter = format!("from_id = '{}' AND kind = '{}'", from_id, edge_kind_str(kind));
    let results: Vec<RecordBatch> = table.query().only_if(filter).execute().await?.try_collect().await?;

    let mut edges = Vec::new();
    for batch in results {
      for row in 0..batch.num_rows() {
        edges.push(batch_to_edge(&batch, row)?);
      }
    }
    edges.sort_by_key(|e| e.index.unwrap_or(0));
    Ok(edges)
  }

  /// Delete every edge touching `node_id` as either endpoint. Used when a
  /// File or FileChunk is removed so stale edges don't linger.
  pub async fn delete_edges_touching(&self, node_id: &str) -> Result<()> {
    let table = self.edges_table().await?;
    table
      .delete(&format!("from_id = '{}' OR to_id = '{}'", node_id, node_id))
      .await?;
    Ok(())
  }

  /// Delete all edges of `kind` from `from_id` (used before re-attaching a
  /// fresh set of HAS_CHUNK edges on re-index).
  pub async fn delete_edges_from(&self, from_id: &str, kind: EdgeKind) -> Result<()> {
    let table = self.edges_table().await?;
    table
      .delete(&format!("from_id = '{}' AND kind = '{}'", from_id, edge_kind_str(kind)))
      .await?;
    Ok(())
  }
}

fn batch_to_edge(batch: &RecordBatch, row: usize) -> Result<Edge> {
  let get_string = |name: &str| -> Result<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .map(|a| a.value(row).to_string())
      .ok_or_else(|| DbError::NotFound(format!("column {name}")))
  };

  let kind = edge_kind_from_str(&get_string("kind")?)?;
  let index = batch
    .column_by_name("edge_index")
    .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
    .filter(|a| !a.is_null(row))
    .map(|a| a.value(row));

  Ok(Edge {
    kind,
    from_id: get_string("from_id")?,
    to_id: get_string("to_id")?,
    index,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;
  use tempfile::TempDir;

  async fn create_test_store() -> (TempDir, GraphStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = GraphStore::open_at_path(Path::new("/test").to_path_buf(), temp_dir.path().join("test.lancedb"), 32)
      .await
      .unwrap();
    (temp_dir, store)
  }

  #[tokio::test]
  async fn add_and_list_edges_from() {
    let (_temp, store) = create_test_store().await;

    store
      .add_edge(&Edge {
        kind: EdgeKind::HasChunk,
        from_id: "file-1".to_string(),
        to_id: "chunk-1".to_string(),
        index: Some(0),
      })
      .await
      .unwrap();
    store
      .add_edge(&Edge {
        kind: EdgeKind::HasChunk,
        from_id: "file-1".to_string(),
        to_id: "chunk-2".to_string(),
        index: Some(1),
      })
      .await
      .unwrap();

    let edges = store.edges_from("file-1", EdgeKind::HasChunk).await.unwrap();
    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0].to_id, "chunk-1");
    assert_eq!(edges[1].to_id, "chunk-2");
  }

  #[tokio::test]
  async fn delete_edges_from_clears_only_matching_kind() {
    let (_temp, store) = create_test_store().await;

    store
      .add_edge(&Edge {
        kind: EdgeKind::HasChunk,
        from_id: "file-1".to_string(),
        to_id: "chunk-1".to_string(),
        index: Some(0),
      })
      .await
      .unwrap();
    store
      .add_edge(&Edge {
        kind: EdgeKind::Watches,
        from_id: "file-1".to_string(),
        to_id: "sub-1".to_string(),
        index: None,
      })
      .await
      .unwrap();

    store.delete_edges_from("file-1", EdgeKind::HasChunk).await.unwrap();

    assert!(store.edges_from("file-1", EdgeKind::HasChunk).await.unwrap().is_empty());
    assert_eq!(store.edges_from("file-1", EdgeKind::Watches).await.unwrap().len(), 1);
  }
}
