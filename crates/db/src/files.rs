// File node CRUD, vector KNN, and full-text search over the files table.

use arrow_array::{
  Array, BooleanArray, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray,
  UInt32Array, UInt64Array,
};
use futures::TryStreamExt;
use graphdex_core::FileRecord;
use lance_index::scalar::FullTextSearchQuery;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::{DbError, GraphStore, Result};
use crate::schema::files_schema;

impl GraphStore {
  /// Upsert a File node: delete any existing row with the same id, then
  /// insert the new one. LanceDB has no native upsert, so delete-then-add is
  /// the idiomatic update pattern here.
  pub async fn upsert_file(&self, file: &FileRecord, vector: Option<&[f32]>) -> Result<()> {
    let table = self.files_table().await?;
    let _ = table.delete(&format!("id = '{}'", file.id)).await;

    let batch = file_to_batch(file, vector, self.vector_dim)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], files_schema(self.vector_dim));
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  /// Look up a File by its deterministic id.
  pub async fn get_file(&self, id: &str) -> Result<Option<FileRecord>> {
    let table = self.files_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("id = '{}'", id))
      .execute()
      .await?
      .try_collect()
      .await?;

    for batch in &results {
      if batch.num_rows() > 0 {
        return Ok(Some(batch_to_file(batch, 0)?));
      }
    }
    Ok(None)
  }

  /// Look up a File by its absolute path, used by the indexer's fast-skip check.
  pub async fn get_file_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
    let table = self.files_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("path = '{}'", path.replace('\'', "''")))
      .execute()
      .await?
      .try_collect()
      .await?;

    for batch in &results {
      if batch.num_rows() > 0 {
        return Ok(Some(batch_to_file(batch, 0)?));
      }
    }
    Ok(None)
  }

  /// Delete a File and cascade to its chunks and edges.
  pub async fn delete_file_cascade(&self, id: &str) -> Result<()> {
    self.delete_chunks_for_file_id(id).await?;
    self.delete_edges_touching(id).await?;
    let table = self.files_table().await?;
    table.delete(&format!("id = '{}'", id)).await?;
    Ok(())
  }

  /// KNN search over file embeddings (whole-file, non-chunked content).
  pub async fn search_files_by_vector(&self, query_vector: &[f32], limit: usize) -> Result<Vec<(FileRecord, f32)>> {
    let table = self.files_table().await?;
    let results: Vec<RecordBatch> = table
      .vector_search(query_vector.to_vec())?
      .limit(limit)
      .execute()
      .await?
      .try_collect()
      .await?;

    let mut out = Vec::new();
    for batch in results {
      for row in 0..batch.num_rows() {
        let file = batch_to_file(&batch, row)?;
        let distance = batch
          .column_by_name("_distance")
          .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
          .map(|a| a.value(row))
          .unwrap_or(0.0);
        out.push((file, distance));
      }
    }
    Ok(out)
  }

  /// Full-text search over `content` (files stored without chunking).
  pub async fn search_files_fulltext(&self, query: &str, limit: usize) -> Result<Vec<FileRecord>> {
    let table = self.files_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .full_text_search(FullTextSearchQuery::new(query.to_string()))
      .limit(limit)
      .execute()
      .await?
      .try_collect()
      .await?;

    let mut out = Vec::new();
    for batch in results {
      for row in 0..batch.num_rows() {
        out.push(batch_to_file(&batch, row)?);
      }
    }
    Ok(out)
  }
}

fn file_to_batch(file: &FileRecord, vector: Option<&[f32]>, vector_dim: usize) -> Result<RecordBatch> {
  let vector_list = match vector {
    Some(v) => {
      let mut padded = v.to_vec();
      padded.resize(vector_dim, 0.0);
      let field = Arc::new(arrow_schema::Field::new("item", arrow_schema::DataType::Float32, true));
      FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(Float32Array::from(padded)), None)?
    }
    None => {
      let field = Arc::new(arrow_schema::Field::new("item", arrow_schema::DataType::Float32, true));
      let nulls = Float32Array::from(vec![0.0f32; vector_dim]);
      FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(nulls), Some(vec![false].into()))?
    }
  };

  let batch = RecordBatch::try_new(
    files_schema(vector_dim),
    vec![
      Arc::new(StringArray::from(vec![file.id.clone()])),
      Arc::new(StringArray::from(vec![file.path.clone()])),
      Arc::new(StringArray::from(vec![file.subscription_id.clone()])),
      Arc::new(StringArray::from(vec![file.display_name.clone()])),
      Arc::new(StringArray::from(vec![file.extension.clone()])),
      Arc::new(StringArray::from(vec![file.language.clone()])),
      Arc::new(UInt64Array::from(vec![file.size_bytes])),
      Arc::new(UInt32Array::from(vec![file.line_count])),
      Arc::new(Int64Array::from(vec![file.mtime])),
      Arc::new(Int64Array::from(vec![file.indexed_at])),
      Arc::new(BooleanArray::from(vec![file.has_chunks])),
      Arc::new(StringArray::from(vec![file.content.clone()])),
      Arc::new(StringArray::from(vec![file.embedding_model.clone()])),
      Arc::new(StringArray::from(vec![serde_json::to_string(&file.extra)?])),
      Arc::new(vector_list),
    ],
  )?;

  Ok(batch)
}

fn batch_to_file(batch: &RecordBatch, row: usize) -> Result<FileRecord> {
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
  let get_u32 = |name: &str| -> Result<u32> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
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
  let get_i64 = |name: &str| -> Result<i64> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
      .map(|a| a.value(row))
      .ok_or_else(|| DbError::NotFound(format!("column {name}")))
  };
  let get_bool = |name: &str| -> Result<bool> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<BooleanArray>())
      .map(|a| a.value(row))
      .ok_or_else(|| DbError::NotFound(format!("column {name}")))
  };

  let extra_json = get_string("extra")?;
  let extra: HashMap<String, serde_json::Value> = serde_json::from_str(&extra_json)?;

  let embedding = batch
    .column_by_name("vector")
    .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
    .filter(|a| !a.is_null(row))
    .map(|a| {
      let values = a.value(row);
      let floats = values.as_any().downcast_ref::<Float32Array>().expect("vector column is f32");
      floats.values().to_vec()
    });

  Ok(FileRecord {
    id: get_string("id")?,
    path: get_string("path")?,
    subscription_id: get_opt_string("subscription_id"),
    display_name: get_string("display_name")?,
    extension: get_string("extension")?,
    language: get_string("language")?,
    size_bytes: get_u64("size_bytes")?,
    line_count: get_u32("line_count")?,
    mtime: get_i64("mtime")?,
    indexed_at: get_i64("indexed_at")?,
    has_chunks: get_bool("has_chunks")?,
    content: get_opt_string("content"),
    embedding,
    embedding_model: get_opt_string("embedding_model"),
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

  fn test_file(path: &str) -> FileRecord {
    FileRecord {
      id: graphdex_core::file_id(path),
      path: path.to_string(),
      subscription_id: Some("sub-1".to_string()),
      display_name: "file.rs".to_string(),
      extension: "rs".to_string(),
      language: "rust".to_string(),
      size_bytes: 42,
      line_count: 3,
      mtime: 1000,
      indexed_at: graphdex_core::now_millis(),
      has_chunks: false,
      content: Some("fn main() {}".to_string()),
      embedding: None,
      embedding_model: None,
      extra: HashMap::new(),
    }
  }

  #[tokio::test]
  async fn upsert_and_get_file_by_path() {
    let (_temp, store) = create_test_store().await;
    let file = test_file("/test/a.rs");

    store.upsert_file(&file, Some(&[0.1; 8])).await.unwrap();

    let found = store.get_file_by_path("/test/a.rs").await.unwrap().unwrap();
    assert_eq!(found.id, file.id);
    assert_eq!(found.content, file.content);
    assert!(found.embedding.is_some());
  }

  #[tokio::test]
  async fn upsert_replaces_existing_row() {
    let (_temp, store) = create_test_store().await;
    let mut file = test_file("/test/a.rs");
    store.upsert_file(&file, None).await.unwrap();

    file.mtime = 2000;
    file.content = Some("fn main() { println!(\"hi\"); }".to_string());
    store.upsert_file(&file, None).await.unwrap();

    let found = store.get_file(&file.id).await.unwrap().unwrap();
    assert_eq!(found.mtime, 2000);

    // Only one row should remain for this id.
    let table = store.files_table().await.unwrap();
    let count = table.count_rows(Some(format!("id = '{}'", file.id))).await.unwrap();
    assert_eq!(count, 1);
  }

  #[tokio::test]
  async fn get_file_by_path_returns_none_when_absent() {
    let (_temp, store) = create_test_store().await;
    assert!(store.get_file_by_path("/nope").await.unwrap().is_none());
  }
}
