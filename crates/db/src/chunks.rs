// FileChunk node CRUD, vector KNN, and full-text search over the file_chunks table.

use arrow_array::{
  Array, BooleanArray, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray, UInt32Array,
};
use futures::TryStreamExt;
use graphdex_core::FileChunkRecord;
use lance_index::scalar::FullTextSearchQuery;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;

use crate::connection::{DbError, GraphStore, Result};
use crate::schema::file_chunks_schema;

impl GraphStore {
  /// Add a single FileChunk.
  pub async fn add_chunk(&self, chunk: &FileChunkRecord) -> Result<()> {
    let table = self.file_chunks_table().await?;
    let batch = chunk_to_batch(chunk, self.vector_dim)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], file_chunks_schema(self.vector_dim));
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  /// Add a batch of FileChunks in a single insert.
  pub async fn add_chunks(&self, chunks: &[FileChunkRecord]) -> Result<()> {
    if chunks.is_empty() {
      return Ok(());
    }
    let table = self.file_chunks_table().await?;
    let batches: Vec<_> = chunks.iter().map(|c| chunk_to_batch(c, self.vector_dim)).collect::<Result<_>>()?;
    let iter = RecordBatchIterator::new(batches.into_iter().map(Ok), file_chunks_schema(self.vector_dim));
    table.add(Box::new(iter)).execute().await?;
    Ok(())
  }

  /// All chunks belonging to `file_id`, ordered by chunk_index.
  pub async fn get_chunks_for_file_id(&self, file_id: &str) -> Result<Vec<FileChunkRecord>> {
    let table = self.file_chunks_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("file_id = '{}'", file_id))
      .execute()
      .await?
      .try_collect()
      .await?;

    let mut chunks = Vec::new();
    for batch in results {
      for row in 0..batch.num_rows() {
        chunks.push(batch_to_chunk(&batch, row)?);
      }
    }
    chunks.sort_by_key(|c| c.chunk_index);
    Ok(chunks)
  }

  /// Delete all chunks for a file id. Called before re-inserting fresh chunks
  /// on re-index, and as part of [`GraphStore::delete_file_cascade`].
  pub async fn delete_chunks_for_file_id(&self, file_id: &str) -> Result<()> {
    let table = self.file_chunks_table().await?;
    table.delete(&format!("file_id = '{}'", file_id)).await?;
    Ok(())
  }

  /// KNN search over chunk embeddings.
  pub async fn search_chunks_by_vector(
    &self,
    query_vector: &[f32],
    limit: usize,
    filter: Option<&str>,
  ) -> Result<Vec<(FileChunkRecord, f32)>> {
    let table = self.file_chunks_table().await?;
    let query = table.vector_search(query_vector.to_vec())?.limit(limit);
    let query = match filter {
      Some(f) => query.only_if(f),
      None => query,
    };
    let results: Vec<RecordBatch> = query.execute().await?.try_collect().await?;

    let mut out = Vec::new();
    for batch in results {
      for row in 0..batch.num_rows() {
        let chunk = batch_to_chunk(&batch, row)?;
        let distance = batch
          .column_by_name("_distance")
          .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
          .map(|a| a.value(row))
          .unwrap_or(0.0);
        out.push((chunk, distance));
      }
    }
    Ok(out)
  }

  /// Full-text search over chunk `text`.
  pub async fn search_chunks_fulltext(&self, query: &str, limit: usize) -> Result<Vec<FileChunkRecord>> {
    let table = self.file_chunks_table().await?;
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
        out.push(batch_to_chunk(&batch, row)?);
      }
    }
    Ok(out)
  }
}

fn chunk_to_batch(chunk: &FileChunkRecord, vector_dim: usize) -> Result<RecordBatch> {
  let mut padded = chunk.embedding.clone();
  padded.resize(vector_dim, 0.0);
  let field = Arc::new(arrow_schema::Field::new("item", arrow_schema::DataType::Float32, true));
  let vector_list = FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(Float32Array::from(padded)), None)?;

  let batch = RecordBatch::try_new(
    file_chunks_schema(vector_dim),
    vec![
      Arc::new(StringArray::from(vec![chunk.id.clone()])),
      Arc::new(StringArray::from(vec![chunk.file_id.clone()])),
      Arc::new(StringArray::from(vec![chunk.file_path.clone()])),
      Arc::new(UInt32Array::from(vec![chunk.chunk_index])),
      Arc::new(UInt32Array::from(vec![chunk.total_chunks])),
      Arc::new(StringArray::from(vec![chunk.text.clone()])),
      Arc::new(UInt32Array::from(vec![chunk.start_offset])),
      Arc::new(UInt32Array::from(vec![chunk.end_offset])),
      Arc::new(UInt32Array::from(vec![chunk.embedding_dimensions])),
      Arc::new(StringArray::from(vec![chunk.embedding_model.clone()])),
      Arc::new(BooleanArray::from(vec![chunk.has_prev])),
      Arc::new(BooleanArray::from(vec![chunk.has_next])),
      Arc::new(vector_list),
    ],
  )?;

  Ok(batch)
}

fn batch_to_chunk(batch: &RecordBatch, row: usize) -> Result<FileChunkRecord> {
  let get_string = |name: &str| -> Result<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .map(|a| a.value(row).to_string())
      .ok_or_else(|| DbError::NotFound(format!("column {name}")))
  };
  let get_u32 = |name: &str| -> Result<u32> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
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

  let embedding = batch
    .column_by_name("vector")
    .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
    .map(|a| {
      let values = a.value(row);
      let floats = values.as_any().downcast_ref::<Float32Array>().expect("vector column is f32");
      floats.values().to_vec()
    })
    .unwrap_or_default();

  Ok(FileChunkRecord {
    id: get_string("id")?,
    file_id: get_string("file_id")?,
    file_path: get_string("file_path")?,
    chunk_index: get_u32("chunk_index")?,
    total_chunks: get_u32("total_chunks")?,
    text: get_string("text")?,
    start_offset: get_u32("start_offset")?,
    end_offset: get_u32("end_offset")?,
    embedding,
    embedding_dimensions: get_u32("embedding_dimensions")?,
    embedding_model: get_string("embedding_model")?,
    has_prev: get_bool("has_prev")?,
    has_next: get_bool("has_next")?,
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

  fn test_chunk(file_id: &str, index: u32) -> FileChunkRecord {
    FileChunkRecord {
      id: graphdex_core::chunk_id("/test/a.rs", index, "hello"),
      file_id: file_id.to_string(),
      file_path: "/test/a.rs".to_string(),
      chunk_index: index,
      total_chunks: 2,
      text: "hello".to_string(),
      start_offset: 0,
      end_offset: 5,
      embedding: vec![0.1; 8],
      embedding_dimensions: 8,
      embedding_model: "test-model".to_string(),
      has_prev: index > 0,
      has_next: index < 1,
    }
  }

  #[tokio::test]
  async fn add_and_list_chunks_ordered_by_index() {
    let (_temp, store) = create_test_store().await;
    store.add_chunk(&test_chunk("file-1", 1)).await.unwrap();
    store.add_chunk(&test_chunk("file-1", 0)).await.unwrap();

    let chunks = store.get_chunks_for_file_id("file-1").await.unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].chunk_index, 0);
    assert_eq!(chunks[1].chunk_index, 1);
  }

  #[tokio::test]
  async fn delete_chunks_for_file_id_removes_all() {
    let (_temp, store) = create_test_store().await;
    store.add_chunk(&test_chunk("file-1", 0)).await.unwrap();
    store.add_chunk(&test_chunk("file-1", 1)).await.unwrap();

    store.delete_chunks_for_file_id("file-1").await.unwrap();

    assert!(store.get_chunks_for_file_id("file-1").await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn search_chunks_by_vector_returns_distance() {
    let (_temp, store) = create_test_store().await;
    store.add_chunk(&test_chunk("file-1", 0)).await.unwrap();

    let results = store.search_chunks_by_vector(&[0.1; 8], 5, None).await.unwrap();
    assert_eq!(results.len(), 1);
  }
}
