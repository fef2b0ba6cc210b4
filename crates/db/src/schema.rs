use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

fn vector_field(vector_dim: usize) -> Field {
  Field::new(
    "vector",
    DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), vector_dim as i32),
    true,
  )
}

/// Schema for the files table: one row per indexed path under a subscription.
pub fn files_schema(vector_dim: usize) -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("path", DataType::Utf8, false),
    Field::new("subscription_id", DataType::Utf8, true),
    Field::new("display_name", DataType::Utf8, false),
    Field::new("extension", DataType::Utf8, false),
    Field::new("language", DataType::Utf8, false),
    Field::new("size_bytes", DataType::UInt64, false),
    Field::new("line_count", DataType::UInt32, false),
    Field::new("mtime", DataType::Int64, false),
    Field::new("indexed_at", DataType::Int64, false),
    Field::new("has_chunks", DataType::Boolean, false),
    Field::new("content", DataType::Utf8, true),
    Field::new("embedding_model", DataType::Utf8, true),
    Field::new("extra", DataType::Utf8, false), // JSON object
    vector_field(vector_dim),
  ]))
}

/// Schema for the file_chunks table: one row per chunk of a chunked file.
pub fn file_chunks_schema(vector_dim: usize) -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("file_id", DataType::Utf8, false),
    Field::new("file_path", DataType::Utf8, false),
    Field::new("chunk_index", DataType::UInt32, false),
    Field::new("total_chunks", DataType::UInt32, false),
    Field::new("text", DataType::Utf8, false),
    Field::new("start_offset", DataType::UInt32, false),
    Field::new("end_offset", DataType::UInt32, false),
    Field::new("embedding_dimensions", DataType::UInt32, false),
    Field::new("embedding_model", DataType::Utf8, false),
    Field::new("has_prev", DataType::Boolean, false),
    Field::new("has_next", DataType::Boolean, false),
    vector_field(vector_dim),
  ]))
}

/// Schema for the subscriptions table.
pub fn subscriptions_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("root_path", DataType::Utf8, false),
    Field::new("recursive", DataType::Boolean, false),
    Field::new("file_patterns", DataType::Utf8, false), // JSON array
    Field::new("ignore_patterns", DataType::Utf8, false), // JSON array
    Field::new("debounce_ms", DataType::UInt64, false),
    Field::new("generate_embeddings", DataType::Boolean, false),
    Field::new("status", DataType::Utf8, false),
    Field::new("files_indexed", DataType::UInt64, false),
    Field::new("last_indexed_time", DataType::Int64, true),
    Field::new("error", DataType::Utf8, true),
    Field::new("extra", DataType::Utf8, false), // JSON object
  ]))
}

/// Schema for the edges table: typed links between node ids (HAS_CHUNK,
/// WATCHES, WATCHED_BY).
pub fn edges_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("kind", DataType::Utf8, false),
    Field::new("from_id", DataType::Utf8, false),
    Field::new("to_id", DataType::Utf8, false),
    Field::new("edge_index", DataType::UInt32, true),
    Field::new("created_at", DataType::Int64, false),
  ]))
}

/// Default vector dimensions, matching the default embedding model's output size.
pub const DEFAULT_VECTOR_DIM: usize = 4096; // qwen3-embedding

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn files_schema_has_vector_and_content() {
    let schema = files_schema(768);
    assert!(schema.field_with_name("id").is_ok());
    assert!(schema.field_with_name("content").is_ok());
    assert!(schema.field_with_name("vector").is_ok());
  }

  #[test]
  fn file_chunks_schema_has_text_and_vector() {
    let schema = file_chunks_schema(768);
    assert!(schema.field_with_name("file_path").is_ok());
    assert!(schema.field_with_name("text").is_ok());
    assert!(schema.field_with_name("vector").is_ok());
  }

  #[test]
  fn subscriptions_schema_has_root_path() {
    let schema = subscriptions_schema();
    assert!(schema.field_with_name("id").is_ok());
    assert!(schema.field_with_name("root_path").is_ok());
  }

  #[test]
  fn edges_schema_has_kind_and_endpoints() {
    let schema = edges_schema();
    assert!(schema.field_with_name("kind").is_ok());
    assert!(schema.field_with_name("from_id").is_ok());
    assert!(schema.field_with_name("to_id").is_ok());
  }
}
