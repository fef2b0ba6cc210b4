//! Closed-set record types for the data model: Subscription, File, FileChunk, Edge.
//!
//! The source system models node properties as an untyped dictionary; here every
//! field is named and typed, with a single free-form `extra` map for anything a
//! caller wants to attach without a schema change.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
  Active,
  Indexing,
  Completed,
  Cancelled,
  Error,
}

/// A declared directory root with an indexing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
  pub id: String,
  pub root_path: String,
  pub recursive: bool,
  pub file_patterns: Vec<String>,
  pub ignore_patterns: Vec<String>,
  pub debounce_ms: u64,
  pub generate_embeddings: bool,
  pub status: SubscriptionStatus,
  pub files_indexed: u64,
  pub last_indexed_time: Option<i64>,
  pub error: Option<String>,
  #[serde(default)]
  pub extra: HashMap<String, serde_json::Value>,
}

impl Subscription {
  pub fn new(id: impl Into<String>, root_path: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      root_path: root_path.into(),
      recursive: true,
      file_patterns: Vec::new(),
      ignore_patterns: Vec::new(),
      debounce_ms: 2000,
      generate_embeddings: true,
      status: SubscriptionStatus::Active,
      files_indexed: 0,
      last_indexed_time: None,
      error: None,
      extra: HashMap::new(),
    }
  }
}

/// One File record per absolute path under a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
  pub id: String,
  pub path: String,
  pub subscription_id: Option<String>,
  pub display_name: String,
  pub extension: String,
  pub language: String,
  pub size_bytes: u64,
  pub line_count: u32,
  pub mtime: i64,
  pub indexed_at: i64,
  pub has_chunks: bool,
  /// Full text content, present iff `has_chunks` is false.
  pub content: Option<String>,
  /// Single embedding, present iff `has_chunks` is false and embeddings are enabled.
  pub embedding: Option<Vec<f32>>,
  pub embedding_model: Option<String>,
  #[serde(default)]
  pub extra: HashMap<String, serde_json::Value>,
}

/// One FileChunk per chunk of a chunked file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChunkRecord {
  pub id: String,
  pub file_id: String,
  pub file_path: String,
  pub chunk_index: u32,
  pub total_chunks: u32,
  pub text: String,
  pub start_offset: u32,
  pub end_offset: u32,
  pub embedding: Vec<f32>,
  pub embedding_dimensions: u32,
  pub embedding_model: String,
  pub has_prev: bool,
  pub has_next: bool,
}

/// Typed edge kinds between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
  HasChunk,
  Watches,
  WatchedBy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
  pub kind: EdgeKind,
  pub from_id: String,
  pub to_id: String,
  /// Edge property, e.g. chunk index for `HAS_CHUNK`.
  pub index: Option<u32>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn subscription_defaults() {
    let s = Subscription::new("s1", "/tmp/proj");
    assert_eq!(s.status, SubscriptionStatus::Active);
    assert!(s.generate_embeddings);
    assert_eq!(s.debounce_ms, 2000);
  }
}
