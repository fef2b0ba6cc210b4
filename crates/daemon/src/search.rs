//! Hybrid search: fuse a vector-KNN arm and a BM25 full-text arm with
//! Reciprocal Rank Fusion, with a fallback ladder when a stage errors out.
//!
//! Grounded on the same run-both-arms-concurrently, required-BM25/optional-
//! vector shape used elsewhere for hybrid retrieval: BM25 is the arm that
//! must succeed (it needs no embedding provider), vector is best-effort and
//! the whole pipeline degrades gracefully rather than failing a query.

use db::GraphStore;
use embedding::{EmbeddingError, EmbeddingProvider};
use graphdex_core::rrf::{RankedItem, RrfConfig, fuse};
use graphdex_core::{FileChunkRecord, FileRecord};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SearchError {
  #[error("embedding error: {0}")]
  Embedding(#[from] EmbeddingError),
  #[error("graph store error: {0}")]
  Db(#[from] db::DbError),
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
  pub query: String,
  pub type_filter: Vec<String>,
  pub limit: usize,
  pub min_similarity: f32,
  pub rrf: RrfConfig,
}

impl Default for SearchRequest {
  fn default() -> Self {
    Self {
      query: String::new(),
      type_filter: vec!["file".to_string()],
      limit: 10,
      min_similarity: 0.75,
      rrf: RrfConfig::default(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
  pub id: String,
  pub result_type: String,
  pub title: String,
  pub description: Option<String>,
  pub preview: String,
  pub score: f64,
  pub chunk_index: Option<u32>,
  pub chunks_matched: Option<u32>,
  pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
  pub results: Vec<SearchResult>,
  pub message: Option<String>,
}

/// One file's candidacy, accumulated across whole-file and chunk hits. The
/// representative chunk is whichever hit contributed the best score; if none
/// did, the candidate is a whole-file match.
#[derive(Debug, Clone)]
struct GroupedCandidate {
  file: FileRecord,
  max_score: f64,
  score_sum: f64,
  score_count: u32,
  chunk_match_count: u32,
  representative_chunk: Option<FileChunkRecord>,
}

impl GroupedCandidate {
  fn whole_file(file: FileRecord) -> Self {
    Self {
      file,
      max_score: 0.0,
      score_sum: 0.0,
      score_count: 0,
      chunk_match_count: 0,
      representative_chunk: None,
    }
  }

  fn record(&mut self, score: f64, chunk: Option<FileChunkRecord>) {
    self.score_sum += score;
    self.score_count += 1;
    if chunk.is_some() {
      self.chunk_match_count += 1;
    }
    if score > self.max_score {
      self.max_score = score;
      if chunk.is_some() {
        self.representative_chunk = chunk;
      }
    }
  }

  fn avg_score(&self) -> f64 {
    if self.score_count == 0 {
      0.0
    } else {
      self.score_sum / self.score_count as f64
    }
  }
}

pub struct HybridSearchService {
  store: Arc<GraphStore>,
  embedder: Option<Arc<dyn EmbeddingProvider + Send + Sync>>,
}

impl HybridSearchService {
  pub fn new(store: Arc<GraphStore>, embedder: Option<Arc<dyn EmbeddingProvider + Send + Sync>>) -> Self {
    Self { store, embedder }
  }

  pub async fn search(&self, request: SearchRequest) -> SearchResponse {
    if request.query.trim().is_empty() {
      return SearchResponse::default();
    }
    if let Err(e) = validate_request(&request) {
      return SearchResponse {
        results: Vec::new(),
        message: Some(e.to_string()),
      };
    }

    let types = expand_type_filter(&request.type_filter);

    let Some(embedder) = self.embedder.clone() else {
      return self.bm25_only(&request, &types).await;
    };

    match self.fused(&request, &types, &embedder).await {
      Ok(results) => SearchResponse { results, message: None },
      Err(e) => {
        warn!("hybrid search fusion failed, falling back to vector-only: {}", e);
        self.vector_only_or_bm25(&request, &types, &embedder).await
      }
    }
  }

  async fn vector_only_or_bm25(
    &self,
    request: &SearchRequest,
    types: &HashSet<String>,
    embedder: &Arc<dyn EmbeddingProvider + Send + Sync>,
  ) -> SearchResponse {
    match self.vector_arm(request, types, embedder).await {
      Ok(mut list) => {
        list.truncate(request.limit);
        SearchResponse {
          results: list.into_iter().map(|item| shape_result(item.payload, None)).collect(),
          message: None,
        }
      }
      Err(e) => {
        warn!("vector-only search failed, falling back to bm25-only: {}", e);
        self.bm25_only(request, types).await
      }
    }
  }

  async fn fused(
    &self,
    request: &SearchRequest,
    types: &HashSet<String>,
    embedder: &Arc<dyn EmbeddingProvider + Send + Sync>,
  ) -> Result<Vec<SearchResult>, SearchError> {
    let (vector_list, bm25_list) =
      tokio::try_join!(self.vector_arm(request, types, embedder), self.bm25_arm(request, types))?;

    let fused = fuse(&[vector_list, bm25_list], &request.rrf, request.limit);
    Ok(
      fused
        .into_iter()
        .map(|item| shape_result(item.payload, Some(item.score)))
        .collect(),
    )
  }

  async fn bm25_only(&self, request: &SearchRequest, types: &HashSet<String>) -> SearchResponse {
    match self.bm25_arm(request, types).await {
      Ok(list) => {
        let results = list
          .into_iter()
          .take(request.limit)
          .enumerate()
          .map(|(rank, item)| shape_result(item.payload, Some(1.0 / (1.0 + rank as f64))))
          .collect();
        SearchResponse { results, message: None }
      }
      Err(e) => {
        warn!("bm25-only search failed: {}", e);
        SearchResponse {
          results: Vec::new(),
          message: Some(format!("search temporarily unavailable: {e}")),
        }
      }
    }
  }

  async fn vector_arm(
    &self,
    request: &SearchRequest,
    types: &HashSet<String>,
    embedder: &Arc<dyn EmbeddingProvider + Send + Sync>,
  ) -> Result<Vec<RankedItem<GroupedCandidate>>, SearchError> {
    let query_vector = embedder.embed(&request.query).await?;
    let fetch_limit = request.limit * 2;
    let min_similarity = request.min_similarity as f64;
    let mut by_file: HashMap<String, GroupedCandidate> = HashMap::new();

    if types.contains("file") {
      for (file, distance) in self.store.search_files_by_vector(&query_vector, fetch_limit).await? {
        let similarity = distance_to_similarity(distance);
        if similarity < min_similarity {
          continue;
        }
        by_file
          .entry(file.id.clone())
          .or_insert_with(|| GroupedCandidate::whole_file(file))
          .record(similarity, None);
      }
    }

    if types.contains("file_chunk") {
      for (chunk, distance) in self.store.search_chunks_by_vector(&query_vector, fetch_limit, None).await? {
        let similarity = distance_to_similarity(distance);
        if similarity < min_similarity {
          continue;
        }
        let Some(file) = self.store.get_file(&chunk.file_id).await? else {
          continue;
        };
        by_file
          .entry(file.id.clone())
          .or_insert_with(|| GroupedCandidate::whole_file(file))
          .record(similarity, Some(chunk));
      }
    }

    let mut grouped: Vec<_> = by_file.into_values().collect();
    grouped.sort_by(|a, b| b.max_score.partial_cmp(&a.max_score).unwrap_or(std::cmp::Ordering::Equal));
    grouped.truncate(fetch_limit);

    Ok(
      grouped
        .into_iter()
        .map(|candidate| RankedItem {
          id: candidate.file.id.clone(),
          payload: candidate,
        })
        .collect(),
    )
  }

  async fn bm25_arm(
    &self,
    request: &SearchRequest,
    types: &HashSet<String>,
  ) -> Result<Vec<RankedItem<GroupedCandidate>>, SearchError> {
    let fetch_limit = request.limit * 2;
    let mut by_file: HashMap<String, GroupedCandidate> = HashMap::new();

    if types.contains("file") {
      for file in self.store.search_files_fulltext(&request.query, fetch_limit).await? {
        by_file.entry(file.id.clone()).or_insert_with(|| GroupedCandidate::whole_file(file));
      }
    }

    if types.contains("file_chunk") {
      for chunk in self.store.search_chunks_fulltext(&request.query, fetch_limit).await? {
        let Some(file) = self.store.get_file(&chunk.file_id).await? else {
          continue;
        };
        let candidate = by_file.entry(file.id.clone()).or_insert_with(|| GroupedCandidate::whole_file(file));
        candidate.chunk_match_count += 1;
        candidate.representative_chunk.get_or_insert(chunk);
      }
    }

    Ok(
      by_file
        .into_values()
        .take(fetch_limit)
        .map(|candidate| RankedItem {
          id: candidate.file.id.clone(),
          payload: candidate,
        })
        .collect(),
    )
  }
}

fn validate_request(request: &SearchRequest) -> Result<(), graphdex_core::ValidationError> {
  graphdex_core::validate_search_query(&request.query)?;
  graphdex_core::validate_search_limit(request.limit)?;
  graphdex_core::validate_min_similarity(request.min_similarity)?;
  graphdex_core::validate_type_filter(&request.type_filter)?;
  Ok(())
}

fn distance_to_similarity(distance: f32) -> f64 {
  1.0 / (1.0 + distance as f64)
}

fn expand_type_filter(requested: &[String]) -> HashSet<String> {
  let mut types: HashSet<String> = requested.iter().cloned().collect();
  if types.contains("file") {
    types.insert("file_chunk".to_string());
  }
  types
}

fn shape_result(candidate: GroupedCandidate, score: Option<f64>) -> SearchResult {
  let is_chunk_hit = candidate.representative_chunk.is_some();
  let preview_source = candidate
    .representative_chunk
    .as_ref()
    .map(|c| c.text.as_str())
    .or(candidate.file.content.as_deref())
    .unwrap_or_default();

  SearchResult {
    id: candidate.file.id.clone(),
    result_type: if is_chunk_hit {
      "file_chunk".to_string()
    } else {
      "file".to_string()
    },
    title: candidate.file.display_name.clone(),
    description: candidate.file.content.clone().filter(|_| !is_chunk_hit),
    preview: truncate_preview(preview_source, 200),
    score: score.unwrap_or_else(|| candidate.avg_score()),
    chunk_index: candidate.representative_chunk.as_ref().map(|c| c.chunk_index),
    chunks_matched: is_chunk_hit.then_some(candidate.chunk_match_count),
    path: candidate.file.path.clone(),
  }
}

fn truncate_preview(text: &str, max_chars: usize) -> String {
  if text.chars().count() <= max_chars {
    text.to_string()
  } else {
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}…")
  }
}
