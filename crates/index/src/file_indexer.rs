//! The per-file indexing pipeline: dispatch on format, classify, chunk,
//! embed, and upsert File/FileChunk records idempotently. Composes
//! `extract`, `embedding`, and `db` the way `watch_manager` composes
//! `scanner`/`fs_watch` one layer up.

use extract::{ImageBudget, classify, extract_document, prepare_image};
use graphdex_core::{Edge, EdgeKind, FileChunkRecord, FileRecord, chunk_id, chunk_text, file_id, now_millis, ChunkParams};
use db::{DbError, GraphStore};
use embedding::{EmbeddingError, EmbeddingProvider, VlClient};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::parser::detect_language;

const PARTIAL_WRITE_BACKOFFS: [Duration; 3] = [Duration::from_secs(2), Duration::from_secs(4), Duration::from_secs(8)];
const GRAPH_RETRY_ATTEMPTS: u32 = 3;
const VISION_DESCRIBE_PROMPT: &str =
  "Describe this image's visible content in plain prose, for use as search-index text.";

#[derive(Debug, Error)]
pub enum FileIndexError {
  #[error("skip: {0}")]
  Skip(String),
  #[error("extraction error: {0}")]
  Extract(#[from] extract::ExtractError),
  #[error("image prep error: {0}")]
  ImagePrep(#[from] extract::ImagePrepError),
  #[error("vision error: {0}")]
  Vision(#[from] embedding::VisionError),
  #[error("embedding error: {0}")]
  Embedding(#[from] EmbeddingError),
  #[error("graph store error: {0}")]
  Db(#[from] DbError),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("all {0} chunks failed to embed")]
  NoSuccessfulChunks(usize),
}

impl FileIndexError {
  /// Partial-write errors (truncated content, the host still writing) are
  /// retried; binary/unsupported/empty-extraction results are a permanent
  /// skip, not retried.
  fn is_partial_write(&self) -> bool {
    match self {
      FileIndexError::Extract(e) => {
        let msg = e.to_string().to_ascii_lowercase();
        msg.contains("empty") || msg.contains("truncated")
      }
      FileIndexError::Io(e) => matches!(e.kind(), std::io::ErrorKind::WouldBlock)
        || matches!(e.raw_os_error(), Some(11) | Some(16)), // EAGAIN, EBUSY
      _ => false,
    }
  }
}

#[derive(Debug, Clone)]
pub struct FileIndexOutcome {
  pub file_id: String,
  pub relative_path: String,
  pub size_bytes: u64,
  pub chunks_created: u32,
  pub skipped: bool,
}

#[derive(Debug, Clone)]
pub struct FileIndexerConfig {
  pub subscription_id: Option<String>,
  pub generate_embeddings: bool,
  pub chunk_params: ChunkParams,
}

impl Default for FileIndexerConfig {
  fn default() -> Self {
    Self {
      subscription_id: None,
      generate_embeddings: true,
      chunk_params: ChunkParams::default(),
    }
  }
}

enum Extracted {
  Text(String),
  /// Already-embedded image content; `description` is kept as searchable
  /// text when the vision model produced one.
  Image { vector: Vec<f32>, description: Option<String> },
}

pub struct FileIndexer {
  store: Arc<GraphStore>,
  embedder: Arc<dyn EmbeddingProvider + Send + Sync>,
  vl_client: Option<Arc<VlClient>>,
  config: FileIndexerConfig,
}

impl FileIndexer {
  pub fn new(
    store: Arc<GraphStore>,
    embedder: Arc<dyn EmbeddingProvider + Send + Sync>,
    vl_client: Option<Arc<VlClient>>,
    config: FileIndexerConfig,
  ) -> Self {
    Self {
      store,
      embedder,
      vl_client,
      config,
    }
  }

  /// Index a single file, `path` absolute and `relative_path` relative to
  /// the subscription root.
  pub async fn index_file(&self, path: &Path, relative_path: &str) -> Result<FileIndexOutcome, FileIndexError> {
    let language = detect_language(path);
    let metadata = tokio::fs::metadata(path).await?;
    let size_bytes = metadata.len();
    let mtime = metadata
      .modified()
      .ok()
      .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
      .map(|d| d.as_millis() as i64)
      .unwrap_or(0);

    let id = file_id(&path.to_string_lossy());

    if self.config.generate_embeddings
      && let Some(existing) = self.store.get_file_by_path(&path.to_string_lossy()).await?
      && existing.has_chunks
    {
      if existing.mtime >= mtime {
        return Ok(FileIndexOutcome {
          file_id: existing.id,
          relative_path: relative_path.to_string(),
          size_bytes,
          chunks_created: 0,
          skipped: true,
        });
      }
      self.store.delete_chunks_for_file_id(&existing.id).await?;
      self.store.delete_edges_from(&existing.id, EdgeKind::HasChunk).await?;
    }

    let extracted = self.extract_with_retry(path, &language).await?;

    let display_name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| relative_path.to_string());
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default();
    let dir = Path::new(relative_path)
      .parent()
      .map(|p| p.to_string_lossy().into_owned())
      .filter(|p| !p.is_empty())
      .unwrap_or_else(|| ".".to_string());
    let preface = format!("This is a {language} file named {display_name} located at {relative_path} in the {dir} directory.");

    let outcome = match extracted {
      Extracted::Image { vector, description } => {
        self
          .store_whole_file(
            &id,
            path,
            relative_path,
            &display_name,
            &extension,
            &language,
            size_bytes,
            mtime,
            description,
            Some(vector),
          )
          .await?
      }
      Extracted::Text(text) => {
        if !self.config.generate_embeddings {
          self
            .store_whole_file(
              &id,
              path,
              relative_path,
              &display_name,
              &extension,
              &language,
              size_bytes,
              mtime,
              Some(text),
              None,
            )
            .await?
        } else if text.len() <= self.config.chunk_params.chunk_size {
          let embed_input = format!("{preface}\n\n{text}");
          let vector = self.embedder.embed(&embed_input).await?;
          self
            .store_whole_file(
              &id,
              path,
              relative_path,
              &display_name,
              &extension,
              &language,
              size_bytes,
              mtime,
              Some(text),
              Some(vector),
            )
            .await?
        } else {
          self
            .store_chunked_file(
              &id,
              path,
              relative_path,
              &display_name,
              &extension,
              &language,
              size_bytes,
              mtime,
              &text,
              &preface,
            )
            .await?
        }
      }
    };

    Ok(outcome)
  }

  async fn extract_with_retry(&self, path: &Path, language: &str) -> Result<Extracted, FileIndexError> {
    let mut attempt = 0usize;
    loop {
      match self.extract_once(path, language).await {
        Ok(extracted) => return Ok(extracted),
        Err(err) if err.is_partial_write() && attempt < PARTIAL_WRITE_BACKOFFS.len() => {
          warn!(path = %path.display(), attempt, "partial write, retrying: {}", err);
          tokio::time::sleep(PARTIAL_WRITE_BACKOFFS[attempt]).await;
          attempt += 1;
        }
        Err(err) => return Err(err),
      }
    }
  }

  async fn extract_once(&self, path: &Path, language: &str) -> Result<Extracted, FileIndexError> {
    let bytes = tokio::fs::read(path).await?;

    if language == "image" {
      let prepared = prepare_image(&bytes, ImageBudget::default())?;
      let data_url = format!("data:{};base64,{}", prepared.mime, prepared.base64);

      if self.embedder.is_multimodal() {
        let vector = self.embedder.embed_image(&data_url).await?;
        return Ok(Extracted::Image { vector, description: None });
      }

      if let Some(vl) = &self.vl_client {
        let description = vl.describe(VISION_DESCRIBE_PROMPT, &data_url).await?;
        let vector = self.embedder.embed(&description).await?;
        return Ok(Extracted::Image {
          vector,
          description: Some(description),
        });
      }

      return Err(FileIndexError::Skip(format!("no multimodal path configured for {}", path.display())));
    }

    if language == "pdf" || language == "docx" {
      let path_str = path.to_string_lossy();
      let text = extract_document(&path_str, &bytes)?;
      return Ok(Extracted::Text(text));
    }

    match classify(&bytes) {
      extract::Classification::Binary => Err(FileIndexError::Skip(format!("binary content at {}", path.display()))),
      extract::Classification::Text => Ok(Extracted::Text(String::from_utf8_lossy(&bytes).into_owned())),
    }
  }

  #[allow(clippy::too_many_arguments)]
  async fn store_whole_file(
    &self,
    id: &str,
    path: &Path,
    relative_path: &str,
    display_name: &str,
    extension: &str,
    language: &str,
    size_bytes: u64,
    mtime: i64,
    content: Option<String>,
    vector: Option<Vec<f32>>,
  ) -> Result<FileIndexOutcome, FileIndexError> {
    let record = FileRecord {
      id: id.to_string(),
      path: path.to_string_lossy().into_owned(),
      subscription_id: self.config.subscription_id.clone(),
      display_name: display_name.to_string(),
      extension: extension.to_string(),
      language: language.to_string(),
      size_bytes,
      line_count: content.as_deref().map(count_lines).unwrap_or(0),
      mtime,
      indexed_at: now_millis(),
      has_chunks: false,
      content,
      embedding: vector.clone(),
      embedding_model: vector.as_ref().map(|_| self.embedder.model_id().to_string()),
      extra: Default::default(),
    };

    self.upsert_file_with_retry(&record, vector.as_deref()).await?;
    self.wire_watch_edges(id).await?;

    Ok(FileIndexOutcome {
      file_id: id.to_string(),
      relative_path: relative_path.to_string(),
      size_bytes,
      chunks_created: 0,
      skipped: false,
    })
  }

  #[allow(clippy::too_many_arguments)]
  async fn store_chunked_file(
    &self,
    id: &str,
    path: &Path,
    relative_path: &str,
    display_name: &str,
    extension: &str,
    language: &str,
    size_bytes: u64,
    mtime: i64,
    text: &str,
    preface: &str,
  ) -> Result<FileIndexOutcome, FileIndexError> {
    let chunks = chunk_text(text, self.config.chunk_params);
    let total_chunks = chunks.len() as u32;

    // Embed every chunk before touching the graph store: `has_chunks: true` on the
    // File record is a promise that the chunk set behind it is complete, so the
    // File row must not exist until we know at least one chunk made it in.
    let mut embedded = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
      let embed_input = format!("{preface}\n\n{}", chunk.text);
      match self.embedder.embed(&embed_input).await {
        Ok(vector) => embedded.push((chunk, vector)),
        Err(e) => {
          warn!(path = %path.display(), chunk = chunk.index, "chunk embedding failed, skipping: {}", e);
        }
      }
    }

    if total_chunks > 0 && embedded.is_empty() {
      return Err(FileIndexError::NoSuccessfulChunks(total_chunks as usize));
    }

    let record = FileRecord {
      id: id.to_string(),
      path: path.to_string_lossy().into_owned(),
      subscription_id: self.config.subscription_id.clone(),
      display_name: display_name.to_string(),
      extension: extension.to_string(),
      language: language.to_string(),
      size_bytes,
      line_count: count_lines(text),
      mtime,
      indexed_at: now_millis(),
      has_chunks: true,
      content: None,
      embedding: None,
      embedding_model: None,
      extra: Default::default(),
    };

    self.upsert_file_with_retry(&record, None).await?;
    self.wire_watch_edges(id).await?;

    let mut created = 0u32;
    for (chunk, vector) in embedded {
      let record = FileChunkRecord {
        id: chunk_id(relative_path, chunk.index, &chunk.text),
        file_id: id.to_string(),
        file_path: path.to_string_lossy().into_owned(),
        chunk_index: chunk.index,
        total_chunks,
        text: chunk.text.clone(),
        start_offset: chunk.start_offset as u32,
        end_offset: chunk.end_offset as u32,
        embedding: vector,
        embedding_dimensions: self.embedder.dimensions() as u32,
        embedding_model: self.embedder.model_id().to_string(),
        has_prev: chunk.has_prev,
        has_next: chunk.has_next,
      };

      db::with_retry(GRAPH_RETRY_ATTEMPTS, || {
        let store = &self.store;
        let record = &record;
        async move { store.add_chunk(record).await }
      })
      .await?;

      self
        .store
        .add_edge(&Edge {
          kind: EdgeKind::HasChunk,
          from_id: id.to_string(),
          to_id: record.id.clone(),
          index: Some(chunk.index),
        })
        .await?;

      created += 1;
    }

    Ok(FileIndexOutcome {
      file_id: id.to_string(),
      relative_path: relative_path.to_string(),
      size_bytes,
      chunks_created: created,
      skipped: false,
    })
  }

  async fn upsert_file_with_retry(&self, record: &FileRecord, vector: Option<&[f32]>) -> Result<(), FileIndexError> {
    db::with_retry(GRAPH_RETRY_ATTEMPTS, || {
      let store = &self.store;
      async move { store.upsert_file(record, vector).await }
    })
    .await?;
    Ok(())
  }

  async fn wire_watch_edges(&self, file_id: &str) -> Result<(), FileIndexError> {
    let Some(subscription_id) = &self.config.subscription_id else {
      return Ok(());
    };

    self
      .store
      .add_edge(&Edge {
        kind: EdgeKind::Watches,
        from_id: subscription_id.clone(),
        to_id: file_id.to_string(),
        index: None,
      })
      .await?;
    self
      .store
      .add_edge(&Edge {
        kind: EdgeKind::WatchedBy,
        from_id: file_id.to_string(),
        to_id: subscription_id.clone(),
        index: None,
      })
      .await?;
    Ok(())
  }
}

fn count_lines(text: &str) -> u32 {
  if text.is_empty() {
    0
  } else {
    text.lines().count() as u32
  }
}
