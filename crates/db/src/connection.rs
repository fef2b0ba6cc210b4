use lancedb::{Connection, connect};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::schema::{DEFAULT_VECTOR_DIM, edges_schema, file_chunks_schema, files_schema, subscriptions_schema};

#[derive(Error, Debug)]
pub enum DbError {
  #[error("LanceDB error: {0}")]
  Lance(#[from] lancedb::Error),
  #[error("Arrow error: {0}")]
  Arrow(#[from] arrow::error::ArrowError),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Not found: {0}")]
  NotFound(String),
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("gave up after {attempts} attempts: {source}")]
  RetriesExhausted {
    attempts: u32,
    #[source]
    source: Box<DbError>,
  },
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Graph-backed store over files, file_chunks, and subscriptions for a single
/// indexing root.
pub struct GraphStore {
  pub root_path: PathBuf,
  pub path: PathBuf,
  pub connection: Connection,
  pub vector_dim: usize,
}

impl GraphStore {
  /// Open (creating if absent) the store for `root_path`, placing the LanceDB
  /// directory under `base_path` keyed by a hash of the root path.
  pub async fn open(root_path: &std::path::Path, base_path: &std::path::Path) -> Result<Self> {
    Self::open_with_dim(root_path, base_path, DEFAULT_VECTOR_DIM).await
  }

  pub async fn open_with_dim(root_path: &std::path::Path, base_path: &std::path::Path, vector_dim: usize) -> Result<Self> {
    let db_path = base_path.join(root_slug(root_path)).join("lancedb");
    Self::open_at_path(root_path.to_path_buf(), db_path, vector_dim).await
  }

  /// Open the store at an explicit LanceDB directory (used directly by tests).
  pub async fn open_at_path(root_path: PathBuf, db_path: PathBuf, vector_dim: usize) -> Result<Self> {
    if let Some(parent) = db_path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    info!("opening graph store at {:?}", db_path);
    let connection = connect(db_path.to_string_lossy().as_ref()).execute().await?;

    let store = Self {
      root_path,
      path: db_path,
      connection,
      vector_dim,
    };

    store.ensure_tables().await?;
    Ok(store)
  }

  /// Create the files/file_chunks/subscriptions tables if they don't exist yet.
  async fn ensure_tables(&self) -> Result<()> {
    let table_names = self.connection.table_names().execute().await?;

    if !table_names.contains(&"files".to_string()) {
      debug!("creating files table");
      self
        .connection
        .create_empty_table("files", files_schema(self.vector_dim))
        .execute()
        .await?;
    }

    if !table_names.contains(&"file_chunks".to_string()) {
      debug!("creating file_chunks table");
      self
        .connection
        .create_empty_table("file_chunks", file_chunks_schema(self.vector_dim))
        .execute()
        .await?;
    }

    if !table_names.contains(&"subscriptions".to_string()) {
      debug!("creating subscriptions table");
      self
        .connection
        .create_empty_table("subscriptions", subscriptions_schema())
        .execute()
        .await?;
    }

    if !table_names.contains(&"edges".to_string()) {
      debug!("creating edges table");
      self
        .connection
        .create_empty_table("edges", edges_schema())
        .execute()
        .await?;
    }

    Ok(())
  }

  pub async fn files_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("files").execute().await?)
  }

  pub async fn file_chunks_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("file_chunks").execute().await?)
  }

  pub async fn subscriptions_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("subscriptions").execute().await?)
  }

  pub async fn edges_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("edges").execute().await?)
  }

  /// Create the vector and full-text indices on `file_chunks` once the table
  /// has enough rows to make them worthwhile. LanceDB's ANN index needs a
  /// minimum row count to train against; building it over an empty or tiny
  /// table is wasted work, so this is threshold-gated rather than run at
  /// table-creation time. Safe to call repeatedly.
  pub async fn ensure_chunk_indices(&self, min_rows_for_index: usize) -> Result<bool> {
    let table = self.file_chunks_table().await?;
    let rows = table.count_rows(None).await?;
    if rows < min_rows_for_index {
      return Ok(false);
    }

    table.create_index(&["vector"], lancedb::index::Index::Auto).execute().await?;
    table
      .create_index(&["text"], lancedb::index::Index::FTS(Default::default()))
      .execute()
      .await?;
    Ok(true)
  }

  /// Same threshold-gated index build as `ensure_chunk_indices`, over `files`
  /// (vector column `vector`, full-text column `content`). Small/unchunked
  /// files keep their own embedding and content on the File row, so this table
  /// needs the same pair of indices for whole-file vector/FTS search.
  pub async fn ensure_file_indices(&self, min_rows_for_index: usize) -> Result<bool> {
    let table = self.files_table().await?;
    let rows = table.count_rows(None).await?;
    if rows < min_rows_for_index {
      return Ok(false);
    }

    table.create_index(&["vector"], lancedb::index::Index::Auto).execute().await?;
    table
      .create_index(&["content"], lancedb::index::Index::FTS(Default::default()))
      .execute()
      .await?;
    Ok(true)
  }
}

/// Short, filesystem-safe, deterministic slug for a subscription root so
/// distinct roots land in distinct LanceDB directories.
fn root_slug(root_path: &std::path::Path) -> String {
  let digest = Sha256::digest(root_path.to_string_lossy().as_bytes());
  hex::encode(&digest[..8])
}

/// Default base directory for graph stores.
///
/// Respects the following environment variables (in order of precedence):
/// 1. DATA_DIR - explicit data directory override
/// 2. XDG_DATA_HOME - standard XDG data home directory
/// 3. dirs::data_local_dir() - platform default
pub fn default_data_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("DATA_DIR") {
    return PathBuf::from(dir);
  }

  if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
    return PathBuf::from(xdg_data).join("graphdex");
  }

  dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("graphdex")
}

/// Default config directory, same precedence pattern as [`default_data_dir`].
pub fn default_config_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("CONFIG_DIR") {
    return PathBuf::from(dir);
  }

  if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
    return PathBuf::from(xdg_config).join("graphdex");
  }

  dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("graphdex")
}

/// Default cache directory, same precedence pattern as [`default_data_dir`].
pub fn default_cache_dir() -> PathBuf {
  if let Ok(xdg_cache) = std::env::var("XDG_CACHE_HOME") {
    return PathBuf::from(xdg_cache).join("graphdex");
  }

  dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")).join("graphdex")
}

/// Daemon listen port. Respects the PORT environment variable, defaults to 8642.
pub fn default_port() -> u16 {
  std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8642)
}
