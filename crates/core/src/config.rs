//! Ambient configuration for subscriptions, with per-subscription overrides.
//!
//! Config priority: project-relative (`.graphdex/config.toml` under the
//! subscription root) > user (`~/.config/graphdex/config.toml`) > built-in defaults.
//! Every field is also overridable by an environment variable (see `apply_env`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Embedding configuration
// ============================================================================

/// Which wire protocol the embedding endpoint speaks. `Ollama` hits its native
/// `/api/embeddings` (one prompt per request); `Http` hits an OpenAI-compatible
/// `/v1/embeddings` (supports the batch and `image_url` request shapes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
  Ollama,
  Http,
}

impl Default for EmbeddingBackend {
  fn default() -> Self {
    Self::Ollama
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
  pub backend: EmbeddingBackend,
  /// Base URL of the embeddings endpoint.
  pub endpoint: String,
  /// Only used when `backend` is `Http`.
  pub request_path: String,
  /// API key, if the endpoint requires bearer auth. Falls back to `GRAPHDEX_EMBEDDING_API_KEY`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub api_key: Option<String>,
  pub model: String,
  pub dimensions: usize,
  /// Whether this model also accepts image inputs (used by VLClient fallback).
  /// Ignored when `backend` is `Ollama`, which has no image request shape.
  pub multimodal: bool,
}

impl Default for EmbeddingSettings {
  fn default() -> Self {
    Self {
      backend: EmbeddingBackend::Ollama,
      endpoint: "http://localhost:11434".to_string(),
      request_path: "/v1/embeddings".to_string(),
      api_key: None,
      model: "qwen3-embedding".to_string(),
      dimensions: 4096,
      multimodal: false,
    }
  }
}

// ============================================================================
// Vision-language configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VlSettings {
  pub endpoint: String,
  pub model: String,
  /// Request timeout in seconds (default 120, images are slow to caption).
  pub timeout_secs: u64,
}

impl Default for VlSettings {
  fn default() -> Self {
    Self {
      endpoint: "http://localhost:11434".to_string(),
      model: "qwen2.5-vl".to_string(),
      timeout_secs: 120,
    }
  }
}

// ============================================================================
// Chunking configuration
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
  pub chunk_size: usize,
  pub overlap: usize,
}

impl Default for ChunkingSettings {
  fn default() -> Self {
    Self {
      chunk_size: 768,
      overlap: 10,
    }
  }
}

// ============================================================================
// Retry configuration
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
  /// Max attempts for embedding/VL calls before surfacing an error.
  pub embedding_retries: u32,
  /// Max attempts for graph-store transient-error retries.
  pub graph_retries: u32,
}

impl Default for RetrySettings {
  fn default() -> Self {
    Self {
      embedding_retries: 3,
      graph_retries: 3,
    }
  }
}

// ============================================================================
// Concurrency configuration
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencySettings {
  pub scan_concurrency: usize,
  pub index_concurrency: usize,
  pub max_concurrent_subscriptions: usize,
  pub inter_call_delay_ms: u64,
}

impl Default for ConcurrencySettings {
  fn default() -> Self {
    Self {
      scan_concurrency: 50,
      index_concurrency: 3,
      max_concurrent_subscriptions: 1,
      inter_call_delay_ms: 0,
    }
  }
}

// ============================================================================
// Extraction configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
  /// Disable PDF text extraction (e.g. on hosts lacking the required instruction set).
  pub pdf_enabled: bool,
  /// Extra ignore patterns merged into PathMatcher's built-in defaults.
  pub extra_ignore_patterns: Vec<String>,
}

impl Default for ExtractionSettings {
  fn default() -> Self {
    Self {
      pdf_enabled: true,
      extra_ignore_patterns: Vec::new(),
    }
  }
}

// ============================================================================
// Top-level configuration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionEnvConfig {
  pub embedding: EmbeddingSettings,
  pub vl: VlSettings,
  pub chunking: ChunkingSettings,
  pub retry: RetrySettings,
  pub concurrency: ConcurrencySettings,
  pub extraction: ExtractionSettings,
}

impl SubscriptionEnvConfig {
  /// Load config for a subscription root, with fallback to the user config, falling
  /// back to built-in defaults. Environment variables are applied last and always win.
  pub fn load_for_subscription(root_path: &Path) -> Self {
    let mut config = Self::project_config_path(root_path)
      .filter(|p| p.exists())
      .and_then(|p| std::fs::read_to_string(p).ok())
      .and_then(|content| toml::from_str(&content).ok())
      .or_else(|| {
        Self::user_config_path()
          .filter(|p| p.exists())
          .and_then(|p| std::fs::read_to_string(p).ok())
          .and_then(|content| toml::from_str(&content).ok())
      })
      .unwrap_or_default();

    config.apply_env();
    config
  }

  /// Overlay `GRAPHDEX_*` environment variables onto an already-loaded config.
  pub fn apply_env(&mut self) {
    if let Ok(v) = std::env::var("GRAPHDEX_EMBEDDING_ENDPOINT") {
      self.embedding.endpoint = v;
    }
    if let Ok(v) = std::env::var("GRAPHDEX_EMBEDDING_MODEL") {
      self.embedding.model = v;
    }
    if let Ok(v) = std::env::var("GRAPHDEX_EMBEDDING_DIMENSIONS")
      && let Ok(n) = v.parse()
    {
      self.embedding.dimensions = n;
    }
    if let Ok(v) = std::env::var("GRAPHDEX_EMBEDDING_API_KEY") {
      self.embedding.api_key = Some(v);
    }
    if let Ok(v) = std::env::var("GRAPHDEX_EMBEDDING_BACKEND") {
      match v.to_ascii_lowercase().as_str() {
        "ollama" => self.embedding.backend = EmbeddingBackend::Ollama,
        "http" => self.embedding.backend = EmbeddingBackend::Http,
        _ => {}
      }
    }
    if let Ok(v) = std::env::var("GRAPHDEX_VL_ENDPOINT") {
      self.vl.endpoint = v;
    }
    if let Ok(v) = std::env::var("GRAPHDEX_VL_MODEL") {
      self.vl.model = v;
    }
    if let Ok(v) = std::env::var("GRAPHDEX_CHUNK_SIZE")
      && let Ok(n) = v.parse()
    {
      self.chunking.chunk_size = n;
    }
    if let Ok(v) = std::env::var("GRAPHDEX_CHUNK_OVERLAP")
      && let Ok(n) = v.parse()
    {
      self.chunking.overlap = n;
    }
    if let Ok(v) = std::env::var("GRAPHDEX_SCAN_CONCURRENCY")
      && let Ok(n) = v.parse()
    {
      self.concurrency.scan_concurrency = n;
    }
    if let Ok(v) = std::env::var("GRAPHDEX_INDEX_CONCURRENCY")
      && let Ok(n) = v.parse()
    {
      self.concurrency.index_concurrency = n;
    }
    if let Ok(v) = std::env::var("GRAPHDEX_PDF_ENABLED")
      && let Ok(b) = v.parse()
    {
      self.extraction.pdf_enabled = b;
    }
  }

  /// The project-relative config path, `.graphdex/config.toml` under the subscription root.
  pub fn project_config_path(root_path: &Path) -> Option<PathBuf> {
    Some(root_path.join(".graphdex").join("config.toml"))
  }

  /// The user-level config path.
  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("GRAPHDEX_CONFIG_DIR") {
      return Some(PathBuf::from(path).join("config.toml"));
    }
    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
      return Some(PathBuf::from(path).join("graphdex").join("config.toml"));
    }
    dirs::config_dir().map(|p: PathBuf| p.join("graphdex").join("config.toml"))
  }

  /// Whether embedding dimensions changed relative to what's stored in the graph store.
  pub fn needs_reembedding(&self, stored_dimensions: usize) -> bool {
    self.embedding.dimensions != stored_dimensions
  }
}
