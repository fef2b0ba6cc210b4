pub mod chunker;
pub mod config;
pub mod error;
pub mod ids;
pub mod model;
pub mod rrf;
pub mod validation;

pub use chunker::{Chunk, ChunkParams, chunk_text};
pub use config::{
  ChunkingSettings, ConcurrencySettings, EmbeddingBackend, EmbeddingSettings, ExtractionSettings, RetrySettings,
  SubscriptionEnvConfig, VlSettings,
};
pub use error::{Error, Result};
pub use ids::{chunk_id, file_id, now_millis};
pub use model::{Edge, EdgeKind, FileChunkRecord, FileRecord, Subscription, SubscriptionStatus};
pub use rrf::{FusedItem, RankedItem, RrfConfig, fuse};
pub use validation::{
  SEARCH_RESULT_TYPES, ValidationError, ValidationResult, validate_debounce_ms, validate_ignore_patterns,
  validate_min_similarity, validate_root_path, validate_search_limit, validate_search_query, validate_type_filter,
};
