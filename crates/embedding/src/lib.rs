pub mod client;
pub mod factory;
pub mod ollama;
pub mod provider;
pub mod resilient;
pub mod vision;

pub use client::HttpEmbeddingClient;
pub use factory::{build_provider, build_provider_with_retries};
pub use ollama::{OllamaHealthStatus, OllamaProvider};
pub use provider::{EmbeddingError, EmbeddingProvider};
pub use resilient::{ResilientProvider, RetryConfig, is_retryable_error, wrap_resilient, wrap_resilient_arc};
pub use vision::{VisionError, VlClient};
