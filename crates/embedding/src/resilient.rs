// Resilient HTTP client wrapper with retries and backoff.
//
// Backoff is `base * 2^attempt` capped at 20s; base is 3s when the failure looks
// like a model-loading 503 (the backend is still warming up and needs longer
// between attempts), 1s otherwise.

use crate::{EmbeddingError, EmbeddingProvider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(20);
const MODEL_LOADING_BASE_SECS: f64 = 3.0;
const DEFAULT_BASE_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
  pub max_retries: u32,
  pub request_timeout: Duration,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: 3,
      request_timeout: Duration::from_secs(60),
    }
  }
}

impl RetryConfig {
  /// `base * 2^attempt`, capped at 20s. `model_loading` selects the 3s base used
  /// for 503s that mean "the backend is still loading the model" versus the 1s
  /// base used for everything else retryable.
  pub fn backoff_for_attempt(&self, attempt: u32, model_loading: bool) -> Duration {
    let base = if model_loading { MODEL_LOADING_BASE_SECS } else { DEFAULT_BASE_SECS };
    let secs = (base * 2f64.powi(attempt as i32)).min(MAX_BACKOFF.as_secs_f64());
    Duration::from_secs_f64(secs)
  }
}

/// Whether an error is a 503 "model is still loading" response.
fn is_model_loading(error: &EmbeddingError) -> bool {
  matches!(error, EmbeddingError::ProviderError(msg) if msg.contains("503") && msg.to_ascii_lowercase().contains("load"))
}

/// Retryable: connection-reset-ish errors, truncated payloads, model-loading
/// 503s, and generic fetch failures. Anything else (4xx validation errors, auth
/// failures) surfaces immediately.
pub fn is_retryable_error(error: &EmbeddingError) -> bool {
  match error {
    EmbeddingError::Network(_) => true,
    EmbeddingError::Timeout => true,
    EmbeddingError::ProviderError(msg) => {
      msg.contains("503")
        || msg.contains("502")
        || msg.contains("504")
        || msg.to_ascii_lowercase().contains("truncated")
        || msg.to_ascii_lowercase().contains("connection reset")
    }
    EmbeddingError::Request(e) => e.is_connect() || e.is_timeout(),
    EmbeddingError::NotAvailable => false,
  }
}

/// Wraps an embedding provider with the retry policy above.
pub struct ResilientProvider<P: EmbeddingProvider> {
  inner: P,
  config: RetryConfig,
}

impl<P: EmbeddingProvider> ResilientProvider<P> {
  pub fn new(provider: P) -> Self {
    Self {
      inner: provider,
      config: RetryConfig::default(),
    }
  }

  pub fn with_config(provider: P, config: RetryConfig) -> Self {
    Self { inner: provider, config }
  }

  async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let model_loading = last_error.as_ref().map(is_model_loading).unwrap_or(false);
        let backoff = self.config.backoff_for_attempt(attempt - 1, model_loading);
        debug!("retry attempt {} after {:?}", attempt, backoff);
        sleep(backoff).await;
      }

      match tokio::time::timeout(self.config.request_timeout, self.inner.embed(text)).await {
        Ok(Ok(result)) => return Ok(result),
        Ok(Err(e)) => {
          if is_retryable_error(&e) && attempt < self.config.max_retries {
            warn!("retryable embedding error on attempt {}: {}", attempt + 1, e);
            last_error = Some(e);
            continue;
          }
          return Err(e);
        }
        Err(_) => {
          warn!("embedding request timed out on attempt {}", attempt + 1);
          last_error = Some(EmbeddingError::Timeout);
          if attempt < self.config.max_retries {
            continue;
          }
        }
      }
    }

    Err(last_error.unwrap_or_else(|| EmbeddingError::ProviderError("max retries exceeded".to_string())))
  }
}

#[async_trait]
impl<P: EmbeddingProvider + Send + Sync> EmbeddingProvider for ResilientProvider<P> {
  fn name(&self) -> &str {
    self.inner.name()
  }

  fn model_id(&self) -> &str {
    self.inner.model_id()
  }

  fn dimensions(&self) -> usize {
    self.inner.dimensions()
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    self.embed_with_retry(text).await
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut results = Vec::with_capacity(texts.len());
    for text in texts {
      results.push(self.embed_with_retry(text).await?);
    }
    Ok(results)
  }

  async fn is_available(&self) -> bool {
    self.inner.is_available().await
  }
}

pub fn wrap_resilient<P: EmbeddingProvider>(provider: P) -> ResilientProvider<P> {
  ResilientProvider::new(provider)
}

pub fn wrap_resilient_arc<P>(provider: P) -> Arc<dyn EmbeddingProvider + Send + Sync>
where
  P: EmbeddingProvider + Send + Sync + 'static,
{
  Arc::new(ResilientProvider::new(provider))
}
