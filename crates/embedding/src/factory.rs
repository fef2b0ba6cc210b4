//! Builds a resilient `EmbeddingProvider` from `EmbeddingSettings`, choosing the
//! wire protocol (`OllamaProvider` vs `HttpEmbeddingClient`) by `backend`.

use crate::{EmbeddingProvider, OllamaProvider, RetryConfig};
use graphdex_core::{EmbeddingBackend, EmbeddingSettings};
use std::sync::Arc;

pub fn build_provider(settings: &EmbeddingSettings) -> Arc<dyn EmbeddingProvider + Send + Sync> {
  build_provider_with_retries(settings, RetryConfig::default())
}

pub fn build_provider_with_retries(
  settings: &EmbeddingSettings,
  retry: RetryConfig,
) -> Arc<dyn EmbeddingProvider + Send + Sync> {
  match settings.backend {
    EmbeddingBackend::Ollama => {
      let provider = OllamaProvider::new()
        .with_url(settings.endpoint.clone())
        .with_model(settings.model.clone(), settings.dimensions);
      Arc::new(crate::ResilientProvider::with_config(provider, retry))
    }
    EmbeddingBackend::Http => {
      let mut client = crate::HttpEmbeddingClient::new(settings.endpoint.clone(), settings.model.clone(), settings.dimensions)
        .with_request_path(settings.request_path.clone())
        .with_multimodal(settings.multimodal);
      if let Some(key) = &settings.api_key {
        client = client.with_api_key(key.clone());
      }
      Arc::new(crate::ResilientProvider::with_config(client, retry))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ollama_backend_builds_ollama_provider() {
    let settings = EmbeddingSettings {
      backend: EmbeddingBackend::Ollama,
      ..Default::default()
    };
    let provider = build_provider(&settings);
    assert_eq!(provider.name(), "ollama");
    assert_eq!(provider.dimensions(), settings.dimensions);
  }

  #[test]
  fn http_backend_builds_http_client() {
    let settings = EmbeddingSettings {
      backend: EmbeddingBackend::Http,
      endpoint: "http://localhost:8080".to_string(),
      model: "custom".to_string(),
      dimensions: 768,
      ..Default::default()
    };
    let provider = build_provider(&settings);
    assert_eq!(provider.name(), "http");
    assert_eq!(provider.model_id(), "custom");
  }
}
