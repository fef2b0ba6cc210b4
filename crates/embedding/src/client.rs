//! A generic OpenAI-compatible embedding client: configurable endpoint, request
//! path, model, and dimensions, supporting both the text and image request
//! shapes of the embeddings contract.

use crate::{EmbeddingError, EmbeddingProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
  client: reqwest::Client,
  endpoint: String,
  request_path: String,
  api_key: Option<String>,
  model: String,
  dimensions: usize,
  multimodal: bool,
}

impl HttpEmbeddingClient {
  pub fn new(endpoint: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
    Self {
      client: reqwest::Client::new(),
      endpoint: endpoint.into(),
      request_path: "/v1/embeddings".to_string(),
      api_key: None,
      model: model.into(),
      dimensions,
      multimodal: false,
    }
  }

  pub fn with_request_path(mut self, path: impl Into<String>) -> Self {
    self.request_path = path.into();
    self
  }

  pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
    self.api_key = Some(key.into());
    self
  }

  pub fn with_multimodal(mut self, multimodal: bool) -> Self {
    self.multimodal = multimodal;
    self
  }

  fn url(&self) -> String {
    format!("{}{}", self.endpoint.trim_end_matches('/'), self.request_path)
  }

  fn request(&self, request: &EmbeddingRequest) -> reqwest::RequestBuilder {
    let mut builder = self.client.post(self.url()).header("Content-Type", "application/json");
    if let Some(key) = &self.api_key {
      builder = builder.header("Authorization", format!("Bearer {}", key));
    }
    builder.json(request)
  }

  async fn send(&self, request: EmbeddingRequest<'_>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let response = self.request(&request).send().await?;

    if !response.status().is_success() {
      let status = response.status();
      let body = response.text().await.unwrap_or_default();
      warn!("embedding endpoint returned {}: {}", status, body);
      return Err(EmbeddingError::ProviderError(format!("{}: {}", status, body)));
    }

    let parsed: EmbeddingResponse = response.json().await?;
    if parsed.data.is_empty() {
      return Err(EmbeddingError::ProviderError("empty embedding response".to_string()));
    }
    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
  }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
  model: &'a str,
  input: EmbeddingInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
  Text(&'a str),
  Batch(Vec<&'a str>),
  Image([ImageInput<'a>; 1]),
}

#[derive(Debug, Serialize)]
struct ImageInput<'a> {
  #[serde(rename = "type")]
  kind: &'static str,
  image_url: ImageUrl<'a>,
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
  url: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
  data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
  embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
  fn name(&self) -> &str {
    "http"
  }

  fn model_id(&self) -> &str {
    &self.model
  }

  fn dimensions(&self) -> usize {
    self.dimensions
  }

  fn is_multimodal(&self) -> bool {
    self.multimodal
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    debug!("embedding text: {} chars", text.len());
    let request = EmbeddingRequest {
      model: &self.model,
      input: EmbeddingInput::Text(text),
    };
    self
      .send(request)
      .await?
      .into_iter()
      .next()
      .ok_or_else(|| EmbeddingError::ProviderError("no embedding in response".to_string()))
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if texts.is_empty() {
      return Ok(Vec::new());
    }
    debug!("embedding {} texts", texts.len());
    let request = EmbeddingRequest {
      model: &self.model,
      input: EmbeddingInput::Batch(texts.to_vec()),
    };
    self.send(request).await
  }

  async fn embed_image(&self, data_url: &str) -> Result<Vec<f32>, EmbeddingError> {
    if !self.multimodal {
      return Err(EmbeddingError::NotAvailable);
    }
    debug!("embedding image data url ({} bytes)", data_url.len());
    let request = EmbeddingRequest {
      model: &self.model,
      input: EmbeddingInput::Image([ImageInput {
        kind: "image_url",
        image_url: ImageUrl { url: data_url },
      }]),
    };
    self
      .send(request)
      .await?
      .into_iter()
      .next()
      .ok_or_else(|| EmbeddingError::ProviderError("no embedding in response".to_string()))
  }

  async fn is_available(&self) -> bool {
    self.client.get(&self.endpoint).send().await.map(|r| r.status().is_success()).unwrap_or(false)
  }
}
