//! VLClient: POSTs an OpenAI-compatible chat-completion payload with a user turn
//! carrying a prompt and an image data-URL, returning the assistant's text.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum VisionError {
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("vl endpoint returned {status}: {body}")]
  NonSuccess { status: u16, body: String },
  #[error("response carried no assistant message")]
  EmptyResponse,
}

#[derive(Debug, Clone)]
pub struct VlClient {
  client: reqwest::Client,
  endpoint: String,
  model: String,
  timeout: Duration,
}

impl VlClient {
  pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      endpoint: endpoint.into(),
      model: model.into(),
      timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Ask the vision-language model `prompt` about the image at `image_data_url`
  /// (a `data:<mime>;base64,<data>` URL), returning the assistant's reply text.
  pub async fn describe(&self, prompt: &str, image_data_url: &str) -> Result<String, VisionError> {
    let request = ChatRequest {
      model: &self.model,
      messages: vec![ChatMessage {
        role: "user",
        content: vec![
          Content::Text { text: prompt },
          Content::ImageUrl {
            image_url: ImageUrl { url: image_data_url },
          },
        ],
      }],
    };

    let response = self
      .client
      .post(format!("{}/v1/chat/completions", self.endpoint.trim_end_matches('/')))
      .timeout(self.timeout)
      .json(&request)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(VisionError::NonSuccess {
        status: status.as_u16(),
        body,
      });
    }

    let parsed: ChatResponse = response.json().await?;
    parsed
      .choices
      .into_iter()
      .next()
      .map(|c| c.message.content)
      .filter(|text| !text.trim().is_empty())
      .ok_or(VisionError::EmptyResponse)
  }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
  role: &'a str,
  content: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Content<'a> {
  Text { text: &'a str },
  ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
  url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
  message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
  content: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_timeout_is_120_seconds() {
    let client = VlClient::new("http://localhost:11434", "qwen2.5-vl");
    assert_eq!(client.timeout, Duration::from_secs(120));
  }

  #[test]
  fn with_timeout_overrides_default() {
    let client = VlClient::new("http://localhost:11434", "qwen2.5-vl").with_timeout(Duration::from_secs(30));
    assert_eq!(client.timeout, Duration::from_secs(30));
  }
}
