//! [`OpenAiEmbedder`] — `POST {base_url}/embeddings`.

use async_trait::async_trait;
use colloquy_core::{BoxError, knowledge::Embedder};
use tracing::debug;

use crate::{
  config::ProviderConfig,
  error::{ProviderError, Result, from_status},
  types::{EmbeddingRequest, EmbeddingResponse},
};

pub struct OpenAiEmbedder {
  config: ProviderConfig,
  http:   reqwest::Client,
}

impl OpenAiEmbedder {
  pub fn new(config: ProviderConfig) -> Result<Self> {
    let http = config.http_client()?;
    Ok(Self { config, http })
  }

  async fn request(&self, text: &str) -> Result<Vec<f32>> {
    let mut req = self.http.post(self.config.endpoint("embeddings"));
    if let Some(key) = self.config.resolve_api_key()? {
      req = req.bearer_auth(key);
    }

    debug!(provider = %self.config.name, chars = text.len(), "requesting embedding");
    let response = req
      .json(&EmbeddingRequest { model: &self.config.model, input: text })
      .send()
      .await?;
    if !response.status().is_success() {
      return Err(from_status(response, &self.config.model).await);
    }

    let body: EmbeddingResponse = response.json().await?;
    body
      .data
      .into_iter()
      .next()
      .map(|d| d.embedding)
      .ok_or_else(|| ProviderError::InvalidResponse("embedding response had no data".into()))
  }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
  fn name(&self) -> &str { &self.config.name }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, BoxError> {
    Ok(self.request(text).await?)
  }
}
