//! [`OpenAiBackend`] — streaming `POST {base_url}/chat/completions`.

use async_trait::async_trait;
use colloquy_core::{
  BoxError,
  model::{ModelBackend, Prompt},
};
use futures_util::StreamExt as _;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
  config::ProviderConfig,
  error::{ProviderError, Result, from_status},
  prompt::build_messages,
  sse::{SseItem, parse_sse_line},
  types::ChatRequest,
};

/// A model backend for any OpenAI-compatible chat completion endpoint.
pub struct OpenAiBackend {
  config: ProviderConfig,
  http:   reqwest::Client,
}

/// Whether to keep reading the completion stream.
enum Flow {
  Continue,
  Stop,
}

impl OpenAiBackend {
  pub fn new(config: ProviderConfig) -> Result<Self> {
    let http = config.http_client()?;
    Ok(Self { config, http })
  }

  pub fn config(&self) -> &ProviderConfig { &self.config }

  async fn stream(
    &self,
    prompt: &Prompt,
    fragments: &mpsc::Sender<String>,
    cancel: &CancellationToken,
  ) -> Result<()> {
    let request = ChatRequest {
      model:       self.config.model.clone(),
      messages:    build_messages(prompt),
      stream:      true,
      temperature: self.config.temperature,
    };

    debug!(
      provider = %self.config.name,
      model = %request.model,
      messages = request.messages.len(),
      "sending streaming chat completion request"
    );

    let mut req = self
      .http
      .post(self.config.endpoint("chat/completions"))
      .header("Accept", "text/event-stream");
    if let Some(key) = self.config.resolve_api_key()? {
      req = req.bearer_auth(key);
    }

    let response = req.json(&request).send().await?;
    if !response.status().is_success() {
      return Err(from_status(response, &self.config.model).await);
    }

    let mut byte_stream = response.bytes_stream();
    // Raw bytes: a multi-byte character may straddle two chunks.
    let mut buffer: Vec<u8> = Vec::new();

    loop {
      let next = tokio::select! {
        next = byte_stream.next() => next,
        _ = cancel.cancelled() => {
          debug!(provider = %self.config.name, "generation cancelled");
          return Err(ProviderError::Cancelled);
        }
      };
      let Some(chunk) = next else { break };
      let bytes = chunk
        .map_err(|e| ProviderError::RequestFailed(format!("stream read error: {e}")))?;
      buffer.extend_from_slice(&bytes);

      while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=newline).collect();
        if let Flow::Stop = self.forward_line(&String::from_utf8_lossy(&line), fragments).await {
          return Ok(());
        }
      }
    }

    let rest = String::from_utf8_lossy(&buffer);
    if !rest.trim().is_empty() {
      self.forward_line(&rest, fragments).await;
    }

    debug!(provider = %self.config.name, "streaming complete");
    Ok(())
  }

  async fn forward_line(&self, line: &str, fragments: &mpsc::Sender<String>) -> Flow {
    let items = match parse_sse_line(line) {
      Ok(items) => items,
      Err(e) => {
        warn!(provider = %self.config.name, error = %e, "SSE parse error, skipping line");
        return Flow::Continue;
      }
    };

    for item in items {
      match item {
        SseItem::Done => return Flow::Stop,
        SseItem::Text(text) => {
          trace!(provider = %self.config.name, fragment = %text, "streaming fragment");
          if fragments.send(text).await.is_err() {
            debug!(provider = %self.config.name, "fragment receiver dropped, stopping");
            return Flow::Stop;
          }
        }
      }
    }
    Flow::Continue
  }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
  fn name(&self) -> &str { &self.config.name }

  async fn generate(
    &self,
    prompt: &Prompt,
    fragments: mpsc::Sender<String>,
    cancel: CancellationToken,
  ) -> Result<(), BoxError> {
    Ok(self.stream(prompt, &fragments, &cancel).await?)
  }
}
