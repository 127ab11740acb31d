//! Provider error types for `colloquy-llm`.

use thiserror::Error;

/// Errors that can occur when talking to a model or embedding provider.
#[derive(Error, Debug)]
pub enum ProviderError {
  /// The provider answered with a non-success status.
  #[error("request failed: {0}")]
  RequestFailed(String),

  /// Authentication with the provider was rejected (HTTP 401/403).
  #[error("authentication failed: {0}")]
  AuthFailed(String),

  /// The provider returned a rate-limit response (HTTP 429).
  #[error("rate limited by provider: {0}")]
  RateLimited(String),

  /// The requested model does not exist on the provider.
  #[error("model not found: {0}")]
  ModelNotFound(String),

  /// The API key environment variable is named but unset.
  #[error("provider not configured: {0}")]
  NotConfigured(String),

  /// The provider returned a response that could not be parsed.
  #[error("invalid response: {0}")]
  InvalidResponse(String),

  /// The caller cancelled the request mid-stream.
  #[error("generation cancelled")]
  Cancelled,

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = ProviderError> = std::result::Result<T, E>;

/// Map a non-success HTTP response to the matching error variant.
pub(crate) async fn from_status(
  response: reqwest::Response,
  model: &str,
) -> ProviderError {
  let status = response.status();
  let body = response.text().await.unwrap_or_default();
  match status.as_u16() {
    401 | 403 => ProviderError::AuthFailed(body),
    404 => ProviderError::ModelNotFound(format!("model '{model}': {body}")),
    429 => ProviderError::RateLimited(body),
    _ => ProviderError::RequestFailed(format!("HTTP {status}: {body}")),
  }
}
