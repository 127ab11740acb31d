//! Provider configuration.

use serde::Deserialize;

use crate::{ProviderError, Result};

/// Connection settings for one OpenAI-compatible endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
  /// Name the provider is registered under (chats bind models by this name).
  pub name:         String,
  /// Base URL of the API, e.g. `https://api.openai.com/v1`.
  pub base_url:     String,
  /// Model identifier sent with every request.
  pub model:        String,
  /// Environment variable holding the API key.
  #[serde(default)]
  pub api_key_env:  Option<String>,
  /// Inline API key; takes precedence over `api_key_env`.
  #[serde(default)]
  pub api_key:      Option<String>,
  #[serde(default)]
  pub temperature:  Option<f32>,
  /// Connect timeout in seconds. Defaults to 30.
  #[serde(default)]
  pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
  /// Resolve the API key: inline key > environment variable > none.
  ///
  /// Local servers usually need no key, so a config naming neither is valid.
  /// Naming an environment variable that is unset is an error.
  pub fn resolve_api_key(&self) -> Result<Option<String>> {
    if let Some(key) = &self.api_key {
      return Ok(Some(key.clone()));
    }
    match &self.api_key_env {
      Some(var) => std::env::var(var)
        .map(Some)
        .map_err(|_| ProviderError::NotConfigured(format!("set the {var} env var"))),
      None => Ok(None),
    }
  }

  pub(crate) fn endpoint(&self, path: &str) -> String {
    format!("{}/{path}", self.base_url.trim_end_matches('/'))
  }

  pub(crate) fn http_client(&self) -> Result<reqwest::Client> {
    let connect = std::time::Duration::from_secs(self.timeout_secs.unwrap_or(30));
    Ok(reqwest::Client::builder().connect_timeout(connect).build()?)
  }
}
