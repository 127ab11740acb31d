//! Streaming answer service for Colloquy.
//!
//! Exposes an axum [`Router`] that answers AI-chat messages as a server-sent
//! event stream, backed by any store implementing both [`ConversationStore`]
//! and [`KnowledgeIndex`].

pub mod auth;
pub mod cleaner;
pub mod context;
pub mod encoder;
pub mod error;
pub mod finalizer;
pub mod handlers;
pub mod orchestrator;
pub mod quota;

#[cfg(test)]
mod testing;

pub use error::{AnswerError, Error};
pub use orchestrator::{Pipeline, PipelineSettings, Stage};

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use colloquy_core::{
  config::StoreConfig,
  knowledge::KnowledgeIndex,
  store::ConversationStore,
};
use colloquy_llm::ProviderConfig;
use serde::Deserialize;

use auth::AuthConfig;

/// Storage the answer service runs on.
pub trait AnswerStore: ConversationStore + KnowledgeIndex + 'static {}

impl<T> AnswerStore for T where T: ConversationStore + KnowledgeIndex + 'static {}

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                    String,
  pub port:                    u16,
  pub store_path:              PathBuf,
  #[serde(default)]
  pub auth_username:           String,
  #[serde(default)]
  pub auth_password_hash:      String,
  #[serde(default = "default_owner_scope")]
  pub owner_scope:             String,
  #[serde(default)]
  pub cleaner:                 CleanerConfig,
  #[serde(default = "default_generation_timeout_secs")]
  pub generation_timeout_secs: u64,
  /// Seeded into the store when the owner scope has no store yet.
  #[serde(default)]
  pub default_store:           StoreConfig,
  pub default_model:           String,
  #[serde(default)]
  pub models:                  Vec<ProviderConfig>,
  pub embedding:               ProviderConfig,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CleanerConfig {
  pub window:       usize,
  pub stop_markers: Vec<String>,
}

impl Default for CleanerConfig {
  fn default() -> Self {
    Self {
      window:       cleaner::DEFAULT_WINDOW,
      stop_markers: vec!["</s>".to_owned()],
    }
  }
}

fn default_owner_scope() -> String { "admin".to_owned() }

fn default_generation_timeout_secs() -> u64 { 300 }

impl ServerConfig {
  pub fn pipeline_settings(&self) -> PipelineSettings {
    PipelineSettings {
      owner_scope:        self.owner_scope.clone(),
      cleaner_window:     self.cleaner.window,
      stop_markers:       self.cleaner.stop_markers.clone(),
      generation_timeout: Duration::from_secs(self.generation_timeout_secs),
    }
  }

  pub fn auth_config(&self) -> AuthConfig {
    AuthConfig {
      username:      self.auth_username.clone(),
      password_hash: self.auth_password_hash.clone(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the answer handlers.
pub struct AppState<S> {
  pub pipeline: Arc<Pipeline<S>>,
  pub auth:     Arc<AuthConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { pipeline: self.pipeline.clone(), auth: self.auth.clone() }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The answer stream route alone.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: AnswerStore,
{
  Router::new()
    .route("/messages/{owner}/{name}/answer", get(handlers::answer::handler::<S>))
    .with_state(state)
}

/// The whole HTTP surface: the JSON API and the answer stream, under `/api`.
pub fn app<S>(state: AppState<S>) -> Router
where
  S: AnswerStore,
{
  let pipeline = &state.pipeline;
  let api = colloquy_api::api_router(
    pipeline.store().clone(),
    pipeline.embedder().clone(),
    pipeline.settings().owner_scope.clone(),
  );
  Router::new().nest("/api", router(state).merge(api))
}

// ─── Integration tests ────────────────────────────────────────────────────────
