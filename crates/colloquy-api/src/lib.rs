//! JSON REST API for Colloquy.
//!
//! Exposes an axum [`Router`] for chats, messages and knowledge, backed by
//! any store implementing [`ConversationStore`] and [`KnowledgeIndex`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", colloquy_api::api_router(store.clone(), embedder, "admin".into()))
//! ```

pub mod chats;
pub mod error;
pub mod knowledge;
pub mod messages;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use colloquy_core::{
  knowledge::{Embedder, KnowledgeIndex},
  store::ConversationStore,
};

pub use error::ApiError;

/// Storage the API serves from.
pub trait ApiStore: ConversationStore + KnowledgeIndex + 'static {}

impl<T> ApiStore for T where T: ConversationStore + KnowledgeIndex + 'static {}

/// State shared by the API handlers.
pub struct ApiState<S> {
  pub store:    Arc<S>,
  pub embedder: Arc<dyn Embedder>,
  /// Knowledge scope used when a request names none.
  pub scope:    String,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      embedder: self.embedder.clone(),
      scope:    self.scope.clone(),
    }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, embedder: Arc<dyn Embedder>, scope: String) -> Router<()>
where
  S: ApiStore,
{
  Router::new()
    // Chats
    .route("/chats", post(chats::create::<S>))
    .route("/chats/{owner}/{name}", get(chats::get_one::<S>))
    // Messages
    .route("/messages", post(messages::create::<S>))
    .route("/messages/{owner}/{name}", get(messages::get_one::<S>))
    // Knowledge
    .route("/knowledge", post(knowledge::create::<S>))
    .with_state(ApiState { store, embedder, scope })
}
