//! Knowledge retrieval: passages, embedders and the nearest-neighbour index.

use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BoxError, message::VectorScore};

/// A knowledge passage, optionally scored against a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knowledge {
  pub id:    String,
  pub text:  String,
  /// Cosine similarity to the query; `0.0` outside of a search result.
  pub score: f32,
}

/// Provenance to attach to an answer built from `knowledge`.
pub fn vector_scores(knowledge: &[Knowledge]) -> Vec<VectorScore> {
  knowledge
    .iter()
    .map(|k| VectorScore { vector: k.id.clone(), score: k.score })
    .collect()
}

/// A passage to index, with its precomputed embedding.
#[derive(Debug, Clone)]
pub struct NewKnowledge {
  pub scope:     String,
  pub text:      String,
  pub embedding: Vec<f32>,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Turns text into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
  /// Provider name, for logs.
  fn name(&self) -> &str;

  async fn embed(&self, text: &str) -> Result<Vec<f32>, BoxError>;
}

/// Storage of embedded passages, searchable by similarity.
pub trait KnowledgeIndex: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a passage and return it with its assigned id.
  fn add_knowledge(
    &self,
    entry: NewKnowledge,
  ) -> impl Future<Output = Result<Knowledge, Self::Error>> + Send + '_;

  /// Up to `limit` passages of `scope`, most similar to `embedding` first.
  /// An empty result means the scope holds no vectors.
  fn nearest<'a>(
    &'a self,
    scope: &'a str,
    embedding: &'a [f32],
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Knowledge>, Self::Error>> + Send + 'a;
}

// ─── Retrieval ───────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RetrievalError {
  /// The scope holds no knowledge at all. Callers answering questions treat
  /// this as "no knowledge", not as a failure.
  #[error("no knowledge vectors found")]
  NoVectors,

  #[error("embedding failed: {0}")]
  Embedding(#[source] BoxError),

  #[error("knowledge index error: {0}")]
  Index(#[source] BoxError),
}

/// Embed `query` with `embedder` and return the nearest passages in `scope`.
pub async fn retrieve<I>(
  index: &I,
  embedder: &dyn Embedder,
  scope: &str,
  query: &str,
  limit: usize,
) -> Result<Vec<Knowledge>, RetrievalError>
where
  I: KnowledgeIndex,
{
  let embedding = embedder
    .embed(query)
    .await
    .map_err(RetrievalError::Embedding)?;

  let passages = index
    .nearest(scope, &embedding, limit)
    .await
    .map_err(|e| RetrievalError::Index(Box::new(e)))?;

  if passages.is_empty() {
    return Err(RetrievalError::NoVectors);
  }
  Ok(passages)
}
