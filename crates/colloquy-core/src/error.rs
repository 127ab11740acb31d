//! Error types for `colloquy-core`.

use thiserror::Error;

/// Boxed error used at the seams where collaborators are trait objects.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid message id {0:?}: expected \"owner/name\"")]
  InvalidMessageId(String),

  #[error("unknown chat kind: {0:?}")]
  UnknownChatKind(String),

  #[error("model provider not found: {0}")]
  ModelNotFound(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
