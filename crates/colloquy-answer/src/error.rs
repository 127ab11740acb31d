//! Error types: [`Error`] for HTTP rejections, [`AnswerError`] for pipeline
//! failures delivered as a stream `error` event.

use std::time::Duration;

use axum::{
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use colloquy_core::BoxError;
use thiserror::Error;

/// A request rejected before any stream is opened.
#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized => {
        let mut res = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"colloquy\""),
        );
        res
      }
    }
  }
}

/// A terminal failure of the answer pipeline.
///
/// The `Display` text is what the client sees in the `error` event.
#[derive(Debug, Error)]
pub enum AnswerError {
  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  InvalidInput(String),

  #[error("{0}")]
  InvalidState(String),

  #[error("You have queried too many times, please wait for a while")]
  QuotaExceeded,

  #[error("store error: {0}")]
  Store(#[source] BoxError),

  #[error("knowledge retrieval failed: {0}")]
  Retrieval(#[source] BoxError),

  #[error("model backend failed: {0}")]
  Model(#[source] BoxError),

  /// The client went away; nothing more can be written.
  #[error("failed to write to the event stream")]
  StreamWrite,

  #[error("answer generation timed out after {0:?}")]
  Timeout(Duration),

  #[error("answer generation was cancelled")]
  Cancelled,

  #[error("failed to encode event: {0}")]
  Encode(#[from] axum::Error),
}

impl AnswerError {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

impl From<colloquy_core::Error> for AnswerError {
  fn from(e: colloquy_core::Error) -> Self {
    match e {
      colloquy_core::Error::ModelNotFound(name) => {
        Self::NotFound(format!("The model provider: {name} is not found"))
      }
      other => Self::InvalidInput(other.to_string()),
    }
  }
}
