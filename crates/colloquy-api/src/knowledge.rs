//! Handler for `POST /knowledge`: embed a passage and index it.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use colloquy_core::knowledge::NewKnowledge;
use serde::Deserialize;

use crate::{ApiState, ApiStore, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub text:  String,
  /// Defaults to the server's owner scope.
  #[serde(default)]
  pub scope: Option<String>,
}

/// `POST /knowledge`, body: `{"text":"..."}`; returns 201 + the passage.
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ApiStore,
{
  if body.text.trim().is_empty() {
    return Err(ApiError::BadRequest("text must not be empty".into()));
  }

  let embedding = state
    .embedder
    .embed(&body.text)
    .await
    .map_err(ApiError::Embedding)?;

  let knowledge = state
    .store
    .add_knowledge(NewKnowledge {
      scope: body.scope.unwrap_or_else(|| state.scope.clone()),
      text: body.text,
      embedding,
    })
    .await
    .map_err(ApiError::store)?;

  tracing::debug!(id = %knowledge.id, embedder = state.embedder.name(), "knowledge indexed");
  Ok((StatusCode::CREATED, Json(knowledge)))
}
