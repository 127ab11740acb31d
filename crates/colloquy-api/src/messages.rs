//! Handlers for `/messages` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/messages` | Body: [`CreateBody`]; returns 201 + the question and its answer placeholder |
//! | `GET`  | `/messages/:owner/:name` | 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use colloquy_core::{
  chat::ChatKind,
  message::{AI_AUTHOR, Message, MessageId},
};
use serde::{Deserialize, Serialize};

use crate::{ApiState, ApiStore, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub owner: String,
  pub chat:  String,
  pub user:  String,
  pub text:  String,
}

#[derive(Debug, Serialize)]
pub struct Created {
  pub message: Message,
  /// The empty AI message to stream the answer into, for AI chats.
  pub answer:  Option<Message>,
}

/// `POST /messages`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ApiStore,
{
  if body.user.is_empty() || body.user == AI_AUTHOR {
    return Err(ApiError::BadRequest(format!("invalid user: {:?}", body.user)));
  }
  if body.text.trim().is_empty() {
    return Err(ApiError::BadRequest("text must not be empty".into()));
  }

  let chat = state
    .store
    .get_chat(&body.owner, &body.chat)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("chat {}/{}", body.owner, body.chat)))?;

  let message = Message::from_user(body.owner, body.chat, body.user, body.text);
  state
    .store
    .add_message(message.clone())
    .await
    .map_err(ApiError::store)?;

  let answer = if chat.kind == ChatKind::Ai {
    let placeholder = Message::answer_placeholder(&message);
    state
      .store
      .add_message(placeholder.clone())
      .await
      .map_err(ApiError::store)?;
    Some(placeholder)
  } else {
    None
  };

  Ok((StatusCode::CREATED, Json(Created { message, answer })))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /messages/:owner/:name`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path((owner, name)): Path<(String, String)>,
) -> Result<Json<Message>, ApiError>
where
  S: ApiStore,
{
  let id = MessageId::new(owner, name);
  state
    .store
    .get_message(&id)
    .await
    .map_err(ApiError::store)?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("message {id}")))
}
