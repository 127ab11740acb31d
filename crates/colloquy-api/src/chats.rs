//! Handlers for `/chats` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/chats` | Body: [`CreateBody`]; AI chats also get a welcome placeholder |
//! | `GET`  | `/chats/:owner/:name` | 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use colloquy_core::{
  chat::{Chat, ChatKind},
  message::Message,
};
use serde::{Deserialize, Serialize};

use crate::{ApiState, ApiStore, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub owner: String,
  pub name:  String,
  pub kind:  ChatKind,
  pub user:  String,
  /// Model provider name; omitted means the server default.
  #[serde(default)]
  pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Created {
  pub chat:    Chat,
  /// Placeholder answering the store's welcome text, for AI chats.
  pub welcome: Option<Message>,
}

/// `POST /chats`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ApiStore,
{
  if body.owner.is_empty() || body.name.is_empty() {
    return Err(ApiError::BadRequest("owner and name are required".into()));
  }

  let existing = state
    .store
    .get_chat(&body.owner, &body.name)
    .await
    .map_err(ApiError::store)?;
  if existing.is_some() {
    return Err(ApiError::Conflict(format!("chat {}/{} already exists", body.owner, body.name)));
  }

  let chat = Chat {
    owner:      body.owner,
    name:       body.name,
    created_at: Utc::now(),
    kind:       body.kind,
    user:       body.user,
    model:      body.model,
  };
  state.store.add_chat(chat.clone()).await.map_err(ApiError::store)?;

  let welcome = match chat.kind {
    ChatKind::Ai => {
      let welcome = Message::welcome_placeholder(&chat.owner, &chat.name, &chat.user);
      state
        .store
        .add_message(welcome.clone())
        .await
        .map_err(ApiError::store)?;
      Some(welcome)
    }
    ChatKind::Single | ChatKind::Group => None,
  };

  tracing::debug!(owner = %chat.owner, name = %chat.name, kind = %chat.kind, "chat created");
  Ok((StatusCode::CREATED, Json(Created { chat, welcome })))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /chats/:owner/:name`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path((owner, name)): Path<(String, String)>,
) -> Result<Json<Chat>, ApiError>
where
  S: ApiStore,
{
  state
    .store
    .get_chat(&owner, &name)
    .await
    .map_err(ApiError::store)?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("chat {owner}/{name}")))
}
