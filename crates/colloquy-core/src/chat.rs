//! Chat — the thread that groups messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The kind of conversation a chat holds. Only [`ChatKind::Ai`] chats are
/// answered by the assistant.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum ChatKind {
  #[serde(rename = "AI")]
  #[strum(serialize = "AI")]
  Ai,
  Single,
  Group,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
  pub owner:      String,
  pub name:       String,
  pub created_at: DateTime<Utc>,
  pub kind:       ChatKind,
  /// The user who opened the chat.
  pub user:       String,
  /// Name of the model backend bound to this chat; `None` uses the default.
  pub model:      Option<String>,
}
