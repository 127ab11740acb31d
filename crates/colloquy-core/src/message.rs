//! Messages — single turns in a conversation.
//!
//! The wire and storage formats carry two sentinel strings: the author `"AI"`
//! and the reply target `"Welcome"`. Both are parsed into enums at the
//! boundary so the rest of the code never compares strings.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Author string that marks a message as generated by the assistant.
pub const AI_AUTHOR: &str = "AI";

/// Reply-target string that marks an answer to the store's welcome text.
pub const WELCOME_REPLY: &str = "Welcome";

// ─── Identity ────────────────────────────────────────────────────────────────

/// Identity of a message: its owner plus a name unique within that owner.
///
/// Rendered and parsed as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageId {
  pub owner: String,
  pub name:  String,
}

impl MessageId {
  pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
    Self { owner: owner.into(), name: name.into() }
  }

  /// A fresh id under `owner` with a random `message_<hex>` name.
  pub fn generate(owner: impl Into<String>) -> Self {
    Self::new(owner, format!("message_{}", Uuid::new_v4().simple()))
  }
}

impl fmt::Display for MessageId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.owner, self.name)
  }
}

impl FromStr for MessageId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.split_once('/') {
      Some((owner, name)) if !owner.is_empty() && !name.is_empty() => {
        Ok(Self::new(owner, name))
      }
      _ => Err(Error::InvalidMessageId(s.to_owned())),
    }
  }
}

impl TryFrom<String> for MessageId {
  type Error = Error;

  fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl From<MessageId> for String {
  fn from(id: MessageId) -> Self { id.to_string() }
}

// ─── Author ──────────────────────────────────────────────────────────────────

/// Who wrote a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Author {
  /// The assistant.
  Ai,
  /// A human, identified by user name.
  User(String),
}

impl Author {
  pub fn is_ai(&self) -> bool { matches!(self, Self::Ai) }

  pub fn as_str(&self) -> &str {
    match self {
      Self::Ai => AI_AUTHOR,
      Self::User(user) => user,
    }
  }
}

impl From<String> for Author {
  fn from(s: String) -> Self {
    if s == AI_AUTHOR { Self::Ai } else { Self::User(s) }
  }
}

impl From<Author> for String {
  fn from(author: Author) -> Self {
    match author {
      Author::Ai => AI_AUTHOR.to_owned(),
      Author::User(user) => user,
    }
  }
}

// ─── Reply target ────────────────────────────────────────────────────────────

/// What an AI message answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReplyTo {
  /// The store's welcome text, used to open a conversation.
  Welcome,
  /// A stored user message.
  Message(MessageId),
}

impl FromStr for ReplyTo {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s == WELCOME_REPLY {
      Ok(Self::Welcome)
    } else {
      s.parse().map(Self::Message)
    }
  }
}

impl TryFrom<String> for ReplyTo {
  type Error = Error;

  fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl fmt::Display for ReplyTo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Welcome => f.write_str(WELCOME_REPLY),
      Self::Message(id) => write!(f, "{id}"),
    }
  }
}

impl From<ReplyTo> for String {
  fn from(reply_to: ReplyTo) -> Self { reply_to.to_string() }
}

// ─── Provenance ──────────────────────────────────────────────────────────────

/// Similarity score of one knowledge passage used to produce an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorScore {
  /// Id of the knowledge passage.
  pub vector: String,
  pub score:  f32,
}

// ─── Message ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub id:            MessageId,
  pub created_at:    DateTime<Utc>,
  /// The human user the conversation belongs to.
  pub user:          String,
  /// Name of the parent chat (scoped by `id.owner`).
  pub chat:          String,
  pub author:        Author,
  pub reply_to:      Option<ReplyTo>,
  /// Empty while an AI answer is pending.
  pub text:          String,
  #[serde(default)]
  pub vector_scores: Vec<VectorScore>,
}

impl Message {
  /// A new user-authored message.
  pub fn from_user(
    owner: impl Into<String>,
    chat: impl Into<String>,
    user: impl Into<String>,
    text: impl Into<String>,
  ) -> Self {
    let user = user.into();
    Self {
      id:            MessageId::generate(owner),
      created_at:    Utc::now(),
      user:          user.clone(),
      chat:          chat.into(),
      author:        Author::User(user),
      reply_to:      None,
      text:          text.into(),
      vector_scores: Vec::new(),
    }
  }

  /// The empty AI message stored right after `question`, to be filled in by
  /// the answer stream. Created one millisecond later so it sorts after the
  /// question.
  pub fn answer_placeholder(question: &Message) -> Self {
    Self {
      id:            MessageId::generate(question.id.owner.clone()),
      created_at:    question.created_at + Duration::milliseconds(1),
      user:          question.user.clone(),
      chat:          question.chat.clone(),
      author:        Author::Ai,
      reply_to:      Some(ReplyTo::Message(question.id.clone())),
      text:          String::new(),
      vector_scores: Vec::new(),
    }
  }

  /// The empty AI message that opens a new chat by answering the store's
  /// welcome text.
  pub fn welcome_placeholder(
    owner: impl Into<String>,
    chat: impl Into<String>,
    user: impl Into<String>,
  ) -> Self {
    Self {
      id:            MessageId::generate(owner),
      created_at:    Utc::now(),
      user:          user.into(),
      chat:          chat.into(),
      author:        Author::Ai,
      reply_to:      Some(ReplyTo::Welcome),
      text:          String::new(),
      vector_scores: Vec::new(),
    }
  }

  /// `true` for an AI message that still waits for its answer text.
  pub fn is_pending_answer(&self) -> bool {
    self.author.is_ai() && self.reply_to.is_some() && self.text.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn message_id_parses_owner_and_name() {
    let id: MessageId = "admin/message_1".parse().unwrap();
    assert_eq!(id.owner, "admin");
    assert_eq!(id.name, "message_1");
    assert_eq!(id.to_string(), "admin/message_1");
  }

  #[test]
  fn message_id_rejects_missing_parts() {
    assert!("admin".parse::<MessageId>().is_err());
    assert!("/name".parse::<MessageId>().is_err());
    assert!("admin/".parse::<MessageId>().is_err());
  }

  #[test]
  fn sentinels_become_variants() {
    assert_eq!(Author::from("AI".to_owned()), Author::Ai);
    assert_eq!(Author::from("alice".to_owned()), Author::User("alice".into()));
    assert_eq!("Welcome".parse::<ReplyTo>().unwrap(), ReplyTo::Welcome);
    assert_eq!(
      "admin/m1".parse::<ReplyTo>().unwrap(),
      ReplyTo::Message(MessageId::new("admin", "m1")),
    );
  }

  #[test]
  fn message_serializes_sentinels_as_strings() {
    let question = Message::from_user("admin", "chat_1", "alice", "hi");
    let answer = Message::answer_placeholder(&question);
    let json = serde_json::to_value(&answer).unwrap();
    assert_eq!(json["author"], "AI");
    assert_eq!(json["reply_to"], question.id.to_string());
    assert_eq!(json["text"], "");

    let back: Message = serde_json::from_value(json).unwrap();
    assert_eq!(back, answer);
  }

  #[test]
  fn welcome_placeholder_is_pending() {
    let welcome = Message::welcome_placeholder("admin", "chat_1", "alice");
    assert!(welcome.is_pending_answer());
    assert_eq!(welcome.reply_to, Some(ReplyTo::Welcome));
    assert_eq!(welcome.user, "alice");
  }

  #[test]
  fn placeholder_is_pending_and_sorts_after_question() {
    let question = Message::from_user("admin", "chat_1", "alice", "hi");
    let answer = Message::answer_placeholder(&question);
    assert!(answer.is_pending_answer());
    assert!(!question.is_pending_answer());
    assert!(answer.created_at > question.created_at);
    assert_eq!(answer.id.owner, "admin");
    assert_ne!(answer.id, question.id);
  }
}
