//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed millisecond width so
//! that lexical comparison in SQL matches chronological order. Sentinel-bearing
//! fields (author, reply target, chat kind) are stored in their string form.
//! Vectors and provenance are stored as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use colloquy_core::{
  chat::{Chat, ChatKind},
  config::StoreConfig,
  knowledge::Knowledge,
  message::{Author, Message, MessageId, ReplyTo, VectorScore},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── ChatKind ────────────────────────────────────────────────────────────────

pub fn decode_chat_kind(s: &str) -> Result<ChatKind> {
  s.parse()
    .map_err(|_| colloquy_core::Error::UnknownChatKind(s.to_owned()).into())
}

// ─── Vectors ─────────────────────────────────────────────────────────────────

pub fn encode_vector_scores(scores: &[VectorScore]) -> Result<String> {
  Ok(serde_json::to_string(scores)?)
}

pub fn decode_vector_scores(s: &str) -> Result<Vec<VectorScore>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_embedding(embedding: &[f32]) -> Result<String> {
  Ok(serde_json::to_string(embedding)?)
}

pub fn decode_embedding(s: &str) -> Result<Vec<f32>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching the field order of [`RawMessage::from_row`].
pub const MESSAGE_COLUMNS: &str =
  "owner, name, created_at, user, chat, author, reply_to, text, vector_scores";

/// Raw strings read directly from a `messages` row.
pub struct RawMessage {
  pub owner:         String,
  pub name:          String,
  pub created_at:    String,
  pub user:          String,
  pub chat:          String,
  pub author:        String,
  pub reply_to:      Option<String>,
  pub text:          String,
  pub vector_scores: String,
}

impl RawMessage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      owner:         row.get(0)?,
      name:          row.get(1)?,
      created_at:    row.get(2)?,
      user:          row.get(3)?,
      chat:          row.get(4)?,
      author:        row.get(5)?,
      reply_to:      row.get(6)?,
      text:          row.get(7)?,
      vector_scores: row.get(8)?,
    })
  }

  pub fn encode(message: &Message) -> Result<Self> {
    Ok(Self {
      owner:         message.id.owner.clone(),
      name:          message.id.name.clone(),
      created_at:    encode_dt(message.created_at),
      user:          message.user.clone(),
      chat:          message.chat.clone(),
      author:        message.author.as_str().to_owned(),
      reply_to:      message.reply_to.as_ref().map(ReplyTo::to_string),
      text:          message.text.clone(),
      vector_scores: encode_vector_scores(&message.vector_scores)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    let reply_to = self
      .reply_to
      .filter(|s| !s.is_empty())
      .map(|s| s.parse::<ReplyTo>())
      .transpose()?;

    Ok(Message {
      id:            MessageId::new(self.owner, self.name),
      created_at:    decode_dt(&self.created_at)?,
      user:          self.user,
      chat:          self.chat,
      author:        Author::from(self.author),
      reply_to,
      text:          self.text,
      vector_scores: decode_vector_scores(&self.vector_scores)?,
    })
  }
}

/// Raw strings read directly from a `chats` row.
pub struct RawChat {
  pub owner:      String,
  pub name:       String,
  pub created_at: String,
  pub kind:       String,
  pub user:       String,
  pub model:      Option<String>,
}

impl RawChat {
  pub fn into_chat(self) -> Result<Chat> {
    Ok(Chat {
      owner:      self.owner,
      name:       self.name,
      created_at: decode_dt(&self.created_at)?,
      kind:       decode_chat_kind(&self.kind)?,
      user:       self.user,
      model:      self.model,
    })
  }
}

/// Raw values read directly from a `stores` row.
pub struct RawStore {
  pub owner:           String,
  pub name:            String,
  pub is_default:      bool,
  pub welcome:         String,
  pub prompt:          String,
  pub memory_limit:    i64,
  pub limit_minutes:   i64,
  pub frequency:       i64,
  pub knowledge_limit: i64,
}

impl RawStore {
  pub fn into_store_config(self) -> StoreConfig {
    StoreConfig {
      owner:           self.owner,
      name:            self.name,
      is_default:      self.is_default,
      welcome:         self.welcome,
      prompt:          self.prompt,
      memory_limit:    self.memory_limit.max(0) as usize,
      limit_minutes:   self.limit_minutes.max(0) as u32,
      frequency:       self.frequency.max(0) as u32,
      knowledge_limit: self.knowledge_limit.max(0) as usize,
    }
  }
}

/// Raw strings read directly from a `knowledge` row.
pub struct RawKnowledge {
  pub id:        String,
  pub text:      String,
  pub embedding: String,
}

impl RawKnowledge {
  /// Decode the row into an unscored passage plus its embedding.
  pub fn into_parts(self) -> Result<(Knowledge, Vec<f32>)> {
    let embedding = decode_embedding(&self.embedding)?;
    Ok((Knowledge { id: self.id, text: self.text, score: 0.0 }, embedding))
  }
}
