//! [`SqliteStore`] — the SQLite implementation of [`ConversationStore`] and
//! [`KnowledgeIndex`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use colloquy_core::{
  chat::Chat,
  config::StoreConfig,
  knowledge::{Knowledge, KnowledgeIndex, NewKnowledge},
  message::{Message, MessageId},
  store::ConversationStore,
};

use crate::{
  Error, Result,
  encode::{
    MESSAGE_COLUMNS, RawChat, RawKnowledge, RawMessage, RawStore, encode_dt,
    encode_embedding,
  },
  schema::SCHEMA,
  similarity::cosine,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Colloquy store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ConversationStore impl ──────────────────────────────────────────────────

impl ConversationStore for SqliteStore {
  type Error = Error;

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn get_message(&self, id: &MessageId) -> Result<Option<Message>> {
    let owner = id.owner.clone();
    let name = id.name.clone();

    let raw: Option<RawMessage> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {MESSAGE_COLUMNS} FROM messages WHERE owner = ?1 AND name = ?2"
            ),
            rusqlite::params![owner, name],
            RawMessage::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMessage::into_message).transpose()
  }

  async fn recent_messages(
    &self,
    owner: &str,
    chat:  &str,
    limit: usize,
  ) -> Result<Vec<Message>> {
    let owner = owner.to_owned();
    let chat = chat.to_owned();
    let limit = limit as i64;

    let mut raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MESSAGE_COLUMNS} FROM messages
           WHERE owner = ?1 AND chat = ?2
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner, chat, limit], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    // Newest-first from SQL; callers want the conversation in reading order.
    raws.reverse();
    raws.into_iter().map(RawMessage::into_message).collect()
  }

  async fn add_message(&self, message: Message) -> Result<()> {
    let raw = RawMessage::encode(&message)?;

    let inserted = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "INSERT OR IGNORE INTO messages (
             owner, name, created_at, user, chat, author, reply_to, text, vector_scores
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            raw.owner,
            raw.name,
            raw.created_at,
            raw.user,
            raw.chat,
            raw.author,
            raw.reply_to,
            raw.text,
            raw.vector_scores,
          ],
        )?;
        Ok(changed > 0)
      })
      .await?;

    if !inserted {
      return Err(Error::DuplicateMessage(message.id.to_string()));
    }
    Ok(())
  }

  async fn update_message(&self, id: &MessageId, message: Message) -> Result<bool> {
    let raw = RawMessage::encode(&message)?;
    let owner = id.owner.clone();
    let name = id.name.clone();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE messages SET
             owner = ?3, name = ?4, created_at = ?5, user = ?6, chat = ?7,
             author = ?8, reply_to = ?9, text = ?10, vector_scores = ?11
           WHERE owner = ?1 AND name = ?2",
          rusqlite::params![
            owner,
            name,
            raw.owner,
            raw.name,
            raw.created_at,
            raw.user,
            raw.chat,
            raw.author,
            raw.reply_to,
            raw.text,
            raw.vector_scores,
          ],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn count_messages_since(&self, user: &str, since: DateTime<Utc>) -> Result<u64> {
    let user = user.to_owned();
    let since = encode_dt(since);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM messages WHERE author = ?1 AND created_at >= ?2",
          rusqlite::params![user, since],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(count.max(0) as u64)
  }

  // ── Chats ─────────────────────────────────────────────────────────────────

  async fn add_chat(&self, chat: Chat) -> Result<()> {
    let id = format!("{}/{}", chat.owner, chat.name);
    let at_str = encode_dt(chat.created_at);
    let kind_str = chat.kind.to_string();

    let inserted = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "INSERT OR IGNORE INTO chats (owner, name, created_at, kind, user, model)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![chat.owner, chat.name, at_str, kind_str, chat.user, chat.model],
        )?;
        Ok(changed > 0)
      })
      .await?;

    if !inserted {
      return Err(Error::DuplicateChat(id));
    }
    Ok(())
  }

  async fn get_chat(&self, owner: &str, name: &str) -> Result<Option<Chat>> {
    let owner = owner.to_owned();
    let name = name.to_owned();

    let raw: Option<RawChat> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT owner, name, created_at, kind, user, model
             FROM chats WHERE owner = ?1 AND name = ?2",
            rusqlite::params![owner, name],
            |row| {
              Ok(RawChat {
                owner:      row.get(0)?,
                name:       row.get(1)?,
                created_at: row.get(2)?,
                kind:       row.get(3)?,
                user:       row.get(4)?,
                model:      row.get(5)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawChat::into_chat).transpose()
  }

  // ── Store configuration ───────────────────────────────────────────────────

  async fn put_store_config(&self, config: StoreConfig) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO stores (
             owner, name, is_default, welcome, prompt,
             memory_limit, limit_minutes, frequency, knowledge_limit
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            config.owner,
            config.name,
            config.is_default,
            config.welcome,
            config.prompt,
            config.memory_limit as i64,
            config.limit_minutes as i64,
            config.frequency as i64,
            config.knowledge_limit as i64,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn default_store_config(&self, owner: &str) -> Result<Option<StoreConfig>> {
    let owner = owner.to_owned();

    let raw: Option<RawStore> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT owner, name, is_default, welcome, prompt,
                    memory_limit, limit_minutes, frequency, knowledge_limit
             FROM stores WHERE owner = ?1
             ORDER BY is_default DESC, name ASC
             LIMIT 1",
            rusqlite::params![owner],
            |row| {
              Ok(RawStore {
                owner:           row.get(0)?,
                name:            row.get(1)?,
                is_default:      row.get(2)?,
                welcome:         row.get(3)?,
                prompt:          row.get(4)?,
                memory_limit:    row.get(5)?,
                limit_minutes:   row.get(6)?,
                frequency:       row.get(7)?,
                knowledge_limit: row.get(8)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    Ok(raw.map(RawStore::into_store_config))
  }
}

// ─── KnowledgeIndex impl ─────────────────────────────────────────────────────

impl KnowledgeIndex for SqliteStore {
  type Error = Error;

  async fn add_knowledge(&self, entry: NewKnowledge) -> Result<Knowledge> {
    let knowledge = Knowledge {
      id:    format!("knowledge_{}", Uuid::new_v4().simple()),
      text:  entry.text,
      score: 0.0,
    };

    let id_str = knowledge.id.clone();
    let text = knowledge.text.clone();
    let embedding_str = encode_embedding(&entry.embedding)?;
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO knowledge (id, scope, text, embedding, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, entry.scope, text, embedding_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(knowledge)
  }

  async fn nearest(
    &self,
    scope:     &str,
    embedding: &[f32],
    limit:     usize,
  ) -> Result<Vec<Knowledge>> {
    let scope = scope.to_owned();

    let raws: Vec<RawKnowledge> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT id, text, embedding FROM knowledge WHERE scope = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![scope], |row| {
            Ok(RawKnowledge {
              id:        row.get(0)?,
              text:      row.get(1)?,
              embedding: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    // Brute-force ranking; passages embedded with another dimension are skipped.
    let mut scored = Vec::with_capacity(raws.len());
    for raw in raws {
      let (mut knowledge, vector) = raw.into_parts()?;
      if let Some(score) = cosine(embedding, &vector) {
        knowledge.score = score;
        scored.push(knowledge);
      }
    }

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
    Ok(scored)
  }
}
