//! The `ConversationStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `colloquy-store-sqlite`).
//! The answer pipeline and the JSON API depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  chat::Chat,
  config::StoreConfig,
  message::{Message, MessageId},
};

/// Abstraction over the message, chat and store-configuration tables.
///
/// All methods return `Send` futures so the trait can be used from tasks
/// spawned on a multi-threaded runtime. Implementations must be safe for
/// concurrent use by many requests at once.
pub trait ConversationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Messages ──────────────────────────────────────────────────────────

  /// Retrieve a message by id. Returns `None` if not found.
  fn get_message<'a>(
    &'a self,
    id: &'a MessageId,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + 'a;

  /// The `limit` most recent messages of a chat, oldest first.
  fn recent_messages<'a>(
    &'a self,
    owner: &'a str,
    chat: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'a;

  /// Persist a new message. Fails if the id is already taken.
  fn add_message(
    &self,
    message: Message,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Overwrite the message stored under `id`. Returns `false` if no such
  /// message exists.
  fn update_message<'a>(
    &'a self,
    id: &'a MessageId,
    message: Message,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Number of messages authored by `user` created at or after `since`.
  fn count_messages_since<'a>(
    &'a self,
    user: &'a str,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  // ── Chats ─────────────────────────────────────────────────────────────

  /// Persist a new chat. Fails if `owner/name` is already taken.
  fn add_chat(
    &self,
    chat: Chat,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Retrieve a chat by owner and name. Returns `None` if not found.
  fn get_chat<'a>(
    &'a self,
    owner: &'a str,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Chat>, Self::Error>> + Send + 'a;

  // ── Store configuration ───────────────────────────────────────────────

  /// Insert or replace the store configuration `owner/name`.
  fn put_store_config(
    &self,
    config: StoreConfig,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The owner's default store: the one flagged `is_default`, else the first
  /// by name. Returns `None` if the owner has no store at all.
  fn default_store_config<'a>(
    &'a self,
    owner: &'a str,
  ) -> impl Future<Output = Result<Option<StoreConfig>, Self::Error>> + Send + 'a;
}
