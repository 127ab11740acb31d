//! Fixtures shared by the pipeline and router tests.

use std::{
  sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use colloquy_core::{
  BoxError,
  chat::{Chat, ChatKind},
  config::StoreConfig,
  knowledge::{Embedder, Knowledge, KnowledgeIndex, NewKnowledge},
  message::{Message, MessageId},
  model::{ModelBackend, Prompt},
  store::ConversationStore,
};
use colloquy_store_sqlite::SqliteStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub async fn seed_chat(store: &SqliteStore, name: &str, kind: ChatKind) -> Chat {
  let chat = Chat {
    owner:      "admin".into(),
    name:       name.into(),
    created_at: Utc::now(),
    kind,
    user:       "alice".into(),
    model:      None,
  };
  store.add_chat(chat.clone()).await.unwrap();
  chat
}

/// Store a question from `alice` and its answer placeholder.
pub async fn seed_question(store: &SqliteStore, chat: &str, text: &str) -> (Message, Message) {
  let question = Message::from_user("admin", chat, "alice", text);
  let placeholder = Message::answer_placeholder(&question);
  store.add_message(question.clone()).await.unwrap();
  store.add_message(placeholder.clone()).await.unwrap();
  (question, placeholder)
}

// ─── Embedder ────────────────────────────────────────────────────────────────

/// Embeds every text as the same unit vector and counts calls.
#[derive(Default)]
pub struct FixedEmbedder {
  calls: AtomicUsize,
}

impl FixedEmbedder {
  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl Embedder for FixedEmbedder {
  fn name(&self) -> &str { "fixed" }

  async fn embed(&self, _: &str) -> Result<Vec<f32>, BoxError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(vec![1.0, 0.0])
  }
}

/// Fails every embedding request.
pub struct UnreachableEmbedder;

#[async_trait]
impl Embedder for UnreachableEmbedder {
  fn name(&self) -> &str { "unreachable" }

  async fn embed(&self, _: &str) -> Result<Vec<f32>, BoxError> {
    Err("embedding service unreachable".into())
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum FrozenError {
  #[error(transparent)]
  Sqlite(#[from] colloquy_store_sqlite::Error),
  #[error("store is read-only")]
  ReadOnly,
}

/// SQLite that refuses to overwrite messages.
pub struct FrozenStore(pub SqliteStore);

impl ConversationStore for FrozenStore {
  type Error = FrozenError;

  async fn get_message(&self, id: &MessageId) -> Result<Option<Message>, FrozenError> {
    Ok(self.0.get_message(id).await?)
  }

  async fn recent_messages(
    &self,
    owner: &str,
    chat: &str,
    limit: usize,
  ) -> Result<Vec<Message>, FrozenError> {
    Ok(self.0.recent_messages(owner, chat, limit).await?)
  }

  async fn add_message(&self, message: Message) -> Result<(), FrozenError> {
    Ok(self.0.add_message(message).await?)
  }

  async fn update_message(&self, _: &MessageId, _: Message) -> Result<bool, FrozenError> {
    Err(FrozenError::ReadOnly)
  }

  async fn count_messages_since(
    &self,
    user: &str,
    since: DateTime<Utc>,
  ) -> Result<u64, FrozenError> {
    Ok(self.0.count_messages_since(user, since).await?)
  }

  async fn add_chat(&self, chat: Chat) -> Result<(), FrozenError> {
    Ok(self.0.add_chat(chat).await?)
  }

  async fn get_chat(&self, owner: &str, name: &str) -> Result<Option<Chat>, FrozenError> {
    Ok(self.0.get_chat(owner, name).await?)
  }

  async fn put_store_config(&self, config: StoreConfig) -> Result<(), FrozenError> {
    Ok(self.0.put_store_config(config).await?)
  }

  async fn default_store_config(&self, owner: &str) -> Result<Option<StoreConfig>, FrozenError> {
    Ok(self.0.default_store_config(owner).await?)
  }
}

impl KnowledgeIndex for FrozenStore {
  type Error = FrozenError;

  async fn add_knowledge(&self, entry: NewKnowledge) -> Result<Knowledge, FrozenError> {
    Ok(self.0.add_knowledge(entry).await?)
  }

  async fn nearest(
    &self,
    scope: &str,
    embedding: &[f32],
    limit: usize,
  ) -> Result<Vec<Knowledge>, FrozenError> {
    Ok(self.0.nearest(scope, embedding, limit).await?)
  }
}

// ─── Model backend ───────────────────────────────────────────────────────────

/// How a [`ScriptedBackend`] ends after sending its fragments.
#[derive(Clone)]
pub enum Ending {
  Complete,
  Fail(String),
  /// Wait for cancellation, then fail.
  Hang,
  /// Wait for cancellation, then report completion.
  HangQuietly,
}

/// Replays fixed fragments, records the prompt it was given.
pub struct ScriptedBackend {
  fragments: Vec<String>,
  ending:    Ending,
  delay:     Duration,
  calls:     AtomicUsize,
  prompt:    Mutex<Option<Prompt>>,
}

impl ScriptedBackend {
  pub fn new(fragments: &[&str]) -> Self {
    Self {
      fragments: fragments.iter().map(|f| f.to_string()).collect(),
      ending:    Ending::Complete,
      delay:     Duration::ZERO,
      calls:     AtomicUsize::new(0),
      prompt:    Mutex::new(None),
    }
  }

  pub fn ending(mut self, ending: Ending) -> Self {
    self.ending = ending;
    self
  }

  /// Pause before each fragment.
  pub fn delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

  pub fn last_prompt(&self) -> Option<Prompt> { self.prompt.lock().unwrap().clone() }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
  fn name(&self) -> &str { "scripted" }

  async fn generate(
    &self,
    prompt: &Prompt,
    fragments: mpsc::Sender<String>,
    cancel: CancellationToken,
  ) -> Result<(), BoxError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    *self.prompt.lock().unwrap() = Some(prompt.clone());

    for fragment in &self.fragments {
      if !self.delay.is_zero() {
        tokio::time::sleep(self.delay).await;
      }
      if fragments.send(fragment.clone()).await.is_err() {
        return Ok(());
      }
    }

    match &self.ending {
      Ending::Complete => Ok(()),
      Ending::Fail(message) => Err(message.clone().into()),
      Ending::Hang => {
        cancel.cancelled().await;
        Err("generation cancelled".into())
      }
      Ending::HangQuietly => {
        cancel.cancelled().await;
        Ok(())
      }
    }
  }
}
