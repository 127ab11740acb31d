//! Context assembly: validate the answer placeholder, resolve the question,
//! and gather knowledge and history for the prompt.

use colloquy_core::{
  chat::{Chat, ChatKind},
  config::StoreConfig,
  knowledge::{self, Embedder, Knowledge, KnowledgeIndex, RetrievalError},
  message::{Message, MessageId, ReplyTo},
  store::ConversationStore,
};

use crate::error::AnswerError;

/// The question an answer placeholder replies to.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
  pub text:   String,
  /// The stored message the text came from; `None` for the welcome seed.
  pub source: Option<MessageId>,
}

/// Everything validation loaded, handed on to the later stages.
#[derive(Debug, Clone)]
pub struct Validated {
  pub message:  Message,
  pub chat:     Chat,
  pub store:    StoreConfig,
  pub question: Question,
}

fn message_not_found(id: &MessageId) -> AnswerError {
  AnswerError::NotFound(format!("The message: {id} is not found"))
}

/// Load and check the placeholder `id`, its chat, the owner's store
/// configuration and the question.
///
/// Touches nothing but reads, so a rejected request leaves no trace.
pub async fn validate<S>(
  store:       &S,
  id:          &MessageId,
  owner_scope: &str,
) -> Result<Validated, AnswerError>
where
  S: ConversationStore,
{
  let message = store
    .get_message(id)
    .await
    .map_err(AnswerError::store)?
    .ok_or_else(|| message_not_found(id))?;

  let reply_to = match &message.reply_to {
    Some(reply_to) if message.is_pending_answer() => reply_to.clone(),
    _ => return Err(AnswerError::InvalidState("The message is invalid".into())),
  };

  let chat = store
    .get_chat(&id.owner, &message.chat)
    .await
    .map_err(AnswerError::store)?
    .ok_or_else(|| {
      AnswerError::NotFound(format!("The chat: {}/{} is not found", id.owner, message.chat))
    })?;

  if chat.kind != ChatKind::Ai {
    return Err(AnswerError::InvalidState("The chat type must be \"AI\"".into()));
  }

  let config = store
    .default_store_config(owner_scope)
    .await
    .map_err(AnswerError::store)?
    .ok_or_else(|| {
      AnswerError::NotFound(format!("The default store for: {owner_scope} is not found"))
    })?;

  let question = match reply_to {
    ReplyTo::Welcome => Question { text: config.welcome.clone(), source: None },
    ReplyTo::Message(parent) => {
      let asked = store
        .get_message(&parent)
        .await
        .map_err(AnswerError::store)?
        .ok_or_else(|| message_not_found(&parent))?;
      Question { text: asked.text, source: Some(parent) }
    }
  };

  if question.text.is_empty() {
    return Err(AnswerError::InvalidInput("The question should not be empty".into()));
  }

  Ok(Validated { message, chat, store: config, question })
}

/// Knowledge passages for `question`. An empty index is no knowledge, not an
/// error.
pub async fn retrieve_knowledge<I>(
  index:    &I,
  embedder: &dyn Embedder,
  scope:    &str,
  question: &str,
  limit:    usize,
) -> Result<Vec<Knowledge>, AnswerError>
where
  I: KnowledgeIndex,
{
  if limit == 0 {
    return Ok(Vec::new());
  }
  match knowledge::retrieve(index, embedder, scope, question, limit).await {
    Ok(found) => Ok(found),
    Err(RetrievalError::NoVectors) => {
      tracing::debug!(scope, "no knowledge vectors found");
      Ok(Vec::new())
    }
    Err(e) => Err(AnswerError::Retrieval(Box::new(e))),
  }
}

/// Up to `memory_limit` earlier messages of the chat, oldest first.
///
/// Leaves out the placeholder being answered, the question itself and any
/// message without text.
pub async fn history<S>(store: &S, validated: &Validated) -> Result<Vec<Message>, AnswerError>
where
  S: ConversationStore,
{
  let limit = validated.store.memory_limit;
  if limit == 0 {
    return Ok(Vec::new());
  }

  let placeholder = &validated.message;
  // Headroom for the placeholder, the question and unanswered placeholders.
  let recent = store
    .recent_messages(&placeholder.id.owner, &placeholder.chat, limit * 2 + 2)
    .await
    .map_err(AnswerError::store)?;

  let mut kept: Vec<Message> = recent
    .into_iter()
    .filter(|m| m.id != placeholder.id)
    .filter(|m| validated.question.source.as_ref() != Some(&m.id))
    .filter(|m| !m.text.is_empty())
    .collect();

  let excess = kept.len().saturating_sub(limit);
  kept.drain(..excess);
  Ok(kept)
}
