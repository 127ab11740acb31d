//! Writes the streamed answer back into its placeholder.

use colloquy_core::{
  message::{Message, VectorScore},
  store::ConversationStore,
};

use crate::error::AnswerError;

/// Store `answer` and its provenance on the placeholder `message`.
pub async fn finalize<S>(
  store:         &S,
  mut message:   Message,
  answer:        String,
  vector_scores: Vec<VectorScore>,
) -> Result<(), AnswerError>
where
  S: ConversationStore,
{
  let id = message.id.clone();
  if answer.is_empty() {
    tracing::warn!(message = %id, "persisting an empty answer");
  }
  message.text = answer;
  message.vector_scores = vector_scores;

  let updated = store
    .update_message(&id, message)
    .await
    .map_err(AnswerError::store)?;
  if !updated {
    return Err(AnswerError::NotFound(format!("The message: {id} is not found")));
  }
  Ok(())
}
