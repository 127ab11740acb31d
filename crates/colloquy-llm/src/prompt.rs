//! Turning a [`Prompt`] into chat-completion messages.

use colloquy_core::model::Prompt;

use crate::types::ChatMessage;

/// Build the message list for `prompt`:
///
/// 1. the store's prompt template as the system message (if non-empty);
/// 2. the retrieved knowledge as a second system message (if any);
/// 3. the history, AI turns as `assistant` and everything else as `user`;
/// 4. the question as the final `user` message.
pub fn build_messages(prompt: &Prompt) -> Vec<ChatMessage> {
  let mut messages = Vec::with_capacity(prompt.history.len() + 3);

  if !prompt.template.trim().is_empty() {
    messages.push(ChatMessage::system(prompt.template.clone()));
  }

  if !prompt.knowledge.is_empty() {
    let passages = prompt
      .knowledge
      .iter()
      .enumerate()
      .map(|(i, k)| format!("[{}] {}", i + 1, k.text))
      .collect::<Vec<_>>()
      .join("\n\n");
    messages.push(ChatMessage::system(format!(
      "Use the following knowledge to answer the question when it is \
       relevant:\n\n{passages}"
    )));
  }

  for turn in &prompt.history {
    messages.push(if turn.author.is_ai() {
      ChatMessage::assistant(turn.text.clone())
    } else {
      ChatMessage::user(turn.text.clone())
    });
  }

  messages.push(ChatMessage::user(prompt.question.clone()));
  messages
}
