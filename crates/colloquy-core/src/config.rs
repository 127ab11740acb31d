//! Per-owner answer policy ("store configuration").

use serde::{Deserialize, Serialize};

/// Answer policy for one owner: prompt, history depth and quota.
///
/// Read once per request and never mutated by the answer pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  pub owner:           String,
  pub name:            String,
  /// Picked by [`default_store_config`] ahead of any other store of the
  /// owner.
  ///
  /// [`default_store_config`]: crate::store::ConversationStore::default_store_config
  pub is_default:      bool,
  /// Seed question answered when a message replies to `Welcome`.
  pub welcome:         String,
  /// System prompt template handed to the model backend.
  pub prompt:          String,
  /// Maximum number of history messages included in a prompt.
  pub memory_limit:    usize,
  /// Length of the quota window, in minutes.
  pub limit_minutes:   u32,
  /// Questions an unauthenticated user may ask within the window.
  pub frequency:       u32,
  /// Maximum number of knowledge passages retrieved per question.
  pub knowledge_limit: usize,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      owner:           "admin".to_owned(),
      name:            "store-built-in".to_owned(),
      is_default:      true,
      welcome:         "Hello".to_owned(),
      prompt:          "You are an expert in your field and you specialize in \
                        using your knowledge to answer or solve people's \
                        problems."
        .to_owned(),
      memory_limit:    5,
      limit_minutes:   15,
      frequency:       10,
      knowledge_limit: 5,
    }
  }
}
