//! The language-model backend seam and the registry that picks a backend for
//! a chat.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{BoxError, Error, knowledge::Knowledge, message::Message};

/// Everything a backend needs to generate one answer.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
  pub question:  String,
  /// Prior turns of the chat, oldest first.
  pub history:   Vec<Message>,
  /// System prompt template from the store configuration.
  pub template:  String,
  pub knowledge: Vec<Knowledge>,
}

/// A language model that streams its answer as text fragments.
#[async_trait]
pub trait ModelBackend: Send + Sync {
  /// Provider name, for logs.
  fn name(&self) -> &str;

  /// Generate an answer to `prompt`, sending each text increment on
  /// `fragments` before returning.
  ///
  /// Returning `Ok(())` signals completion. A closed `fragments` channel means
  /// the consumer has gone away; implementations should stop and return
  /// `Ok(())`. Once `cancel` fires, implementations should stop promptly and
  /// return an error.
  async fn generate(
    &self,
    prompt: &Prompt,
    fragments: mpsc::Sender<String>,
    cancel: CancellationToken,
  ) -> Result<(), BoxError>;
}

/// Named model backends plus the name used when a chat binds none.
#[derive(Clone)]
pub struct ModelRegistry {
  default:  String,
  backends: HashMap<String, Arc<dyn ModelBackend>>,
}

impl ModelRegistry {
  pub fn new(default: impl Into<String>) -> Self {
    Self { default: default.into(), backends: HashMap::new() }
  }

  pub fn with_backend(
    mut self,
    name: impl Into<String>,
    backend: Arc<dyn ModelBackend>,
  ) -> Self {
    self.backends.insert(name.into(), backend);
    self
  }

  /// The backend named `name`, or the default one when `name` is `None` or
  /// empty.
  pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn ModelBackend>, Error> {
    let name = match name {
      Some(n) if !n.is_empty() => n,
      _ => self.default.as_str(),
    };
    self
      .backends
      .get(name)
      .cloned()
      .ok_or_else(|| Error::ModelNotFound(name.to_owned()))
  }
}
