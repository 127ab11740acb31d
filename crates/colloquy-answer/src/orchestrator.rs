//! The answer pipeline: validate, check the quota, retrieve, stream, persist.
//!
//! One [`Pipeline`] is shared by every request. [`Pipeline::run`] drives a
//! single answer through the [`Stage`]s in order and writes its events; any
//! failure becomes one terminal `error` event.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use colloquy_core::{
  knowledge::{self, Embedder},
  message::MessageId,
  model::{ModelBackend, ModelRegistry, Prompt},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
  AnswerStore,
  auth::Session,
  cleaner::{self, Cleaner, StreamState},
  context,
  encoder::EventWriter,
  error::AnswerError,
  finalizer,
  quota::{self, Admission},
};

/// Fragments a backend may send ahead of the client.
const FRAGMENT_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Stage {
  Validating,
  RateChecking,
  Retrieving,
  Streaming,
  Finalizing,
  Done,
  Error,
}

/// Server-wide knobs of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
  /// Owner whose store configuration and knowledge every answer uses.
  pub owner_scope:        String,
  pub cleaner_window:     usize,
  pub stop_markers:       Vec<String>,
  pub generation_timeout: Duration,
}

impl Default for PipelineSettings {
  fn default() -> Self {
    Self {
      owner_scope:        "admin".to_owned(),
      cleaner_window:     cleaner::DEFAULT_WINDOW,
      stop_markers:       vec!["</s>".to_owned()],
      generation_timeout: Duration::from_secs(300),
    }
  }
}

pub struct Pipeline<S> {
  store:    Arc<S>,
  models:   ModelRegistry,
  embedder: Arc<dyn Embedder>,
  settings: PipelineSettings,
  shutdown: CancellationToken,
}

impl<S> Pipeline<S>
where
  S: AnswerStore,
{
  pub fn new(
    store:    Arc<S>,
    models:   ModelRegistry,
    embedder: Arc<dyn Embedder>,
    settings: PipelineSettings,
  ) -> Self {
    Self { store, models, embedder, settings, shutdown: CancellationToken::new() }
  }

  /// Cancel in-flight generations when `token` fires.
  pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
    self.shutdown = token;
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }

  pub fn settings(&self) -> &PipelineSettings { &self.settings }

  /// Answer the placeholder `id`, writing events to `writer`.
  ///
  /// A failure has already been reported to the client as an `error` event
  /// when this returns, unless the client is the thing that failed.
  pub async fn run(
    &self,
    id:      &MessageId,
    session: &Session,
    mut writer: EventWriter,
  ) -> Result<(), AnswerError> {
    let mut stage = Stage::Validating;
    let result = self.answer(id, session, &mut writer, &mut stage).await;

    match &result {
      Ok(()) => info!(message = %id, "answer completed"),
      Err(AnswerError::StreamWrite) => {
        info!(message = %id, %stage, "client disconnected, answer abandoned");
      }
      Err(e) => {
        warn!(message = %id, %stage, error = %e, "answer failed");
        stage = Stage::Error;
        debug!(message = %id, %stage, "reporting failure");
        if writer.error(&e.to_string()).await.is_err() {
          debug!(message = %id, "client gone before the error event");
        }
      }
    }
    result
  }

  async fn answer(
    &self,
    id:      &MessageId,
    session: &Session,
    writer:  &mut EventWriter,
    stage:   &mut Stage,
  ) -> Result<(), AnswerError> {
    *stage = Stage::Validating;
    let validated = context::validate(&*self.store, id, &self.settings.owner_scope).await?;
    debug!(message = %id, question = %validated.question.text, "answer validated");

    if !session.is_authenticated() {
      *stage = Stage::RateChecking;
      let config = &validated.store;
      let admission = quota::admit(
        &*self.store,
        &validated.message.user,
        config.limit_minutes,
        config.frequency,
        Utc::now(),
      )
      .await?;
      if admission == Admission::Deny {
        return Err(AnswerError::QuotaExceeded);
      }
    }

    *stage = Stage::Retrieving;
    let model = self.models.resolve(validated.chat.model.as_deref())?;
    let knowledge = context::retrieve_knowledge(
      &*self.store,
      self.embedder.as_ref(),
      &self.settings.owner_scope,
      &validated.question.text,
      validated.store.knowledge_limit,
    )
    .await?;
    for passage in &knowledge {
      debug!(id = %passage.id, score = passage.score, text = %passage.text, "knowledge");
    }
    let history = context::history(&*self.store, &validated).await?;
    let scores = knowledge::vector_scores(&knowledge);

    let prompt = Prompt {
      question: validated.question.text.clone(),
      history,
      template: validated.store.prompt.clone(),
      knowledge,
    };

    *stage = Stage::Streaming;
    info!(message = %id, model = model.name(), "streaming answer");
    let mut state = StreamState::new(Cleaner::new(
      self.settings.cleaner_window,
      self.settings.stop_markers.clone(),
    ));
    self.stream(model.as_ref(), &prompt, &mut state, writer).await?;
    if let Some(rest) = state.finish() {
      writer.message(&rest).await?;
    }
    writer.end().await?;
    debug!(message = %id, answer = %state.answer(), "answer streamed");

    *stage = Stage::Finalizing;
    finalizer::finalize(&*self.store, validated.message, state.into_answer(), scores).await?;

    *stage = Stage::Done;
    Ok(())
  }

  /// Run the backend and forward released text until it completes.
  async fn stream(
    &self,
    model:  &dyn ModelBackend,
    prompt: &Prompt,
    state:  &mut StreamState,
    writer: &mut EventWriter,
  ) -> Result<(), AnswerError> {
    let (tx, mut rx) = mpsc::channel::<String>(FRAGMENT_BUFFER);
    let cancel = self.shutdown.child_token();
    // Stops the backend whichever way this function returns.
    let _guard = cancel.clone().drop_guard();

    let generation = async move {
      model.generate(prompt, tx, cancel).await.map_err(AnswerError::Model)
    };
    let forwarding = async {
      while let Some(fragment) = rx.recv().await {
        trace!(fragment = %fragment, "fragment");
        if let Some(chunk) = state.write(&fragment) {
          writer.message(&chunk).await?;
        }
      }
      Ok::<(), AnswerError>(())
    };

    let timeout = self.settings.generation_timeout;
    let joined = tokio::select! {
      biased;
      _ = self.shutdown.cancelled() => return Err(AnswerError::Cancelled),
      result = tokio::time::timeout(timeout, async { tokio::try_join!(generation, forwarding) }) => result,
    };
    // A backend may wind down on shutdown before the select observes it.
    if self.shutdown.is_cancelled() {
      return Err(AnswerError::Cancelled);
    }
    joined.map_err(|_| AnswerError::Timeout(timeout))??;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use colloquy_core::{
    chat::ChatKind,
    config::StoreConfig,
    knowledge::{KnowledgeIndex, NewKnowledge},
    message::{Message, VectorScore},
    store::ConversationStore,
  };
  use colloquy_store_sqlite::SqliteStore;

  use crate::{
    encoder::{self, Frame, parse_frames},
    testing::{
      Ending, FixedEmbedder, FrozenStore, ScriptedBackend, UnreachableEmbedder, seed_chat,
      seed_question,
    },
  };

  struct Harness {
    store:    Arc<SqliteStore>,
    backend:  Arc<ScriptedBackend>,
    embedder: Arc<FixedEmbedder>,
    pipeline: Pipeline<SqliteStore>,
  }

  async fn harness(backend: ScriptedBackend, config: StoreConfig) -> Harness {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    store.put_store_config(config).await.unwrap();
    let backend = Arc::new(backend);
    let embedder = Arc::new(FixedEmbedder::default());
    let models = ModelRegistry::new("main").with_backend("main", backend.clone());
    let settings = PipelineSettings {
      stop_markers: vec!["<STOP>".into()],
      generation_timeout: Duration::from_secs(5),
      ..PipelineSettings::default()
    };
    let pipeline = Pipeline::new(store.clone(), models, embedder.clone(), settings);
    Harness { store, backend, embedder, pipeline }
  }

  async fn run<S: AnswerStore>(
    pipeline: &Pipeline<S>,
    id: &MessageId,
    session: Session,
  ) -> (Result<(), AnswerError>, Vec<Frame>) {
    let (writer, events) = encoder::channel(4);
    let body = async {
      use axum::response::IntoResponse as _;
      let bytes = axum::body::to_bytes(events.into_response().into_body(), usize::MAX)
        .await
        .unwrap();
      String::from_utf8(bytes.to_vec()).unwrap()
    };
    let (result, body) = tokio::join!(pipeline.run(id, &session, writer), body);
    (result, parse_frames(&body))
  }

  fn messages(frames: &[Frame]) -> String {
    frames
      .iter()
      .filter(|f| f.event == "message")
      .map(|f| serde_json::from_str::<String>(&f.data).unwrap())
      .collect()
  }

  fn events(frames: &[Frame]) -> Vec<&str> {
    frames.iter().map(|f| f.event.as_str()).collect()
  }

  #[tokio::test]
  async fn streams_cleaned_answer_and_persists_it() {
    let h = harness(
      ScriptedBackend::new(&["Hel", "lo wor", "ld<STOP>"]),
      StoreConfig::default(),
    )
    .await;
    seed_chat(&h.store, "chat_1", ChatKind::Ai).await;
    let (_, placeholder) = seed_question(&h.store, "chat_1", "Say hello").await;

    let (result, frames) = run(&h.pipeline, &placeholder.id, Session::Anonymous).await;
    result.unwrap();

    assert_eq!(events(&frames), ["message", "message", "end"]);
    assert_eq!(messages(&frames), "Hello world");
    assert_eq!(frames.last().unwrap().data, "end");

    let stored = h.store.get_message(&placeholder.id).await.unwrap().unwrap();
    assert_eq!(stored.text, "Hello world");
    assert!(stored.vector_scores.is_empty());
  }

  #[tokio::test]
  async fn short_answer_is_released_at_the_end() {
    let h = harness(ScriptedBackend::new(&["Hi", "!"]), StoreConfig::default()).await;
    seed_chat(&h.store, "chat_1", ChatKind::Ai).await;
    let (_, placeholder) = seed_question(&h.store, "chat_1", "Greet me").await;

    let (result, frames) = run(&h.pipeline, &placeholder.id, Session::Anonymous).await;
    result.unwrap();
    assert_eq!(events(&frames), ["message", "end"]);
    assert_eq!(messages(&frames), "Hi!");
  }

  #[tokio::test]
  async fn prompt_carries_knowledge_history_and_template() {
    let h = harness(
      ScriptedBackend::new(&["Rust is a language."]),
      StoreConfig { prompt: "Be brief.".into(), ..StoreConfig::default() },
    )
    .await;
    seed_chat(&h.store, "chat_1", ChatKind::Ai).await;
    let earlier = Message::from_user("admin", "chat_1", "alice", "Earlier turn");
    h.store.add_message(earlier).await.unwrap();
    let passage = h
      .store
      .add_knowledge(NewKnowledge {
        scope:     "admin".into(),
        text:      "Rust is a systems language.".into(),
        embedding: vec![1.0, 0.0],
      })
      .await
      .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let (_, placeholder) = seed_question(&h.store, "chat_1", "What is Rust?").await;

    let (result, _) = run(&h.pipeline, &placeholder.id, Session::Anonymous).await;
    result.unwrap();

    let prompt = h.backend.last_prompt().unwrap();
    assert_eq!(prompt.question, "What is Rust?");
    assert_eq!(prompt.template, "Be brief.");
    assert_eq!(prompt.knowledge.len(), 1);
    let texts: Vec<_> = prompt.history.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["Earlier turn"]);

    let stored = h.store.get_message(&placeholder.id).await.unwrap().unwrap();
    assert_eq!(stored.vector_scores.len(), 1);
    assert_eq!(stored.vector_scores[0].vector, passage.id);
    assert!(matches!(stored.vector_scores[0], VectorScore { score, .. } if score > 0.99));
  }

  #[tokio::test]
  async fn invalid_message_fails_before_any_collaborator_call() {
    let h = harness(ScriptedBackend::new(&["never"]), StoreConfig::default()).await;
    seed_chat(&h.store, "chat_1", ChatKind::Ai).await;
    let (question, _) = seed_question(&h.store, "chat_1", "hi").await;

    let (result, frames) = run(&h.pipeline, &question.id, Session::Anonymous).await;
    assert!(matches!(result, Err(AnswerError::InvalidState(_))));
    assert_eq!(
      frames,
      [Frame { event: "error".into(), data: "The message is invalid".into() }],
    );
    assert_eq!(h.embedder.calls(), 0);
    assert_eq!(h.backend.calls(), 0);

    let stored = h.store.get_message(&question.id).await.unwrap().unwrap();
    assert_eq!(stored.text, "hi");
  }

  #[tokio::test]
  async fn quota_applies_to_anonymous_callers_only() {
    let config = StoreConfig { limit_minutes: 60, frequency: 1, ..StoreConfig::default() };
    let h = harness(ScriptedBackend::new(&["Answer text"]), config).await;
    seed_chat(&h.store, "chat_1", ChatKind::Ai).await;
    seed_question(&h.store, "chat_1", "first").await;
    let (_, placeholder) = seed_question(&h.store, "chat_1", "second").await;

    let (result, frames) = run(&h.pipeline, &placeholder.id, Session::Anonymous).await;
    assert!(matches!(result, Err(AnswerError::QuotaExceeded)));
    assert_eq!(events(&frames), ["error"]);
    assert_eq!(frames[0].data, "You have queried too many times, please wait for a while");
    assert_eq!(h.backend.calls(), 0);

    let session = Session::Authenticated { username: "admin".into() };
    let (result, frames) = run(&h.pipeline, &placeholder.id, session).await;
    result.unwrap();
    assert_eq!(messages(&frames), "Answer text");
  }

  #[tokio::test]
  async fn backend_failure_is_one_error_event_and_nothing_persisted() {
    let h = harness(
      ScriptedBackend::new(&["Partial answer that ", "goes on"])
        .ending(Ending::Fail("upstream exploded".into())),
      StoreConfig::default(),
    )
    .await;
    seed_chat(&h.store, "chat_1", ChatKind::Ai).await;
    let (_, placeholder) = seed_question(&h.store, "chat_1", "hi").await;

    let (result, frames) = run(&h.pipeline, &placeholder.id, Session::Anonymous).await;
    assert!(matches!(result, Err(AnswerError::Model(_))));
    assert_eq!(events(&frames).last(), Some(&"error"));
    assert_eq!(events(&frames).iter().filter(|e| **e == "error").count(), 1);
    assert!(!events(&frames).contains(&"end"));
    assert!(frames.last().unwrap().data.contains("upstream exploded"));

    let stored = h.store.get_message(&placeholder.id).await.unwrap().unwrap();
    assert!(stored.is_pending_answer());
  }

  #[tokio::test]
  async fn unknown_model_is_not_found() {
    let h = harness(ScriptedBackend::new(&["x"]), StoreConfig::default()).await;
    let mut chat = seed_chat(&h.store, "chat_1", ChatKind::Ai).await;
    chat.name = "chat_2".into();
    chat.model = Some("missing".into());
    h.store.add_chat(chat).await.unwrap();
    let (_, placeholder) = seed_question(&h.store, "chat_2", "hi").await;

    let (result, frames) = run(&h.pipeline, &placeholder.id, Session::Anonymous).await;
    assert!(matches!(result, Err(AnswerError::NotFound(_))));
    assert_eq!(frames[0].data, "The model provider: missing is not found");
  }

  #[tokio::test]
  async fn hung_backend_times_out() {
    let h = harness(
      ScriptedBackend::new(&["Thinking"]).ending(Ending::Hang),
      StoreConfig::default(),
    )
    .await;
    let pipeline = Pipeline {
      settings: PipelineSettings {
        generation_timeout: Duration::from_millis(50),
        ..h.pipeline.settings.clone()
      },
      ..h.pipeline
    };
    let h = Harness { pipeline, ..h };
    seed_chat(&h.store, "chat_1", ChatKind::Ai).await;
    let (_, placeholder) = seed_question(&h.store, "chat_1", "hi").await;

    let (result, frames) = run(&h.pipeline, &placeholder.id, Session::Anonymous).await;
    assert!(matches!(result, Err(AnswerError::Timeout(_))));
    assert_eq!(events(&frames).last(), Some(&"error"));
    let stored = h.store.get_message(&placeholder.id).await.unwrap().unwrap();
    assert!(stored.is_pending_answer());
  }

  async fn shut_down_mid_answer(ending: Ending) {
    let h = harness(ScriptedBackend::new(&["Thinking"]).ending(ending), StoreConfig::default())
      .await;
    let shutdown = CancellationToken::new();
    let h = Harness { pipeline: h.pipeline.with_shutdown(shutdown.clone()), ..h };
    seed_chat(&h.store, "chat_1", ChatKind::Ai).await;
    let (_, placeholder) = seed_question(&h.store, "chat_1", "hi").await;

    let trigger = async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      shutdown.cancel();
    };
    let ((result, frames), ()) =
      tokio::join!(run(&h.pipeline, &placeholder.id, Session::Anonymous), trigger);
    assert!(matches!(result, Err(AnswerError::Cancelled)));
    assert!(!events(&frames).contains(&"end"));
    assert_eq!(frames.last().unwrap().event, "error");
    assert_eq!(frames.last().unwrap().data, "answer generation was cancelled");

    let stored = h.store.get_message(&placeholder.id).await.unwrap().unwrap();
    assert!(stored.is_pending_answer());
  }

  #[tokio::test]
  async fn shutdown_cancels_generation() {
    for _ in 0..5 {
      shut_down_mid_answer(Ending::Hang).await;
    }
  }

  #[tokio::test]
  async fn shutdown_wins_over_backend_reporting_completion() {
    for _ in 0..5 {
      shut_down_mid_answer(Ending::HangQuietly).await;
    }
  }

  #[tokio::test]
  async fn storage_failure_after_end_is_one_error_event() {
    let store = Arc::new(FrozenStore(SqliteStore::open_in_memory().await.unwrap()));
    store.0.put_store_config(StoreConfig::default()).await.unwrap();
    seed_chat(&store.0, "chat_1", ChatKind::Ai).await;
    let (_, placeholder) = seed_question(&store.0, "chat_1", "hi").await;

    let backend = Arc::new(ScriptedBackend::new(&["Hi!"]));
    let models = ModelRegistry::new("main").with_backend("main", backend);
    let pipeline = Pipeline::new(
      store.clone(),
      models,
      Arc::new(FixedEmbedder::default()),
      PipelineSettings::default(),
    );

    let (result, frames) = run(&pipeline, &placeholder.id, Session::Anonymous).await;
    assert!(matches!(result, Err(AnswerError::Store(_))));
    assert_eq!(events(&frames), ["message", "end", "error"]);
    assert_eq!(messages(&frames), "Hi!");
    assert_eq!(frames[2].data, "store error: store is read-only");

    let stored = store.0.get_message(&placeholder.id).await.unwrap().unwrap();
    assert!(stored.is_pending_answer());
  }

  #[tokio::test]
  async fn retrieval_failure_stops_before_generation() {
    let h = harness(ScriptedBackend::new(&["never"]), StoreConfig::default()).await;
    let pipeline = Pipeline::new(
      h.store.clone(),
      ModelRegistry::new("main").with_backend("main", h.backend.clone()),
      Arc::new(UnreachableEmbedder),
      PipelineSettings::default(),
    );
    seed_chat(&h.store, "chat_1", ChatKind::Ai).await;
    let (_, placeholder) = seed_question(&h.store, "chat_1", "hi").await;

    let (result, frames) = run(&pipeline, &placeholder.id, Session::Anonymous).await;
    assert!(matches!(result, Err(AnswerError::Retrieval(_))));
    assert_eq!(events(&frames), ["error"]);
    assert!(frames[0].data.contains("embedding service unreachable"));
    assert_eq!(h.backend.calls(), 0);

    let stored = h.store.get_message(&placeholder.id).await.unwrap().unwrap();
    assert!(stored.is_pending_answer());
  }

  #[tokio::test]
  async fn client_disconnect_stops_without_persisting() {
    let h = harness(
      ScriptedBackend::new(&["A long answer ", "that keeps ", "going and going"])
        .delay(Duration::from_millis(10)),
      StoreConfig::default(),
    )
    .await;
    seed_chat(&h.store, "chat_1", ChatKind::Ai).await;
    let (_, placeholder) = seed_question(&h.store, "chat_1", "hi").await;

    let (writer, events) = encoder::channel(4);
    drop(events);
    let result = h.pipeline.run(&placeholder.id, &Session::Anonymous, writer).await;
    assert!(matches!(result, Err(AnswerError::StreamWrite)));

    let stored = h.store.get_message(&placeholder.id).await.unwrap().unwrap();
    assert!(stored.is_pending_answer());
  }
}
