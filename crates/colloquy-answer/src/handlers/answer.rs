//! `GET /messages/{owner}/{name}/answer`: stream the answer to a placeholder.

use axum::{
  extract::{Path, State},
  response::{IntoResponse, Response},
};
use colloquy_core::message::MessageId;

use crate::{AnswerStore, AppState, auth::Session, encoder};

/// Frames buffered for a slow client before the pipeline waits on it.
const EVENT_BUFFER: usize = 16;

/// Opens the event stream at once and answers on a spawned task, so the
/// pipeline keeps running while the body is being sent.
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path((owner, name)): Path<(String, String)>,
) -> Response
where
  S: AnswerStore,
{
  let id = MessageId::new(owner, name);
  let (writer, events) = encoder::channel(EVENT_BUFFER);

  let pipeline = state.pipeline.clone();
  tokio::spawn(async move {
    // Failures are logged and already sent to the client.
    let _ = pipeline.run(&id, &session, writer).await;
  });

  events.into_response()
}
