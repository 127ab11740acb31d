//! Server-sent events for one answer.
//!
//! The pipeline writes through an [`EventWriter`]; the handler turns the
//! matching [`EventStream`] into an axum [`Sse`] response. Every event is
//! named: `message` carries a JSON string of released text, `end` closes a
//! successful answer and `error` closes a failed one.

use std::convert::Infallible;

use axum::{
  http::{HeaderValue, header},
  response::{
    IntoResponse, Response,
    sse::{Event, KeepAlive, Sse},
  },
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::AnswerError;

pub const EVENT_MESSAGE: &str = "message";
pub const EVENT_END: &str = "end";
pub const EVENT_ERROR: &str = "error";

/// A connected writer/stream pair with room for `capacity` unsent events.
pub fn channel(capacity: usize) -> (EventWriter, EventStream) {
  let (tx, rx) = mpsc::channel(capacity);
  (EventWriter { tx }, EventStream { rx })
}

// ─── Writer ──────────────────────────────────────────────────────────────────

/// Pipeline side of the event channel.
///
/// [`error`](Self::error) consumes the writer: after an error event nothing
/// else can be written.
pub struct EventWriter {
  tx: mpsc::Sender<Result<Event, Infallible>>,
}

impl EventWriter {
  async fn send(&self, event: Event) -> Result<(), AnswerError> {
    self.tx.send(Ok(event)).await.map_err(|_| AnswerError::StreamWrite)
  }

  /// A `message` event carrying `text` as a JSON string.
  pub async fn message(&mut self, text: &str) -> Result<(), AnswerError> {
    let event = Event::default().event(EVENT_MESSAGE).json_data(text)?;
    self.send(event).await
  }

  pub async fn end(&mut self) -> Result<(), AnswerError> {
    self.send(Event::default().event(EVENT_END).data(EVENT_END)).await
  }

  /// The terminal `error` event. A multi-line message becomes several
  /// `data` lines.
  pub async fn error(self, message: &str) -> Result<(), AnswerError> {
    let data = message.replace('\r', "");
    self.send(Event::default().event(EVENT_ERROR).data(data)).await
  }

  pub fn is_closed(&self) -> bool { self.tx.is_closed() }
}

// ─── Stream ──────────────────────────────────────────────────────────────────

/// Response side of the event channel. Ends once the writer is dropped.
pub struct EventStream {
  rx: mpsc::Receiver<Result<Event, Infallible>>,
}

impl IntoResponse for EventStream {
  fn into_response(self) -> Response {
    let mut res = Sse::new(ReceiverStream::new(self.rx))
      .keep_alive(KeepAlive::default())
      .into_response();
    res
      .headers_mut()
      .insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    res
  }
}

/// One decoded event, for tests that read a response body back.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
  pub event: String,
  pub data:  String,
}

#[cfg(test)]
pub fn parse_frames(body: &str) -> Vec<Frame> {
  fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
  }

  body
    .split("\n\n")
    .filter_map(|block| {
      let mut event = None;
      let mut data: Vec<&str> = Vec::new();
      for line in block.lines() {
        if let Some(name) = field(line, "event") {
          event = Some(name.to_owned());
        } else if let Some(rest) = field(line, "data") {
          data.push(rest);
        }
      }
      // Keep-alive comments carry no event.
      Some(Frame { event: event?, data: data.join("\n") })
    })
    .collect()
}
