//! SSE line parser for OpenAI-compatible streaming responses.
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hello"}}]}
//!
//! data: {"choices":[{"delta":{"content":" world"},"finish_reason":"stop"}]}
//!
//! data: [DONE]
//! ```

use crate::{
  error::{ProviderError, Result},
  types::StreamDelta,
};

/// The sentinel value that marks the end of an SSE stream.
const DONE_SENTINEL: &str = "[DONE]";

/// What one SSE line contributes to the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseItem {
  /// A text increment.
  Text(String),
  /// The stream is complete.
  Done,
}

/// Parse a single SSE line into zero or more [`SseItem`]s.
///
/// Blank lines, comments and non-`data:` fields yield nothing.
///
/// # Errors
///
/// Returns [`ProviderError::InvalidResponse`] if a `data:` line carries JSON
/// that is not a streaming delta.
pub fn parse_sse_line(line: &str) -> Result<Vec<SseItem>> {
  let line = line.trim_end();
  if line.is_empty() || line.starts_with(':') {
    return Ok(vec![]);
  }

  let Some(payload) = line.strip_prefix("data:").map(str::trim_start) else {
    return Ok(vec![]);
  };
  if payload.is_empty() {
    return Ok(vec![]);
  }
  if payload == DONE_SENTINEL {
    return Ok(vec![SseItem::Done]);
  }

  let delta: StreamDelta = serde_json::from_str(payload)
    .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse SSE delta: {e}")))?;

  let mut items = Vec::new();
  if let Some(choice) = delta.choices.first() {
    if let Some(text) = &choice.delta.content
      && !text.is_empty()
    {
      items.push(SseItem::Text(text.clone()));
    }
    if choice.finish_reason.is_some() {
      items.push(SseItem::Done);
    }
  }
  Ok(items)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn text_delta() {
    let items =
      parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#).unwrap();
    assert_eq!(items, vec![SseItem::Text("Hel".into())]);
  }

  #[test]
  fn finish_reason_ends_stream_after_text() {
    let items = parse_sse_line(
      r#"data: {"choices":[{"delta":{"content":"!"},"finish_reason":"stop"}]}"#,
    )
    .unwrap();
    assert_eq!(items, vec![SseItem::Text("!".into()), SseItem::Done]);
  }

  #[test]
  fn done_sentinel() {
    assert_eq!(parse_sse_line("data: [DONE]").unwrap(), vec![SseItem::Done]);
  }

  #[test]
  fn ignores_blank_comment_and_other_fields() {
    assert!(parse_sse_line("").unwrap().is_empty());
    assert!(parse_sse_line(": keep-alive").unwrap().is_empty());
    assert!(parse_sse_line("event: message").unwrap().is_empty());
    assert!(parse_sse_line("data:").unwrap().is_empty());
  }

  #[test]
  fn empty_content_and_role_only_deltas_yield_nothing() {
    let items =
      parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant","content":""}}]}"#)
        .unwrap();
    assert!(items.is_empty());
  }

  #[test]
  fn malformed_json_is_invalid_response() {
    assert!(matches!(
      parse_sse_line("data: {not json"),
      Err(ProviderError::InvalidResponse(_))
    ));
  }
}
