//! The quota gate for unauthenticated callers.

use chrono::{DateTime, Duration, Utc};
use colloquy_core::store::ConversationStore;

use crate::error::AnswerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
  Allow,
  Deny,
}

/// Deny once `count` exceeds `frequency`.
pub fn decide(count: u64, frequency: u32) -> Admission {
  if count > u64::from(frequency) {
    Admission::Deny
  } else {
    Admission::Allow
  }
}

/// Count what `user` authored in the trailing `limit_minutes` and decide.
///
/// The question being answered is already stored, so it is part of the count.
pub async fn admit<S>(
  store:         &S,
  user:          &str,
  limit_minutes: u32,
  frequency:     u32,
  now:           DateTime<Utc>,
) -> Result<Admission, AnswerError>
where
  S: ConversationStore,
{
  let since = now - Duration::minutes(i64::from(limit_minutes));
  let count = store
    .count_messages_since(user, since)
    .await
    .map_err(AnswerError::store)?;

  let admission = decide(count, frequency);
  tracing::debug!(user, count, frequency, ?admission, "quota checked");
  Ok(admission)
}

#[cfg(test)]
mod tests {
  use super::*;
  use colloquy_core::message::Message;
  use colloquy_store_sqlite::SqliteStore;

  #[test]
  fn deny_iff_count_exceeds_frequency() {
    assert_eq!(decide(0, 0), Admission::Allow);
    assert_eq!(decide(1, 0), Admission::Deny);
    assert_eq!(decide(3, 3), Admission::Allow);
    assert_eq!(decide(4, 3), Admission::Deny);
  }

  async fn store_with_questions(prior: i64) -> (SqliteStore, DateTime<Utc>) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let now = Utc::now();
    for i in 0..prior {
      let mut m = Message::from_user("admin", "chat_1", "alice", format!("q{i}"));
      m.created_at = now - Duration::minutes(5 * (i + 1));
      store.add_message(m).await.unwrap();
    }
    // Outside the window.
    let mut old = Message::from_user("admin", "chat_1", "alice", "old");
    old.created_at = now - Duration::minutes(120);
    store.add_message(old).await.unwrap();

    store
      .add_message(Message::from_user("admin", "chat_1", "alice", "current"))
      .await
      .unwrap();
    (store, now)
  }

  #[tokio::test]
  async fn three_prior_plus_current_is_denied() {
    let (store, now) = store_with_questions(3).await;
    let admission = admit(&store, "alice", 60, 3, now).await.unwrap();
    assert_eq!(admission, Admission::Deny);
  }

  #[tokio::test]
  async fn two_prior_plus_current_is_admitted() {
    let (store, now) = store_with_questions(2).await;
    let admission = admit(&store, "alice", 60, 3, now).await.unwrap();
    assert_eq!(admission, Admission::Allow);
  }
}
