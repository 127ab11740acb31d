//! The stream sanitizer.
//!
//! A backend may end its output with a control marker (a stop token such as
//! `</s>`) that must never reach the client. The marker can arrive split over
//! several fragments, so the [`Cleaner`] always withholds the last `window`
//! characters and only decides what to do with them once generation is over.

/// Default number of trailing characters withheld from the client.
pub const DEFAULT_WINDOW: usize = 6;

/// Withholds a trailing window of generated text and strips a trailing
/// control marker from it on [`finish`](Self::finish).
#[derive(Debug, Clone)]
pub struct Cleaner {
  window:  usize,
  /// Longest first, so that a marker which ends with a shorter one wins.
  markers: Vec<String>,
  pending: String,
  cleaned: bool,
}

impl Cleaner {
  /// A cleaner withholding `window` characters. The window is widened to the
  /// longest marker so a marker can never leak before `finish`.
  pub fn new(window: usize, markers: Vec<String>) -> Self {
    let mut markers: Vec<String> =
      markers.into_iter().filter(|m| !m.is_empty()).collect();
    markers.sort_by_key(|m| std::cmp::Reverse(m.chars().count()));

    let longest = markers.first().map_or(0, |m| m.chars().count());
    Self {
      window: window.max(longest),
      markers,
      pending: String::new(),
      cleaned: false,
    }
  }

  pub fn window(&self) -> usize { self.window }

  pub fn is_cleaned(&self) -> bool { self.cleaned }

  /// Buffer `fragment` and release everything but the trailing window.
  ///
  /// Returns `None` while the buffer holds no more than `window` characters,
  /// and always after [`finish`](Self::finish).
  pub fn write(&mut self, fragment: &str) -> Option<String> {
    if self.cleaned {
      return None;
    }
    self.pending.push_str(fragment);

    let held = self.pending.chars().count();
    if held <= self.window {
      return None;
    }

    let split = self
      .pending
      .char_indices()
      .nth(held - self.window)
      .map_or(self.pending.len(), |(i, _)| i);
    let tail = self.pending.split_off(split);
    Some(std::mem::replace(&mut self.pending, tail))
  }

  /// Release the withheld remainder with a trailing marker removed.
  ///
  /// Only the first call yields anything; later calls return `None`.
  pub fn finish(&mut self) -> Option<String> {
    if self.cleaned {
      return None;
    }
    self.cleaned = true;

    let mut rest = std::mem::take(&mut self.pending);
    if let Some(marker) = self.markers.iter().find(|m| rest.ends_with(m.as_str())) {
      rest.truncate(rest.len() - marker.len());
    }
    Some(rest)
  }
}

/// Per-request stream state: the cleaner plus everything released so far.
///
/// Whatever this hands out is exactly what the client receives, and
/// [`into_answer`](Self::into_answer) is exactly what gets persisted.
#[derive(Debug)]
pub struct StreamState {
  cleaner: Cleaner,
  answer:  String,
}

impl StreamState {
  pub fn new(cleaner: Cleaner) -> Self {
    Self { cleaner, answer: String::new() }
  }

  /// Feed a backend fragment; returns the text to send now, if any.
  pub fn write(&mut self, fragment: &str) -> Option<String> {
    let released = self.cleaner.write(fragment)?;
    self.answer.push_str(&released);
    Some(released)
  }

  /// Flush the withheld tail; returns non-empty text to send, if any.
  pub fn finish(&mut self) -> Option<String> {
    let rest = self.cleaner.finish().filter(|r| !r.is_empty())?;
    self.answer.push_str(&rest);
    Some(rest)
  }

  pub fn is_cleaned(&self) -> bool { self.cleaner.is_cleaned() }

  pub fn answer(&self) -> &str { &self.answer }

  pub fn into_answer(self) -> String { self.answer }
}
