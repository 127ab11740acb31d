//! Vector similarity used to rank knowledge passages.

/// Cosine similarity of `a` and `b`.
///
/// Returns `None` when the dimensions differ (e.g. passages embedded by a
/// different model) and `0.0` when either vector has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> Option<f32> {
  if a.len() != b.len() {
    return None;
  }

  let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
  for (x, y) in a.iter().zip(b) {
    dot += x * y;
    norm_a += x * x;
    norm_b += y * y;
  }

  if norm_a == 0.0 || norm_b == 0.0 {
    return Some(0.0);
  }
  Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
