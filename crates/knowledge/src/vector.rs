//! Vector similarity utilities.

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1]. Returns 0.0 for empty, zero-norm or
/// mismatched-length inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |acc, (x, y)| {
        let (x, y) = (*x as f64, *y as f64);
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Score every item against `query` and keep the best `limit`, best first.
///
/// Returns `(score, &item)` pairs. No threshold is applied.
pub fn top_k<'a, T>(
    items: &'a [T],
    query: &[f32],
    limit: usize,
    embedding: impl Fn(&T) -> &[f32],
) -> Vec<(f32, &'a T)> {
    let mut scored: Vec<(f32, &T)> = items
        .iter()
        .map(|item| (cosine_similarity(embedding(item), query), item))
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}
