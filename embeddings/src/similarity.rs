//! Vector math shared by the index backends.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;

use crate::error::{EmbeddingError, Result};

/// Cosine of the angle between `a` and `b`, in `[-1.0, 1.0]`.
///
/// A zero vector scores 0.0 against anything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dimensions(a, b)?;
    let (norm_a, norm_b) = (magnitude(a), magnitude(b));
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    Ok(dot / (norm_a * norm_b))
}

/// Squared L2 distance; the flat backend turns it into `1 / (1 + d)`.
pub fn squared_euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dimensions(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum())
}

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit length in place. Zero vectors stay zero.
pub fn normalize(v: &mut [f32]) {
    let norm = magnitude(v);
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// The `k` candidates most cosine-similar to `query`, best first.
///
/// Equal scores keep candidate order.
pub fn top_k_by_cosine<'a, I>(
    query: &[f32],
    candidates: impl IntoIterator<Item = (I, &'a [f32])>,
    k: usize,
) -> Result<Vec<(I, f32)>> {
    let mut scored = candidates
        .into_iter()
        .map(|(id, vector)| Ok((id, cosine_similarity(query, vector)?)))
        .collect::<Result<Vec<_>>>()?;
    scored.sort_by_key(|(_, score)| Reverse(OrderedFloat(*score)));
    scored.truncate(k);
    Ok(scored)
}

fn check_dimensions(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() == b.len() {
        Ok(())
    } else {
        Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cosine_bounds() {
        assert_eq!(cosine_similarity(&[2.0, 0.0], &[5.0, 0.0]).unwrap(), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-3.0, 0.0]).unwrap(), -1.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_mismatched_lengths_are_rejected() {
        let err = cosine_similarity(&[1.0], &[1.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 1,
                actual: 2
            }
        ));
        assert!(squared_euclidean_distance(&[1.0, 0.0], &[1.0]).is_err());
    }

    #[test]
    fn test_squared_distance_and_normalize() {
        assert_eq!(squared_euclidean_distance(&[1.0, 1.0], &[4.0, 5.0]).unwrap(), 25.0);

        let mut v = vec![0.0, 3.0, 4.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.6, 0.8]);

        let mut zero = vec![0.0; 3];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0; 3]);
    }

    #[test]
    fn test_top_k_keeps_candidate_order_on_ties() {
        let rows: [(u64, Vec<f32>); 4] = [
            (7, vec![0.0, 1.0]),
            (3, vec![1.0, 0.0]),
            (9, vec![2.0, 0.0]),
            (1, vec![1.0, 1.0]),
        ];
        let ranked =
            top_k_by_cosine(&[1.0, 0.0], rows.iter().map(|(id, v)| (*id, v.as_slice())), 3).unwrap();
        let ids: Vec<u64> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![3, 9, 1]);
    }
}
