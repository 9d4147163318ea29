//! Scoring kernels shared by every backend.
//!
//! Keeping the arithmetic in one place is what makes the in-crate backends
//! rank identically: same score function, same tie-break.

use crate::models::Metric;
use crate::storage::traits::Slot;
use std::cmp::Ordering;

/// Dot product of two equal-length vectors.
#[inline]
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Squared L2 distance between two equal-length vectors.
#[inline]
#[must_use]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// L2 norm accumulated in `f64`, so squaring large finite `f32`
/// components cannot overflow.
fn norm_f64(v: &[f32]) -> f64 {
    v.iter()
        .map(|x| {
            let x = f64::from(*x);
            x * x
        })
        .sum::<f64>()
        .sqrt()
}

/// L2 norm of a vector.
#[inline]
#[must_use]
pub fn norm(v: &[f32]) -> f32 {
    norm_f64(v) as f32
}

/// Normalizes a vector to unit length in place.
///
/// The all-zero vector is left untouched; returns false in that case, and
/// for vectors holding NaN or infinite components.
pub fn normalize(v: &mut [f32]) -> bool {
    let n = norm_f64(v);
    if n == 0.0 || !n.is_finite() {
        return false;
    }
    for x in v.iter_mut() {
        *x = (f64::from(*x) / n) as f32;
    }
    true
}

/// Maps a squared euclidean distance into a similarity in `(0, 1]`.
#[inline]
#[must_use]
pub fn euclidean_score(distance_squared: f32) -> f32 {
    1.0 / (1.0 + distance_squared.max(0.0).sqrt())
}

/// Similarity of `a` and `b` under `metric`; larger is closer.
///
/// Cosine assumes both inputs are already normalized.
#[inline]
#[must_use]
pub fn score(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::Cosine | Metric::InnerProduct => dot(a, b),
        Metric::Euclidean => euclidean_score(l2_squared(a, b)),
    }
}

/// Orders by descending score, then ascending slot. NaN sorts last.
fn compare(a: &(Slot, f32), b: &(Slot, f32)) -> Ordering {
    let sa = if a.1.is_nan() { f32::NEG_INFINITY } else { a.1 };
    let sb = if b.1.is_nan() { f32::NEG_INFINITY } else { b.1 };
    sb.total_cmp(&sa).then(a.0.cmp(&b.0))
}

/// Keeps the best `k` candidates in rank order.
#[must_use]
pub fn top_k(mut scored: Vec<(Slot, f32)>, k: usize) -> Vec<(Slot, f32)> {
    if k == 0 {
        return Vec::new();
    }
    if scored.len() > k {
        scored.select_nth_unstable_by(k - 1, compare);
        scored.truncate(k);
    }
    scored.sort_unstable_by(compare);
    scored
}

/// Brute-force scan over `(slot, row)` pairs.
pub fn scan<'a, I>(metric: Metric, query: &[f32], rows: I, k: usize) -> Vec<(Slot, f32)>
where
    I: IntoIterator<Item = (Slot, &'a [f32])>,
{
    let scored = rows
        .into_iter()
        .map(|(slot, row)| (slot, score(metric, query, row)))
        .collect();
    top_k(scored, k)
}
