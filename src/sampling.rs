//! Resampling onto a fixed time grid
//!
//! Picks, for every multiple of the interval up to the last observed time,
//! the index of the nearest actual sample. Other streams are then read at
//! exactly those indices.

use crate::types::StreamValue;
use std::collections::HashSet;

/// Indices of the samples nearest to 0, interval, 2·interval, ... up to the
/// last observed time (inclusive).
///
/// Equidistant candidates resolve to the lower index. Consecutive grid
/// points that land on the same sample are collapsed, keeping first
/// occurrence order. Samples without a time value are never selected.
pub fn find_sample_indices(time: &[Option<f64>], interval_seconds: f64) -> Vec<usize> {
    if !(interval_seconds.is_finite() && interval_seconds > 0.0) {
        return Vec::new();
    }
    let max_time = match time.iter().rev().find_map(|t| *t) {
        Some(t) => t,
        None => return Vec::new(),
    };

    let mut indices: Vec<usize> = Vec::new();
    let mut seen: HashSet<usize> = HashSet::new();
    let mut target = 0.0;
    while target <= max_time {
        if let Some(idx) = nearest_index(time, target) {
            if seen.insert(idx) {
                indices.push(idx);
            }
        }
        target += interval_seconds;
    }
    indices
}

/// First index with the smallest distance to `target`
fn nearest_index(time: &[Option<f64>], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, t) in time.iter().enumerate() {
        let Some(t) = t else { continue };
        let distance = (t - target).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((idx, distance)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Numeric values of `data` at `indices`; out-of-range or non-numeric
/// entries become `None`
pub fn sample_numeric(data: &[StreamValue], indices: &[usize]) -> Vec<Option<f64>> {
    indices
        .iter()
        .map(|&idx| data.get(idx).and_then(StreamValue::as_f64))
        .collect()
}

/// Time values at `indices`
pub fn sample_time(time: &[Option<f64>], indices: &[usize]) -> Vec<Option<f64>> {
    indices
        .iter()
        .map(|&idx| time.get(idx).copied().flatten())
        .collect()
}
