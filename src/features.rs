//! Derived series
//!
//! This module derives secondary values from normalized streams:
//! - Per-sample pace over the resampled points
//! - Quantile summaries over full-resolution streams
//! - Pace quantiles from consecutive full-resolution time/distance deltas

use crate::numeric::{extract_numeric, format_rounded, quantile_levels};
use crate::types::{
    quantile_key, stream_types, CsvSeries, LevelValues, QuantileSummary, StreamSet, StreamValue,
};

/// Seconds per kilometer from a time delta (s) and distance delta (m).
///
/// `None` unless both deltas are positive.
fn pace_from_deltas(dt: f64, dd: f64) -> Option<f64> {
    (dt > 0.0 && dd > 0.0).then(|| dt / dd * 1000.0)
}

/// Pace at each resampled point, in whole seconds per kilometer.
///
/// Each point uses the delta to the previous point; the first point uses
/// the delta to the next one. Missing values or non-positive deltas leave a
/// gap at that position.
pub fn compute_pace_series(
    sampled_time: &[Option<f64>],
    sampled_distance: &[Option<f64>],
) -> CsvSeries {
    let pace_between = |from: usize, to: usize| -> Option<String> {
        let t_from = (*sampled_time.get(from)?)?;
        let t_to = (*sampled_time.get(to)?)?;
        let d_from = (*sampled_distance.get(from)?)?;
        let d_to = (*sampled_distance.get(to)?)?;
        pace_from_deltas(t_to - t_from, d_to - d_from).map(format_rounded)
    };

    (0..sampled_time.len())
        .map(|i| {
            if i == 0 {
                pace_between(0, 1)
            } else {
                pace_between(i - 1, i)
            }
        })
        .collect()
}

/// Quantiles of every stream with at least one numeric value, keyed by the
/// renamed stream key. `velocity_smooth` is only summarized when
/// `include_velocity` is set.
pub fn compute_quantiles(
    streams: &StreamSet,
    include_velocity: bool,
    levels: &[u32],
) -> QuantileSummary {
    let mut summary = QuantileSummary::new();

    for (stream_type, data) in streams.iter() {
        if stream_type == stream_types::VELOCITY_SMOOTH && !include_velocity {
            continue;
        }
        let values: Vec<f64> = extract_numeric(data).collect();
        if let Some(levels) = quantile_levels(&values, levels) {
            summary.insert(quantile_key(stream_type).to_string(), levels);
        }
    }

    summary
}

/// Quantiles of the pace implied by every consecutive full-resolution pair
/// of samples with positive time and distance deltas
pub fn compute_pace_quantiles(
    time: &[Option<f64>],
    distance: &[StreamValue],
    levels: &[u32],
) -> Option<LevelValues> {
    let raw_paces: Vec<f64> = (1..time.len())
        .filter_map(|i| {
            let dt = time[i]? - time[i - 1]?;
            let dd = distance.get(i)?.as_f64()? - distance.get(i - 1)?.as_f64()?;
            pace_from_deltas(dt, dd)
        })
        .collect();

    quantile_levels(&raw_paces, levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LEVELS: [u32; 5] = [5, 25, 50, 75, 95];

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|&v| Some(v)).collect()
    }

    #[test]
    fn test_pace_series_first_point_looks_ahead() {
        let pace = compute_pace_series(&some(&[0.0, 5.0, 10.0]), &some(&[0.0, 50.0, 100.0]));
        assert_eq!(pace.to_csv(), "100,100,100");
    }

    #[test]
    fn test_pace_series_gaps() {
        let time = some(&[0.0, 5.0, 10.0, 15.0]);
        // Stationary between points 1 and 2, missing distance at point 3
        let distance = vec![Some(0.0), Some(20.0), Some(20.0), None];
        let pace = compute_pace_series(&time, &distance);
        assert_eq!(pace.0, vec![Some("250".to_string()), Some("250".to_string()), None, None]);
    }

    #[test]
    fn test_pace_series_single_point() {
        let pace = compute_pace_series(&some(&[0.0]), &some(&[0.0]));
        assert_eq!(pace.0, vec![None]);
    }

    #[test]
    fn test_quantiles_per_stream() {
        let mut streams = StreamSet::new();
        streams.insert(
            "heartrate",
            vec![
                StreamValue::Number(100.0),
                StreamValue::Missing,
                StreamValue::Number(200.0),
            ],
        );
        streams.insert("velocity_smooth", vec![StreamValue::Number(3.0)]);
        streams.insert("latlng", vec![StreamValue::Other(serde_json::json!([48.1, 11.5]))]);

        let summary = compute_quantiles(&streams, false, &LEVELS);

        assert_eq!(summary.len(), 1);
        let hr = &summary["hr_bpm"];
        assert_eq!(hr[&5], 105.0);
        assert_eq!(hr[&50], 150.0);
        assert_eq!(hr[&95], 195.0);

        let summary = compute_quantiles(&streams, true, &LEVELS);
        assert!(summary.contains_key("velocity_smooth_ms"));
    }

    #[test]
    fn test_quantiles_with_custom_levels() {
        let mut streams = StreamSet::new();
        streams.insert(
            "cadence",
            vec![StreamValue::Number(160.0), StreamValue::Number(170.0)],
        );

        let summary = compute_quantiles(&streams, true, &[0, 100]);
        let cadence = &summary["cadence_spm"];
        assert_eq!(cadence.len(), 2);
        assert_eq!(cadence[&0], 160.0);
        assert_eq!(cadence[&100], 170.0);
    }

    #[test]
    fn test_quantiles_skip_out_of_range_levels() {
        let mut streams = StreamSet::new();
        streams.insert("heartrate", vec![StreamValue::Number(120.0)]);

        assert!(compute_quantiles(&streams, true, &[50, 150]).is_empty());
    }

    #[test]
    fn test_pace_quantiles_use_full_resolution() {
        let time = some(&[0.0, 1.0, 2.0, 3.0, 3.0]);
        let distance = vec![
            StreamValue::Number(0.0),
            StreamValue::Number(4.0),
            StreamValue::Number(4.0),
            StreamValue::Number(9.0),
            StreamValue::Number(20.0),
        ];
        // Pairs: (1s, 4m) -> 250, (1s, 0m) skipped, (1s, 5m) -> 200, (0s, ..) skipped
        let levels = compute_pace_quantiles(&time, &distance, &[0, 50, 100]).unwrap();
        assert_eq!(levels[&0], 200.0);
        assert_eq!(levels[&50], 225.0);
        assert_eq!(levels[&100], 250.0);
    }

    #[test]
    fn test_pace_quantiles_none_without_movement() {
        let time = some(&[0.0, 1.0]);
        let distance = vec![StreamValue::Number(5.0), StreamValue::Number(5.0)];
        assert!(compute_pace_quantiles(&time, &distance, &LEVELS).is_none());
    }
}
