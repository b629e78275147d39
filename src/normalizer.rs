//! Stream normalization
//!
//! This module turns the raw upstream stream list of one activity into a
//! normalized stream set:
//! - Keyed by stream type, empty streams dropped
//! - Optionally restricted to samples where the athlete was moving
//! - Cadence converted to steps per minute for both feet
//! - Time rebased to start at zero

use crate::numeric::is_numeric;
use crate::types::{stream_types, RawStream, StreamPolicy, StreamSet, StreamValue};
use tracing::debug;

/// Stream set with a rebased time axis
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedStreams {
    /// All remaining streams, `time` included (rebased)
    pub streams: StreamSet,
    /// Rebased time in seconds; `None` where the upstream sample was not numeric
    pub time: Vec<Option<f64>>,
}

/// Normalizer for a single activity's streams
#[derive(Debug, Clone, Copy)]
pub struct StreamNormalizer {
    cadence_multiplier: f64,
}

impl StreamNormalizer {
    pub fn new(cadence_multiplier: f64) -> Self {
        Self { cadence_multiplier }
    }

    /// Run every normalization step in order.
    ///
    /// Returns `None` when no usable data remains: the moving mask excluded
    /// every sample, or there is no time stream to anchor the series.
    pub fn normalize(&self, raw: &[RawStream], policy: StreamPolicy) -> Option<NormalizedStreams> {
        let mut streams = to_stream_set(raw);

        if policy.filter_moving {
            streams = filter_by_moving(streams);
            if streams.is_empty() {
                debug!("moving mask excluded every sample");
                return None;
            }
        }

        drop_moving_field(&mut streams);
        scale_cadence(&mut streams, self.cadence_multiplier);
        rebase_time(streams)
    }
}

/// Build a stream set from the upstream list; streams without data are dropped
pub fn to_stream_set(raw: &[RawStream]) -> StreamSet {
    let mut streams = StreamSet::new();
    for stream in raw {
        if stream.stream_type.is_empty() || stream.data.is_empty() {
            continue;
        }
        streams.insert(stream.stream_type.clone(), stream.data.clone());
    }
    streams
}

/// Restrict every stream to the indices where `moving` is truthy.
///
/// A set without a `moving` stream, or whose `moving` stream holds only
/// missing values, passes through unchanged. If `moving` has values but none
/// of them is truthy the result is empty.
pub fn filter_by_moving(streams: StreamSet) -> StreamSet {
    let moving_indices: Vec<usize> = match streams.get(stream_types::MOVING) {
        Some(moving) if moving.iter().any(StreamValue::is_meaningful) => moving
            .iter()
            .enumerate()
            .filter(|(_, value)| value.is_truthy())
            .map(|(idx, _)| idx)
            .collect(),
        _ => return streams,
    };

    if moving_indices.is_empty() {
        return StreamSet::new();
    }

    streams.map_streams(|data| {
        moving_indices
            .iter()
            .filter_map(|&idx| data.get(idx).cloned())
            .collect()
    })
}

/// Remove the `moving` mask; it never reaches the compact record
pub fn drop_moving_field(streams: &mut StreamSet) {
    streams.remove(stream_types::MOVING);
}

/// Multiply every numeric cadence sample; other samples pass through
pub fn scale_cadence(streams: &mut StreamSet, multiplier: f64) {
    if let Some(cadence) = streams.get_mut(stream_types::CADENCE) {
        for value in cadence.iter_mut() {
            if let StreamValue::Number(v) = value {
                *v *= multiplier;
            }
        }
    }
}

/// Subtract the first time value from every time sample.
///
/// Returns `None` when the time stream is absent, empty, or does not start
/// with a numeric value.
pub fn rebase_time(mut streams: StreamSet) -> Option<NormalizedStreams> {
    let time = streams.get(stream_types::TIME)?;
    let offset = match time.first() {
        Some(first) if is_numeric(first) => first.as_f64()?,
        _ => {
            debug!("time stream missing or not anchored by a numeric sample");
            return None;
        }
    };

    let rebased: Vec<Option<f64>> = time
        .iter()
        .map(|value| {
            if is_numeric(value) {
                value.as_f64().map(|t| t - offset)
            } else {
                None
            }
        })
        .collect();

    streams.insert(
        stream_types::TIME,
        rebased.iter().copied().map(StreamValue::from).collect(),
    );

    Some(NormalizedStreams {
        streams,
        time: rebased,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbers(values: &[f64]) -> Vec<StreamValue> {
        values.iter().map(|&v| StreamValue::Number(v)).collect()
    }

    fn flags(values: &[bool]) -> Vec<StreamValue> {
        values.iter().map(|&v| StreamValue::Flag(v)).collect()
    }

    #[test]
    fn test_to_stream_set_drops_empty_streams() {
        let raw = vec![
            RawStream::numeric("time", &[0.0, 1.0]),
            RawStream::new("heartrate", vec![]),
        ];
        let streams = to_stream_set(&raw);

        assert!(streams.contains("time"));
        assert!(!streams.contains("heartrate"));
        assert_eq!(streams.len(), 1);
    }

    #[test]
    fn test_filter_without_moving_is_identity() {
        let mut streams = StreamSet::new();
        streams.insert("time", numbers(&[0.0, 1.0, 2.0]));
        streams.insert("heartrate", numbers(&[120.0, 121.0, 122.0]));

        assert_eq!(filter_by_moving(streams.clone()), streams);
    }

    #[test]
    fn test_filter_with_all_null_moving_is_identity() {
        let mut streams = StreamSet::new();
        streams.insert("time", numbers(&[0.0, 1.0]));
        streams.insert("moving", vec![StreamValue::Missing, StreamValue::Missing]);

        assert_eq!(filter_by_moving(streams.clone()), streams);
    }

    #[test]
    fn test_filter_with_all_false_moving_is_empty() {
        let mut streams = StreamSet::new();
        streams.insert("time", numbers(&[0.0, 1.0, 2.0]));
        streams.insert("moving", flags(&[false, false, false]));

        assert!(filter_by_moving(streams).is_empty());
    }

    #[test]
    fn test_filter_subsets_each_stream() {
        let mut streams = StreamSet::new();
        streams.insert("time", numbers(&[0.0, 1.0, 2.0, 3.0]));
        // Shorter than the mask: index 3 is skipped, not padded
        streams.insert("heartrate", numbers(&[120.0, 121.0, 122.0]));
        streams.insert("moving", flags(&[true, false, true, true]));

        let filtered = filter_by_moving(streams);

        assert_eq!(filtered.get("time").unwrap(), numbers(&[0.0, 2.0, 3.0]).as_slice());
        assert_eq!(filtered.get("heartrate").unwrap(), numbers(&[120.0, 122.0]).as_slice());
    }

    #[test]
    fn test_scale_cadence_skips_missing() {
        let mut streams = StreamSet::new();
        streams.insert(
            "cadence",
            vec![
                StreamValue::Number(80.0),
                StreamValue::Number(82.0),
                StreamValue::Missing,
                StreamValue::Number(84.0),
            ],
        );

        scale_cadence(&mut streams, 2.0);

        assert_eq!(
            streams.get("cadence").unwrap(),
            &[
                StreamValue::Number(160.0),
                StreamValue::Number(164.0),
                StreamValue::Missing,
                StreamValue::Number(168.0),
            ]
        );
    }

    #[test]
    fn test_rebase_time() {
        let mut streams = StreamSet::new();
        streams.insert(
            "time",
            vec![
                StreamValue::Number(100.0),
                StreamValue::Missing,
                StreamValue::Number(105.0),
            ],
        );

        let normalized = rebase_time(streams).unwrap();

        assert_eq!(normalized.time, vec![Some(0.0), None, Some(5.0)]);
        assert_eq!(
            normalized.streams.get("time").unwrap(),
            &[StreamValue::Number(0.0), StreamValue::Missing, StreamValue::Number(5.0)]
        );
    }

    #[test]
    fn test_rebase_requires_time() {
        let mut streams = StreamSet::new();
        streams.insert("heartrate", numbers(&[120.0]));
        assert!(rebase_time(streams).is_none());

        let mut streams = StreamSet::new();
        streams.insert("time", vec![StreamValue::Missing, StreamValue::Number(1.0)]);
        assert!(rebase_time(streams).is_none());
    }

    #[test]
    fn test_normalize_drops_moving_and_respects_policy() {
        let raw = vec![
            RawStream::numeric("time", &[10.0, 11.0, 12.0]),
            RawStream::new("moving", flags(&[false, true, true])),
        ];
        let normalizer = StreamNormalizer::new(2.0);

        let running = normalizer.normalize(&raw, StreamPolicy::RUNNING).unwrap();
        assert!(!running.streams.contains("moving"));
        assert_eq!(running.time, vec![Some(0.0), Some(1.0)]);

        let resting = normalizer.normalize(&raw, StreamPolicy::RESTING).unwrap();
        assert!(!resting.streams.contains("moving"));
        assert_eq!(resting.time, vec![Some(0.0), Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_normalize_with_stationary_run_yields_nothing() {
        let raw = vec![
            RawStream::numeric("time", &[0.0, 1.0]),
            RawStream::new("moving", flags(&[false, false])),
        ];
        let normalizer = StreamNormalizer::new(2.0);
        assert!(normalizer.normalize(&raw, StreamPolicy::RUNNING).is_none());
    }
}
