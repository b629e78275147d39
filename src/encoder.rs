//! Record encoding
//!
//! This module turns sampled streams into comma-joined columns and merges
//! them with activity metadata into the record written to a batch file.
//! Activity-type field suppression happens here, after sampling.

use crate::features::compute_pace_series;
use crate::normalizer::NormalizedStreams;
use crate::numeric::format_rounded;
use crate::sampling::{sample_numeric, sample_time};
use crate::types::{
    quantile_key, stream_types, ActivityRecord, ActivitySummary, CompactStreams, CompactedStreams,
    CsvSeries, StreamPolicy,
};

/// Encoder for compact stream columns and batch records
#[derive(Debug, Clone)]
pub struct RecordEncoder {
    sampling_tag: String,
}

impl RecordEncoder {
    /// Create an encoder that stamps records with the given sampling tag
    pub fn new(sampling_tag: impl Into<String>) -> Self {
        Self {
            sampling_tag: sampling_tag.into(),
        }
    }

    /// Build compact columns for the streams at `indices`.
    ///
    /// Pace and velocity are only produced when the policy includes them and
    /// the source stream exists. Every column has one entry per index.
    pub fn encode_compact(
        &self,
        normalized: &NormalizedStreams,
        indices: &[usize],
        policy: StreamPolicy,
    ) -> CompactStreams {
        let streams = &normalized.streams;
        let sampled_time = sample_time(&normalized.time, indices);

        let integer_column = |stream_type: &str| -> Option<String> {
            streams
                .get(stream_type)
                .map(|data| format_integers(&sample_numeric(data, indices)).to_csv())
        };

        let pace_s_per_km_csv = if policy.include_pace {
            streams.get(stream_types::DISTANCE).map(|distance| {
                compute_pace_series(&sampled_time, &sample_numeric(distance, indices)).to_csv()
            })
        } else {
            None
        };

        let velocity_smooth_ms_csv = if policy.include_velocity {
            streams
                .get(stream_types::VELOCITY_SMOOTH)
                .map(|data| format_velocity(&sample_numeric(data, indices)).to_csv())
        } else {
            None
        };

        CompactStreams {
            sampling: self.sampling_tag.clone(),
            time_s_csv: format_integers(&sampled_time).to_csv(),
            pace_s_per_km_csv,
            hr_bpm_csv: integer_column(stream_types::HEARTRATE),
            alt_m_csv: integer_column(stream_types::ALTITUDE),
            velocity_smooth_ms_csv,
            cadence_spm_csv: integer_column(stream_types::CADENCE),
        }
    }

    /// Merge compact streams and quantiles into a record with the
    /// activity's scalar metadata. Empty compact output adds no keys.
    pub fn encode_record(
        &self,
        activity: &ActivitySummary,
        compacted: Option<CompactedStreams>,
    ) -> ActivityRecord {
        let (streams_compact, quantiles) = match compacted {
            Some(compacted) => (
                compacted.compact,
                Some(compacted.quantiles).filter(|q| !q.is_empty()),
            ),
            None => (None, None),
        };

        ActivityRecord {
            activity_id: activity.id,
            name: activity.name.clone(),
            activity_type: activity.activity_type.clone(),
            start_date: activity.start_date,
            distance_m: activity.distance,
            moving_time_s: activity.moving_time,
            elapsed_time_s: activity.elapsed_time,
            total_elevation_gain_m: activity.total_elevation_gain,
            average_speed_ms: activity.average_speed,
            max_speed_ms: activity.max_speed,
            average_heartrate_bpm: activity.average_heartrate,
            max_heartrate_bpm: activity.max_heartrate,
            calories: activity.calories,
            streams_compact,
            quantiles,
            extra: serde_json::Map::new(),
        }
    }
}

/// Drop the fields an activity type excludes: distance quantiles unless the
/// policy keeps them, altitude column and quantiles unless altitude is
/// included
pub fn apply_policy(compacted: &mut CompactedStreams, policy: StreamPolicy) {
    if !policy.include_distance_quantiles {
        compacted
            .quantiles
            .remove(quantile_key(stream_types::DISTANCE));
    }
    if !policy.include_altitude {
        if let Some(compact) = compacted.compact.as_mut() {
            compact.alt_m_csv = None;
        }
        compacted
            .quantiles
            .remove(quantile_key(stream_types::ALTITUDE));
    }
}

/// Whole numbers, ties to even; gaps stay empty
pub fn format_integers(values: &[Option<f64>]) -> CsvSeries {
    values.iter().map(|v| v.map(format_rounded)).collect()
}

/// Two decimal places; gaps stay empty
pub fn format_velocity(values: &[Option<f64>]) -> CsvSeries {
    values.iter().map(|v| v.map(|v| format!("{:.2}", v))).collect()
}
