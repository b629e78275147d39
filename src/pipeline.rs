//! Pipeline orchestration
//!
//! This module provides the public API for stream compaction.
//! It orchestrates the full pipeline from raw upstream streams to batch records.

use crate::config::CompactionConfig;
use crate::encoder::{apply_policy, RecordEncoder};
use crate::error::ComputeError;
use crate::features::{compute_pace_quantiles, compute_quantiles};
use crate::normalizer::StreamNormalizer;
use crate::sampling::find_sample_indices;
use crate::types::{
    stream_types, ActivityKind, ActivityRecord, ActivitySummary, CompactedStreams, RawStream,
    StreamPolicy, PACE_QUANTILE_KEY,
};
use std::collections::HashMap;
use tracing::{debug, info};

/// Build the batch record for one activity with the default configuration.
///
/// # Arguments
/// * `activity` - Scalar activity metadata from the upstream API
/// * `streams` - Raw streams for the activity, if they were fetched
///
/// # Example
/// ```ignore
/// let record = activity_to_record(&activity, Some(&streams));
/// let line = serde_json::to_string(&record)?;
/// ```
pub fn activity_to_record(activity: &ActivitySummary, streams: Option<&[RawStream]>) -> ActivityRecord {
    StreamCompactor::default().build_record(activity, streams)
}

/// Build one record per activity with the default configuration, looking
/// streams up by activity id.
pub fn combine_activities(
    activities: &[ActivitySummary],
    streams_by_id: &HashMap<u64, Vec<RawStream>>,
) -> Vec<ActivityRecord> {
    StreamCompactor::default().combine_activities(activities, streams_by_id)
}

/// Compactor holding an injected configuration.
///
/// Pipeline stages per activity:
/// 1. StreamNormalizer - Key streams, apply moving mask, scale cadence, rebase time
/// 2. Features - Quantiles over full-resolution streams, pace quantiles
/// 3. Sampling - Nearest-sample indices on the fixed grid
/// 4. RecordEncoder - Compact columns, type policy, metadata merge
#[derive(Debug, Clone)]
pub struct StreamCompactor {
    config: CompactionConfig,
    normalizer: StreamNormalizer,
    encoder: RecordEncoder,
}

impl Default for StreamCompactor {
    fn default() -> Self {
        Self::from_valid_config(CompactionConfig::default())
    }
}

impl StreamCompactor {
    /// Create a compactor, rejecting configurations the pipeline cannot run
    pub fn new(config: CompactionConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: CompactionConfig) -> Self {
        Self {
            normalizer: StreamNormalizer::new(config.cadence_multiplier),
            encoder: RecordEncoder::new(config.sampling_tag()),
            config,
        }
    }

    pub fn config(&self) -> &CompactionConfig {
        &self.config
    }

    /// Compact streams under an explicit policy.
    ///
    /// Returns an empty result when there is nothing to sample: no streams,
    /// no time stream, a run with no moving samples, or no grid point.
    pub fn compact_with_policy(&self, raw: &[RawStream], policy: StreamPolicy) -> CompactedStreams {
        if raw.is_empty() {
            return CompactedStreams::default();
        }

        let Some(normalized) = self.normalizer.normalize(raw, policy) else {
            debug!("no usable time axis, skipping compaction");
            return CompactedStreams::default();
        };

        let levels = &self.config.quantile_levels;
        let mut quantiles = compute_quantiles(&normalized.streams, policy.include_velocity, levels);

        if policy.include_pace {
            if let Some(distance) = normalized.streams.get(stream_types::DISTANCE) {
                if let Some(pace) = compute_pace_quantiles(&normalized.time, distance, levels) {
                    quantiles.insert(PACE_QUANTILE_KEY.to_string(), pace);
                }
            }
        }

        let indices = find_sample_indices(&normalized.time, self.config.interval_seconds);
        if indices.is_empty() {
            debug!("time axis produced no sample points");
            return CompactedStreams::default();
        }

        let compact = self.encoder.encode_compact(&normalized, &indices, policy);
        debug!(
            points = indices.len(),
            streams = normalized.streams.len(),
            "compacted activity streams"
        );

        let mut compacted = CompactedStreams {
            compact: Some(compact),
            quantiles,
        };
        apply_policy(&mut compacted, policy);
        compacted
    }

    /// Sample with the moving mask and pace/velocity fields
    pub fn sample_at_intervals(&self, raw: &[RawStream]) -> CompactedStreams {
        self.compact_with_policy(raw, StreamPolicy::RUNNING)
    }

    /// Sample every sensor stream without the moving mask; no pace or
    /// velocity fields
    pub fn sample_without_moving_filter(&self, raw: &[RawStream]) -> CompactedStreams {
        self.compact_with_policy(raw, StreamPolicy::UNFILTERED)
    }

    /// Compact streams using the policy implied by the activity name
    pub fn compact_for_activity(&self, raw: &[RawStream], activity_name: Option<&str>) -> CompactedStreams {
        let kind = ActivityKind::from_name(activity_name);
        debug!(kind = kind.as_str(), "classified activity");
        self.compact_with_policy(raw, kind.policy())
    }

    /// Build the batch record for one activity.
    ///
    /// Without streams (or with an empty list) the record carries scalar
    /// metadata only.
    pub fn build_record(&self, activity: &ActivitySummary, streams: Option<&[RawStream]>) -> ActivityRecord {
        let compacted = streams
            .filter(|raw| !raw.is_empty())
            .map(|raw| self.compact_for_activity(raw, activity.name.as_deref()));

        self.encoder.encode_record(activity, compacted)
    }

    /// Build one record per activity, in input order
    pub fn combine_activities(
        &self,
        activities: &[ActivitySummary],
        streams_by_id: &HashMap<u64, Vec<RawStream>>,
    ) -> Vec<ActivityRecord> {
        let records: Vec<ActivityRecord> = activities
            .iter()
            .map(|activity| {
                let streams = activity
                    .id
                    .and_then(|id| streams_by_id.get(&id))
                    .map(Vec::as_slice);
                self.build_record(activity, streams)
            })
            .collect();

        let with_streams = records.iter().filter(|r| r.streams_compact.is_some()).count();
        info!(
            activities = records.len(),
            with_streams, "combined activities into records"
        );
        records
    }
}
