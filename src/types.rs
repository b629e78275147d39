//! Core types for the stream compaction pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw upstream streams, the keyed stream set, the activity-type
//! policy, and the compact per-activity record that ends up in a batch file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Stream type names as reported by the upstream API
pub mod stream_types {
    pub const TIME: &str = "time";
    pub const DISTANCE: &str = "distance";
    pub const LATLNG: &str = "latlng";
    pub const ALTITUDE: &str = "altitude";
    pub const HEARTRATE: &str = "heartrate";
    pub const VELOCITY_SMOOTH: &str = "velocity_smooth";
    pub const CADENCE: &str = "cadence";
    pub const MOVING: &str = "moving";
}

/// Quantile summary key for the pace series derived from time/distance deltas
pub const PACE_QUANTILE_KEY: &str = "pace_s_per_km";

/// Map an upstream stream type to the key used in the quantile summary
pub fn quantile_key(stream_type: &str) -> &str {
    match stream_type {
        stream_types::HEARTRATE => "hr_bpm",
        stream_types::ALTITUDE => "altitude_m",
        stream_types::DISTANCE => "distance_m",
        stream_types::VELOCITY_SMOOTH => "velocity_smooth_ms",
        stream_types::CADENCE => "cadence_spm",
        stream_types::TIME => "time_s",
        other => other,
    }
}

/// A single sample in a raw stream.
///
/// Upstream data mixes numbers, booleans (`moving`), coordinate pairs
/// (`latlng`) and nulls. `Missing` makes the gap explicit instead of relying
/// on a sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamValue {
    Missing,
    Number(f64),
    Flag(bool),
    Text(String),
    Other(serde_json::Value),
}

impl StreamValue {
    /// Numeric value, if this sample is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StreamValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// True unless the sample is missing or an empty string
    pub fn is_meaningful(&self) -> bool {
        match self {
            StreamValue::Missing => false,
            StreamValue::Text(text) => !text.is_empty(),
            _ => true,
        }
    }

    /// Truthiness used by the moving mask
    pub fn is_truthy(&self) -> bool {
        match self {
            StreamValue::Missing => false,
            StreamValue::Number(value) => *value != 0.0,
            StreamValue::Flag(flag) => *flag,
            StreamValue::Text(text) => !text.is_empty(),
            StreamValue::Other(value) => match value {
                serde_json::Value::Array(items) => !items.is_empty(),
                serde_json::Value::Object(map) => !map.is_empty(),
                serde_json::Value::Null => false,
                _ => true,
            },
        }
    }
}

impl From<f64> for StreamValue {
    fn from(value: f64) -> Self {
        StreamValue::Number(value)
    }
}

impl From<bool> for StreamValue {
    fn from(flag: bool) -> Self {
        StreamValue::Flag(flag)
    }
}

impl From<Option<f64>> for StreamValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(StreamValue::Missing, StreamValue::Number)
    }
}

/// One measured quantity for an activity, as delivered by the upstream API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStream {
    #[serde(rename = "type")]
    pub stream_type: String,
    #[serde(default)]
    pub data: Vec<StreamValue>,
}

impl RawStream {
    pub fn new(stream_type: impl Into<String>, data: Vec<StreamValue>) -> Self {
        Self {
            stream_type: stream_type.into(),
            data,
        }
    }

    /// Build a stream from plain numbers
    pub fn numeric(stream_type: impl Into<String>, data: &[f64]) -> Self {
        Self::new(stream_type, data.iter().map(|&v| StreamValue::Number(v)).collect())
    }
}

/// Streams for one activity keyed by stream type.
///
/// At most one entry per type; an absent key means the stream was not
/// provided. Entries are never stored with an empty sequence by the
/// normalizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSet {
    streams: BTreeMap<String, Vec<StreamValue>>,
}

impl StreamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stream_type: &str) -> Option<&[StreamValue]> {
        self.streams.get(stream_type).map(Vec::as_slice)
    }

    pub fn get_mut(&mut self, stream_type: &str) -> Option<&mut Vec<StreamValue>> {
        self.streams.get_mut(stream_type)
    }

    /// Insert or replace a stream
    pub fn insert(&mut self, stream_type: impl Into<String>, data: Vec<StreamValue>) {
        self.streams.insert(stream_type.into(), data);
    }

    pub fn remove(&mut self, stream_type: &str) -> Option<Vec<StreamValue>> {
        self.streams.remove(stream_type)
    }

    pub fn contains(&self, stream_type: &str) -> bool {
        self.streams.contains_key(stream_type)
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[StreamValue])> {
        self.streams
            .iter()
            .map(|(stream_type, data)| (stream_type.as_str(), data.as_slice()))
    }

    pub fn stream_types(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    pub(crate) fn map_streams<F>(self, mut f: F) -> Self
    where
        F: FnMut(Vec<StreamValue>) -> Vec<StreamValue>,
    {
        Self {
            streams: self
                .streams
                .into_iter()
                .map(|(stream_type, data)| (stream_type, f(data)))
                .collect(),
        }
    }
}

/// Activity-level scalar metadata from the upstream API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub id: Option<u64>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    /// Meters
    pub distance: Option<f64>,
    /// Seconds
    pub moving_time: Option<u64>,
    /// Seconds
    pub elapsed_time: Option<u64>,
    /// Meters
    pub total_elevation_gain: Option<f64>,
    /// Meters per second
    pub average_speed: Option<f64>,
    /// Meters per second
    pub max_speed: Option<f64>,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub calories: Option<f64>,
}

/// Activity classification derived from the activity name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Running,
    StairClimb,
    Resting,
}

impl ActivityKind {
    /// Classify by name prefix, case-insensitive and ignoring leading whitespace.
    ///
    /// Names starting with "running" are runs, names starting with "rest" are
    /// resting sessions; everything else (including missing names) is treated
    /// as a stair climb.
    pub fn from_name(name: Option<&str>) -> Self {
        let normalized = name.map(|n| n.trim_start().to_lowercase());
        match normalized.as_deref() {
            Some(n) if n.starts_with("running") => ActivityKind::Running,
            Some(n) if n.starts_with("rest") => ActivityKind::Resting,
            _ => ActivityKind::StairClimb,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Running => "running",
            ActivityKind::StairClimb => "stair_climb",
            ActivityKind::Resting => "resting",
        }
    }

    /// Field inclusion policy for this kind of activity
    pub fn policy(self) -> StreamPolicy {
        match self {
            ActivityKind::Running => StreamPolicy::RUNNING,
            ActivityKind::StairClimb => StreamPolicy::STAIR_CLIMB,
            ActivityKind::Resting => StreamPolicy::RESTING,
        }
    }
}

/// Which filters and fields apply when compacting an activity's streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPolicy {
    pub filter_moving: bool,
    pub include_pace: bool,
    pub include_velocity: bool,
    pub include_altitude: bool,
    pub include_distance_quantiles: bool,
}

impl StreamPolicy {
    pub const RUNNING: StreamPolicy = StreamPolicy {
        filter_moving: true,
        include_pace: true,
        include_velocity: true,
        include_altitude: true,
        include_distance_quantiles: true,
    };

    pub const STAIR_CLIMB: StreamPolicy = StreamPolicy {
        filter_moving: false,
        include_pace: false,
        include_velocity: false,
        include_altitude: true,
        include_distance_quantiles: false,
    };

    pub const RESTING: StreamPolicy = StreamPolicy {
        filter_moving: false,
        include_pace: false,
        include_velocity: false,
        include_altitude: false,
        include_distance_quantiles: false,
    };

    /// Plain sampling of every sensor stream, without the moving mask or
    /// pace/velocity fields
    pub const UNFILTERED: StreamPolicy = StreamPolicy {
        filter_moving: false,
        include_pace: false,
        include_velocity: false,
        include_altitude: true,
        include_distance_quantiles: true,
    };
}

/// Per-sample column of formatted values; `None` marks a missing value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvSeries(pub Vec<Option<String>>);

impl CsvSeries {
    /// Parse a comma-joined column; empty tokens become `None`
    pub fn parse(csv: &str) -> Self {
        CsvSeries(
            csv.split(',')
                .map(|token| {
                    let token = token.trim();
                    (!token.is_empty()).then(|| token.to_string())
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Join with commas, writing missing values as empty strings
    pub fn to_csv(&self) -> String {
        self.0
            .iter()
            .map(|value| value.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromIterator<Option<String>> for CsvSeries {
    fn from_iter<I: IntoIterator<Item = Option<String>>>(iter: I) -> Self {
        CsvSeries(iter.into_iter().collect())
    }
}

/// Resampled streams of one activity as comma-joined columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactStreams {
    /// Sampling tag, e.g. `approx_5s`
    pub sampling: String,
    pub time_s_csv: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pace_s_per_km_csv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hr_bpm_csv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_m_csv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_smooth_ms_csv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadence_spm_csv: Option<String>,
}

impl CompactStreams {
    /// Number of resample points
    pub fn point_count(&self) -> usize {
        CsvSeries::parse(&self.time_s_csv).len()
    }

    /// All present columns with their field names
    pub fn columns(&self) -> Vec<(&'static str, &str)> {
        let mut columns = vec![("time_s_csv", self.time_s_csv.as_str())];
        let optional = [
            ("pace_s_per_km_csv", &self.pace_s_per_km_csv),
            ("hr_bpm_csv", &self.hr_bpm_csv),
            ("alt_m_csv", &self.alt_m_csv),
            ("velocity_smooth_ms_csv", &self.velocity_smooth_ms_csv),
            ("cadence_spm_csv", &self.cadence_spm_csv),
        ];
        for (name, value) in optional {
            if let Some(csv) = value {
                columns.push((name, csv.as_str()));
            }
        }
        columns
    }

    /// True when every present column has one entry per resample point
    pub fn is_aligned(&self) -> bool {
        let points = self.point_count();
        self.columns()
            .iter()
            .all(|(_, csv)| CsvSeries::parse(csv).len() == points)
    }
}

/// Quantile level (percent) to value
pub type LevelValues = BTreeMap<u32, f64>;

/// Quantile key (e.g. `hr_bpm`) to per-level values
pub type QuantileSummary = BTreeMap<String, LevelValues>;

/// Compact streams plus quantiles for one activity, without scalar metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactedStreams {
    #[serde(rename = "streams_compact", default)]
    pub compact: Option<CompactStreams>,
    #[serde(default)]
    pub quantiles: QuantileSummary,
}

impl CompactedStreams {
    pub fn is_empty(&self) -> bool {
        self.compact.is_none() && self.quantiles.is_empty()
    }
}

/// One line of a batch file: scalar metadata plus optional compact streams
/// and quantiles. `None` fields are omitted on serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moving_time_s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_time_s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_elevation_gain_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_speed_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_speed_ms: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_whole_number"
    )]
    pub average_heartrate_bpm: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_whole_number"
    )]
    pub max_heartrate_bpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streams_compact: Option<CompactStreams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantiles: Option<QuantileSummary>,
    /// Top-level fields not known to this crate, kept so rewriting a batch
    /// does not drop them
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Whole values are written without a fractional part (`151`, not `151.0`)
fn serialize_whole_number<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 => {
            serializer.serialize_some(&(*v as i64))
        }
        _ => value.serialize(serializer),
    }
}

/// An upstream activity together with its fetched streams, if any
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityBundle {
    pub activity: ActivitySummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streams: Option<Vec<RawStream>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stream_value_deserialization() {
        let values: Vec<StreamValue> =
            serde_json::from_str(r#"[1, 2.5, null, true, "", [48.1, 11.5]]"#).unwrap();

        assert_eq!(values[0], StreamValue::Number(1.0));
        assert_eq!(values[1], StreamValue::Number(2.5));
        assert_eq!(values[2], StreamValue::Missing);
        assert_eq!(values[3], StreamValue::Flag(true));
        assert_eq!(values[4], StreamValue::Text(String::new()));
        assert!(matches!(values[5], StreamValue::Other(_)));
    }

    #[test]
    fn test_meaningful_and_truthy() {
        assert!(!StreamValue::Missing.is_meaningful());
        assert!(!StreamValue::Text(String::new()).is_meaningful());
        assert!(StreamValue::Flag(false).is_meaningful());
        assert!(StreamValue::Number(0.0).is_meaningful());

        assert!(!StreamValue::Flag(false).is_truthy());
        assert!(!StreamValue::Number(0.0).is_truthy());
        assert!(StreamValue::Number(1.0).is_truthy());
        assert!(StreamValue::Flag(true).is_truthy());
    }

    #[test]
    fn test_activity_kind_from_name() {
        assert_eq!(
            ActivityKind::from_name(Some("  Running 5k (Apple JD)")),
            ActivityKind::Running
        );
        assert_eq!(
            ActivityKind::from_name(Some("Rest 12 (Apple JD)")),
            ActivityKind::Resting
        );
        assert_eq!(
            ActivityKind::from_name(Some("Treppe 3 (Apple JD)")),
            ActivityKind::StairClimb
        );
        assert_eq!(ActivityKind::from_name(None), ActivityKind::StairClimb);
        // Prefix only
        assert_eq!(
            ActivityKind::from_name(Some("Morning running")),
            ActivityKind::StairClimb
        );
    }

    #[test]
    fn test_policy_table() {
        let resting = ActivityKind::Resting.policy();
        assert!(!resting.filter_moving);
        assert!(!resting.include_altitude);

        let stairs = ActivityKind::StairClimb.policy();
        assert!(stairs.include_altitude);
        assert!(!stairs.include_pace);
        assert!(!stairs.include_distance_quantiles);

        assert_eq!(ActivityKind::Running.policy(), StreamPolicy::RUNNING);
    }

    #[test]
    fn test_csv_series_keeps_gaps() {
        let series = CsvSeries::parse("140,,160");
        assert_eq!(series.len(), 3);
        assert_eq!(series.0[1], None);
        assert_eq!(series.to_csv(), "140,,160");
    }

    #[test]
    fn test_compact_streams_alignment() {
        let mut compact = CompactStreams {
            sampling: "approx_5s".to_string(),
            time_s_csv: "0,5,10".to_string(),
            hr_bpm_csv: Some("140,,150".to_string()),
            ..Default::default()
        };
        assert_eq!(compact.point_count(), 3);
        assert!(compact.is_aligned());

        compact.cadence_spm_csv = Some("160,162".to_string());
        assert!(!compact.is_aligned());
    }

    #[test]
    fn test_record_omits_missing_fields() {
        let record = ActivityRecord {
            activity_id: Some(42),
            name: Some("Running".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object.len(), 2);
        assert_eq!(object["activity_id"], 42);
        assert!(!object.contains_key("calories"));
        assert!(!object.contains_key("streams_compact"));
    }

    #[test]
    fn test_record_heart_rate_whole_numbers() {
        let record = ActivityRecord {
            average_heartrate_bpm: Some(237.0),
            max_heartrate_bpm: Some(151.3),
            ..Default::default()
        };
        let json = serde_json::to_string(&record).unwrap();

        assert_eq!(json, r#"{"average_heartrate_bpm":237,"max_heartrate_bpm":151.3}"#);
        let loaded: ActivityRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_record_preserves_unknown_fields() {
        let line = r#"{"activity_id":7,"name":"Rest 1","athlete_tag":"JD"}"#;
        let record: ActivityRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.extra["athlete_tag"], "JD");

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["athlete_tag"], "JD");
    }

    #[test]
    fn test_quantile_levels_serialize_as_strings() {
        let mut levels = LevelValues::new();
        levels.insert(5, 1.0);
        levels.insert(50, 2.0);
        let mut summary = QuantileSummary::new();
        summary.insert("hr_bpm".to_string(), levels);

        let json = serde_json::to_string(&summary).unwrap();
        assert_eq!(json, r#"{"hr_bpm":{"5":1.0,"50":2.0}}"#);

        let back: QuantileSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
