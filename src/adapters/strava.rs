//! Strava payload adapter
//!
//! Parses Strava API responses (activity summaries and activity streams) into
//! the crate's upstream types. Fetching is left to the caller.

use crate::error::ComputeError;
use crate::types::{ActivityBundle, ActivitySummary, RawStream, StreamValue};
use serde::Deserialize;
use serde_json::Value;
use std::io::BufRead;
use tracing::debug;

use super::VendorPayloadAdapter;

/// Strava payload adapter
pub struct StravaAdapter;

impl VendorPayloadAdapter for StravaAdapter {
    /// Accepts the list form `[{"type": "time", "data": [..]}, ..]` and the
    /// keyed form `{"time": {"data": [..]}, ..}` returned with
    /// `key_by_type=true`. Keyed streams come back sorted by type.
    fn parse_streams(&self, raw_json: &str) -> Result<Vec<RawStream>, ComputeError> {
        let value: Value = serde_json::from_str(raw_json)?;
        streams_from_value(value)
    }

    fn parse_activity(&self, raw_json: &str) -> Result<ActivitySummary, ComputeError> {
        Ok(serde_json::from_str(raw_json)?)
    }

    fn parse_activities(&self, raw_json: &str) -> Result<Vec<ActivitySummary>, ComputeError> {
        Ok(serde_json::from_str(raw_json)?)
    }
}

impl StravaAdapter {
    /// Read newline-delimited bundles of `{"activity": {..}, "streams": ..}`.
    ///
    /// `streams` may be absent, null, or either stream payload form. Blank
    /// lines are skipped; a bad line fails with its 1-based line number.
    pub fn read_bundles<R: BufRead>(&self, reader: R) -> Result<Vec<ActivityBundle>, ComputeError> {
        let mut bundles = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let bundle = parse_bundle(trimmed).map_err(|e| {
                ComputeError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
            })?;
            bundles.push(bundle);
        }
        debug!(bundles = bundles.len(), "read activity bundles");
        Ok(bundles)
    }
}

fn parse_bundle(line: &str) -> Result<ActivityBundle, ComputeError> {
    let raw: RawBundle = serde_json::from_str(line)?;
    let streams = match raw.streams {
        None | Some(Value::Null) => None,
        Some(value) => Some(streams_from_value(value)?),
    };
    Ok(ActivityBundle {
        activity: raw.activity,
        streams,
    })
}

fn streams_from_value(value: Value) -> Result<Vec<RawStream>, ComputeError> {
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        Value::Object(map) => {
            // serde_json's default map keeps keys sorted
            map.into_iter()
                .map(|(stream_type, entry)| {
                    let keyed: KeyedStream = serde_json::from_value(entry)?;
                    Ok(RawStream::new(stream_type, keyed.data))
                })
                .collect()
        }
        other => Err(ComputeError::ParseError(format!(
            "expected stream list or keyed stream object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// Strava API response structures

#[derive(Debug, Deserialize)]
struct RawBundle {
    activity: ActivitySummary,
    #[serde(default)]
    streams: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct KeyedStream {
    #[serde(default)]
    data: Vec<StreamValue>,
}
