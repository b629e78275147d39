//! Upstream payload adapters
//!
//! This module provides adapters that parse raw upstream API payloads into the
//! activity and stream types consumed by the compaction pipeline.

mod strava;

pub use strava::StravaAdapter;

use crate::error::ComputeError;
use crate::types::{ActivitySummary, RawStream};

/// Trait for upstream payload adapters
pub trait VendorPayloadAdapter {
    /// Parse a stream payload for one activity
    fn parse_streams(&self, raw_json: &str) -> Result<Vec<RawStream>, ComputeError>;

    /// Parse a single activity
    fn parse_activity(&self, raw_json: &str) -> Result<ActivitySummary, ComputeError>;

    /// Parse a list of activities
    fn parse_activities(&self, raw_json: &str) -> Result<Vec<ActivitySummary>, ComputeError>;
}
