//! Compaction configuration
//!
//! Values injected into the pipeline entry point. Every field has a default,
//! so a partial JSON document (or none at all) yields a usable configuration.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// Default resampling interval in seconds
pub const DEFAULT_INTERVAL_SECONDS: f64 = 5.0;

/// Default percentile levels for quantile summaries
pub const DEFAULT_QUANTILE_LEVELS: [u32; 5] = [5, 25, 50, 75, 95];

/// Upstream cadence counts one foot; running cadence counts both
pub const DEFAULT_CADENCE_MULTIPLIER: f64 = 2.0;

/// Settings for one compaction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Spacing of the resampling grid (seconds)
    pub interval_seconds: f64,
    /// Percentile levels, ascending, each within 0..=100
    pub quantile_levels: Vec<u32>,
    /// Factor applied to every numeric cadence sample
    pub cadence_multiplier: f64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            quantile_levels: DEFAULT_QUANTILE_LEVELS.to_vec(),
            cadence_multiplier: DEFAULT_CADENCE_MULTIPLIER,
        }
    }
}

impl CompactionConfig {
    /// Default configuration with a different sampling interval
    pub fn with_interval(interval_seconds: f64) -> Self {
        Self {
            interval_seconds,
            ..Self::default()
        }
    }

    /// Sampling tag written into compact records, e.g. `approx_5s`
    pub fn sampling_tag(&self) -> String {
        format!("approx_{}s", self.interval_seconds.trunc() as i64)
    }

    /// Check that the configuration can drive the pipeline
    pub fn validate(&self) -> Result<(), ComputeError> {
        if !self.interval_seconds.is_finite() || self.interval_seconds <= 0.0 {
            return Err(ComputeError::InvalidConfig(format!(
                "interval_seconds must be positive, got {}",
                self.interval_seconds
            )));
        }

        validate_quantile_levels(&self.quantile_levels)?;

        if !self.cadence_multiplier.is_finite() {
            return Err(ComputeError::InvalidConfig(
                "cadence_multiplier must be finite".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from JSON, filling omitted fields with defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Levels must be non-empty, within 0..=100 and strictly ascending
pub fn validate_quantile_levels(levels: &[u32]) -> Result<(), ComputeError> {
    if levels.is_empty() {
        return Err(ComputeError::InvalidConfig(
            "quantile_levels must not be empty".to_string(),
        ));
    }
    if let Some(level) = levels.iter().find(|&&level| level > 100) {
        return Err(ComputeError::InvalidConfig(format!(
            "quantile level {} is outside 0..=100",
            level
        )));
    }
    if levels.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(ComputeError::InvalidConfig(
            "quantile_levels must be strictly ascending".to_string(),
        ));
    }
    Ok(())
}
