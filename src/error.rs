//! Error types for stream compaction

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while compacting streams or handling batch files
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse upstream payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid JSON in {} at line {line}: {source} (content: {content})", .path.display())]
    BatchLine {
        path: PathBuf,
        line: usize,
        content: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid UTF-8 in {} at line {line}: {source}", .path.display())]
    BatchEncoding {
        path: PathBuf,
        line: usize,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Output path {} would overwrite the input batch", .0.display())]
    OutputOverwritesInput(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("min_hr ({min}) must be less than max_hr ({max})")]
    InvalidHeartRateRange { min: u32, max: u32 },
}
