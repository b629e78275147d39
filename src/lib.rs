//! Stream Compact - Fixed-interval compaction of fitness activity streams
//!
//! Turns an activity's raw sensor streams into a compact record through a
//! deterministic pipeline: upstream adaptation → normalization → quantile
//! derivation → nearest-sample resampling → record encoding.
//!
//! Records are written one per line to JSONL batch files, which can be
//! summarized or have their heart-rate data replaced with synthetic values.

pub mod adapters;
pub mod batch;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod normalizer;
pub mod numeric;
pub mod pipeline;
pub mod sampling;
pub mod summary;
pub mod types;

pub use adapters::{StravaAdapter, VendorPayloadAdapter};
pub use batch::{load_batch, randomize_heart_rate, save_batch, HeartRateRandomizer};
pub use config::CompactionConfig;
pub use error::ComputeError;
pub use pipeline::{activity_to_record, combine_activities, StreamCompactor};
pub use summary::{filter_running, BatchSummary};
pub use types::{ActivityBundle, ActivityRecord, ActivitySummary, RawStream};

/// Crate version, reported by the CLI
pub const COMPACT_VERSION: &str = env!("CARGO_PKG_VERSION");
