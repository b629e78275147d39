//! Batch files
//!
//! A batch is a JSONL file: one compact JSON record per line, UTF-8, LF
//! terminated, no array wrapper. This module reads and writes batches and
//! rewrites heart-rate data across a batch with synthetic values.

use crate::config::{validate_quantile_levels, DEFAULT_QUANTILE_LEVELS};
use crate::error::ComputeError;
use crate::numeric::quantile_levels;
use crate::types::{quantile_key, stream_types, ActivityRecord, CsvSeries, QuantileSummary};
use rand::Rng;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;
use tracing::{debug, info};

/// Offending content is cut to this many characters in parse errors
const ERROR_CONTENT_CHARS: usize = 120;

/// Write records to `path`, one JSON object per line
pub fn save_batch(records: &[ActivityRecord], path: impl AsRef<Path>) -> Result<(), ComputeError> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_batch(records, &mut writer)?;
    writer.flush()?;
    debug!(records = records.len(), path = %path.display(), "saved batch");
    Ok(())
}

/// Write records as JSONL to any writer
pub fn write_batch<W: Write>(records: &[ActivityRecord], writer: &mut W) -> Result<(), ComputeError> {
    for record in records {
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Load every record from a batch file.
///
/// Blank lines are skipped. A malformed line fails the whole load with its
/// line number and content; a missing file is reported as
/// [`ComputeError::FileNotFound`].
pub fn load_batch(path: impl AsRef<Path>) -> Result<Vec<ActivityRecord>, ComputeError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ComputeError::FileNotFound(path.to_path_buf()),
        _ => ComputeError::Io(e),
    })?;
    read_batch(BufReader::new(file), path)
}

/// Parse JSONL records from a reader; `source` names the input in errors
pub fn read_batch<R: BufRead>(mut reader: R, source: &Path) -> Result<Vec<ActivityRecord>, ComputeError> {
    let mut records = Vec::new();
    let mut buf = Vec::new();
    let mut line_num = 0;
    loop {
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_num += 1;
        let line = String::from_utf8(std::mem::take(&mut buf)).map_err(|e| {
            ComputeError::BatchEncoding {
                path: source.to_path_buf(),
                line: line_num,
                source: e,
            }
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str::<ActivityRecord>(trimmed).map_err(|e| {
            ComputeError::BatchLine {
                path: source.to_path_buf(),
                line: line_num,
                content: truncate_content(trimmed),
                source: e,
            }
        })?;
        records.push(record);
    }
    Ok(records)
}

fn truncate_content(line: &str) -> String {
    if line.chars().count() <= ERROR_CONTENT_CHARS {
        return line.to_string();
    }
    let head: String = line.chars().take(ERROR_CONTENT_CHARS).collect();
    format!("{}...", head)
}

/// Replace heart-rate samples in a batch with uniform random values from
/// an inclusive range, then recompute dependent fields
#[derive(Debug, Clone)]
pub struct HeartRateRandomizer {
    min_hr: u32,
    max_hr: u32,
    quantile_levels: Vec<u32>,
}

impl HeartRateRandomizer {
    /// Fails when `min_hr >= max_hr`
    pub fn new(min_hr: u32, max_hr: u32) -> Result<Self, ComputeError> {
        if min_hr >= max_hr {
            return Err(ComputeError::InvalidHeartRateRange {
                min: min_hr,
                max: max_hr,
            });
        }
        Ok(Self {
            min_hr,
            max_hr,
            quantile_levels: DEFAULT_QUANTILE_LEVELS.to_vec(),
        })
    }

    /// Use different levels for the recomputed heart-rate quantiles
    pub fn with_quantile_levels(mut self, levels: Vec<u32>) -> Result<Self, ComputeError> {
        validate_quantile_levels(&levels)?;
        self.quantile_levels = levels;
        Ok(self)
    }

    /// Rewrite one record in place. Returns false when the record has no
    /// heart-rate column with values and was left untouched.
    ///
    /// Every non-empty sample is replaced; empty samples stay empty so the
    /// column keeps one entry per resample point. The `hr_bpm` quantiles are
    /// recomputed from the new values, and existing average/max heart-rate
    /// fields are overwritten with their truncated mean and maximum.
    pub fn randomize_record<R: Rng + ?Sized>(&self, record: &mut ActivityRecord, rng: &mut R) -> bool {
        let Some(hr_csv) = record
            .streams_compact
            .as_mut()
            .and_then(|compact| compact.hr_bpm_csv.as_mut())
        else {
            return false;
        };
        if hr_csv.is_empty() {
            return false;
        }

        let mut new_values: Vec<u32> = Vec::new();
        let series: CsvSeries = CsvSeries::parse(hr_csv)
            .0
            .into_iter()
            .map(|token| {
                token.map(|_| {
                    let value = rng.random_range(self.min_hr..=self.max_hr);
                    new_values.push(value);
                    value.to_string()
                })
            })
            .collect();
        *hr_csv = series.to_csv();

        if new_values.is_empty() {
            return false;
        }

        let as_f64: Vec<f64> = new_values.iter().map(|&v| v as f64).collect();
        if let Some(levels) = quantile_levels(&as_f64, &self.quantile_levels) {
            record
                .quantiles
                .get_or_insert_with(QuantileSummary::new)
                .insert(quantile_key(stream_types::HEARTRATE).to_string(), levels);
        }

        let sum: u64 = new_values.iter().map(|&v| v as u64).sum();
        let mean = sum / new_values.len() as u64;
        let max = new_values.iter().copied().max().unwrap_or(self.max_hr);

        if record.average_heartrate_bpm.is_some() {
            record.average_heartrate_bpm = Some(mean as f64);
        }
        if record.max_heartrate_bpm.is_some() {
            record.max_heartrate_bpm = Some(max as f64);
        }
        true
    }

    /// Read `input`, rewrite every record, and write the result to `output`.
    ///
    /// The input file is fully read and closed before anything is written and
    /// is never modified. Returns the number of records written.
    pub fn rewrite_batch<R: Rng + ?Sized>(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        rng: &mut R,
    ) -> Result<usize, ComputeError> {
        let (input, output) = (input.as_ref(), output.as_ref());
        if same_file(input, output) {
            return Err(ComputeError::OutputOverwritesInput(output.to_path_buf()));
        }

        let mut records = load_batch(input)?;
        let modified = records
            .iter_mut()
            .map(|record| self.randomize_record(record, rng))
            .filter(|&changed| changed)
            .count();

        save_batch(&records, output)?;
        info!(
            records = records.len(),
            modified,
            output = %output.display(),
            "randomized heart rate"
        );
        Ok(records.len())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Rewrite heart-rate data of the batch at `input` into `output` using
/// values drawn uniformly from `[min_hr, max_hr]`.
///
/// Fails before reading anything when `min_hr >= max_hr`.
pub fn randomize_heart_rate(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    min_hr: u32,
    max_hr: u32,
) -> Result<usize, ComputeError> {
    HeartRateRandomizer::new(min_hr, max_hr)?.rewrite_batch(input, output, &mut rand::rng())
}
