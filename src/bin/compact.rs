//! Compact CLI - Command-line interface for stream compaction
//!
//! Commands:
//! - run: Compact activity bundles into a JSONL batch
//! - randomize-hr: Replace heart-rate data in a batch with synthetic values
//! - inspect: Summarize a batch
//! - config: Print the effective compaction configuration

use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

use stream_compact::adapters::StravaAdapter;
use stream_compact::batch::{load_batch, read_batch, write_batch, HeartRateRandomizer};
use stream_compact::config::CompactionConfig;
use stream_compact::pipeline::StreamCompactor;
use stream_compact::summary::{filter_running, BatchSummary};
use stream_compact::types::ActivityRecord;
use stream_compact::{ComputeError, COMPACT_VERSION};

/// Compact - Fixed-interval, quantile-summarized activity streams
#[derive(Parser)]
#[command(name = "compact")]
#[command(version = COMPACT_VERSION)]
#[command(about = "Compact activity streams into JSONL batches", long_about = None)]
struct Cli {
    /// Log pipeline decisions to stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compact NDJSON activity bundles into a JSONL batch
    Run {
        /// Input bundles, one {"activity", "streams"} object per line (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output batch file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Replace heart-rate samples in a batch with random values
    RandomizeHr {
        /// Input batch file path
        #[arg(short, long)]
        input: PathBuf,

        /// Output batch file path (must differ from input)
        #[arg(short, long)]
        output: PathBuf,

        /// Lowest heart rate to draw (inclusive)
        #[arg(long, default_value = "210")]
        min_hr: u32,

        /// Highest heart rate to draw (inclusive)
        #[arg(long, default_value = "240")]
        max_hr: u32,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print summary statistics for a batch
    Inspect {
        /// Input batch file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Only count running activities
        #[arg(long)]
        running_only: bool,

        /// Output summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective compaction configuration as JSON
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// Load configuration from a JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Resampling interval in seconds (overrides the config file)
    #[arg(long)]
    interval: Option<f64>,

    /// Comma-separated percentile levels, e.g. 5,25,50,75,95 (overrides the config file)
    #[arg(long, value_delimiter = ',')]
    quantiles: Option<Vec<u32>>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<CompactionConfig, CompactCliError> {
        let mut config = match &self.config {
            Some(path) => CompactionConfig::from_json(&fs::read_to_string(path)?)?,
            None => CompactionConfig::default(),
        };
        if let Some(interval) = self.interval {
            config.interval_seconds = interval;
        }
        if let Some(levels) = &self.quantiles {
            config.quantile_levels = levels.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::Layer::default()
            .with_writer(io::stderr)
            .with_target(false)
            .with_ansi(false)
            .with_line_number(false)
            .with_file(false),
    );
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Unable to set a global logger instance");
    }
}

fn run(cli: Cli) -> Result<(), CompactCliError> {
    match cli.command {
        Commands::Run {
            input,
            output,
            config,
        } => cmd_run(&input, &output, config.resolve()?),

        Commands::RandomizeHr {
            input,
            output,
            min_hr,
            max_hr,
            seed,
        } => cmd_randomize_hr(&input, &output, min_hr, max_hr, seed),

        Commands::Inspect {
            input,
            running_only,
            json,
        } => cmd_inspect(&input, running_only, json),

        Commands::Config { config } => {
            println!("{}", config.resolve()?.to_json()?);
            Ok(())
        }
    }
}

fn is_stdio(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn cmd_run(input: &Path, output: &Path, config: CompactionConfig) -> Result<(), CompactCliError> {
    let compactor = StreamCompactor::new(config)?;

    let bundles = if is_stdio(input) {
        StravaAdapter.read_bundles(io::stdin().lock())?
    } else {
        StravaAdapter.read_bundles(open_input(input)?)?
    };

    if bundles.is_empty() {
        return Err(CompactCliError::NoActivities);
    }

    let records: Vec<ActivityRecord> = bundles
        .iter()
        .map(|bundle| compactor.build_record(&bundle.activity, bundle.streams.as_deref()))
        .collect();

    if is_stdio(output) {
        let mut stdout = io::stdout().lock();
        write_batch(&records, &mut stdout)?;
        stdout.flush()?;
    } else {
        let mut writer = BufWriter::new(File::create(output)?);
        write_batch(&records, &mut writer)?;
        writer.flush()?;
    }

    info!(records = records.len(), "wrote batch");
    Ok(())
}

fn cmd_randomize_hr(
    input: &Path,
    output: &Path,
    min_hr: u32,
    max_hr: u32,
    seed: Option<u64>,
) -> Result<(), CompactCliError> {
    let randomizer = HeartRateRandomizer::new(min_hr, max_hr)?;

    let written = match seed {
        Some(seed) => randomizer.rewrite_batch(input, output, &mut StdRng::seed_from_u64(seed))?,
        None => randomizer.rewrite_batch(input, output, &mut rand::rng())?,
    };

    eprintln!("Wrote {} records to {}", written, output.display());
    Ok(())
}

fn cmd_inspect(input: &Path, running_only: bool, json: bool) -> Result<(), CompactCliError> {
    let records = if is_stdio(input) {
        read_batch(io::stdin().lock(), input)?
    } else {
        load_batch(input)?
    };
    debug!(records = records.len(), "loaded batch");

    let records = if running_only {
        filter_running(&records)
    } else {
        records
    };
    let summary = BatchSummary::from_records(&records);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let or_dash = |value: Option<f64>, precision: usize| {
        value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
    };

    println!("Batch Summary");
    println!("=============");
    println!("Activities:          {}", summary.total_activities);
    println!("Total distance:      {:.2} km", summary.total_distance_km);
    println!("Total moving time:   {:.2} h", summary.total_time_hours);
    println!("Average distance:    {} km", or_dash(summary.average_distance_km, 2));
    println!("Average pace:        {} min/km", or_dash(summary.average_pace_min_per_km, 2));
    println!("Total elevation:     {:.0} m", summary.total_elevation_gain_m);
    println!("Average heart rate:  {} bpm", or_dash(summary.average_heartrate, 1));

    if let (Some(first), Some(last)) = (summary.first_activity, summary.last_activity) {
        println!(
            "Date range:          {} .. {}",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        );
    }

    Ok(())
}

fn open_input(path: &Path) -> Result<impl BufRead, ComputeError> {
    File::open(path).map(BufReader::new).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ComputeError::FileNotFound(path.to_path_buf()),
        _ => ComputeError::Io(e),
    })
}

// Error handling

#[derive(Debug)]
enum CompactCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoActivities,
}

impl From<io::Error> for CompactCliError {
    fn from(e: io::Error) -> Self {
        CompactCliError::Io(e)
    }
}

impl From<ComputeError> for CompactCliError {
    fn from(e: ComputeError) -> Self {
        CompactCliError::Compute(e)
    }
}

impl From<serde_json::Error> for CompactCliError {
    fn from(e: serde_json::Error) -> Self {
        CompactCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CompactCliError> for CliError {
    fn from(e: CompactCliError) -> Self {
        match e {
            CompactCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CompactCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::FileNotFound(_) => ("FILE_NOT_FOUND", "Check the input path"),
                    ComputeError::BatchLine { .. } | ComputeError::BatchEncoding { .. } => {
                        ("BATCH_PARSE_ERROR", "Each line must be one JSON record")
                    }
                    ComputeError::InvalidConfig(_) => {
                        ("INVALID_CONFIG", "Run 'compact config' to see the defaults")
                    }
                    ComputeError::InvalidHeartRateRange { .. } => {
                        ("INVALID_RANGE", "Pass --min-hr lower than --max-hr")
                    }
                    ComputeError::OutputOverwritesInput(_) => {
                        ("OUTPUT_OVERWRITES_INPUT", "Write to a different output path")
                    }
                    ComputeError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    ComputeError::ParseError(_) | ComputeError::JsonError(_) => (
                        "PARSE_ERROR",
                        "Ensure each input line is {\"activity\": {..}, \"streams\": [..]}",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            CompactCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CompactCliError::NoActivities => CliError {
                code: "NO_ACTIVITIES".to_string(),
                message: "No activities found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
        }
    }
}
