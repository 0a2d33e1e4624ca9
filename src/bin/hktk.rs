//! HKTK CLI - Command-line interface for the health record toolkit
//!
//! Commands:
//! - types: Inventory of record types in an export
//! - summary: Per-type feature summaries, optionally per date
//! - sleep: Detected sleep episodes with stage breakdown
//! - correlate: Rank predictors of a sleep metric

use chrono::{DateTime, FixedOffset, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use hktk::analytics::SleepStage;
use hktk::pipeline::TypeSummaries;
use hktk::{
    CorrelationReport, FeatureSummary, HealthError, RecordCollection, RecordLoader, SleepAnalysis,
    HKTK_VERSION,
};

/// HKTK - Health record analytics toolkit
#[derive(Parser)]
#[command(name = "hktk")]
#[command(version = HKTK_VERSION)]
#[command(about = "Summarize health records and rank predictors of sleep", long_about = None)]
struct Cli {
    /// Log debug output (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List record types with counts, display names and kinds
    Types {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Feature summary per record type
    Summary {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,

        /// Summarize each calendar date separately
        #[arg(long)]
        by_date: bool,

        /// Last date forward-filled summary types extend to (YYYY-MM-DD)
        #[arg(long)]
        latest_date: Option<NaiveDate>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Detected sleep episodes
    Sleep {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rank record-type features as predictors of a sleep metric
    Correlate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,

        /// Sleep metric to predict, e.g. total_hours or Deep_percent
        #[arg(short, long, default_value = "total_hours")]
        target: String,

        /// Load scorer configuration from file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the report artifact to file (use - for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report artifact format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// Print the ranking as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// JSON array if the input starts with `[`, NDJSON otherwise
    Auto,
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), HktkCliError> {
    match cli.command {
        Commands::Types {
            input,
            input_format,
            json,
        } => cmd_types(&input, input_format, json),

        Commands::Summary {
            input,
            input_format,
            by_date,
            latest_date,
            json,
        } => cmd_summary(&input, input_format, by_date, latest_date, json),

        Commands::Sleep {
            input,
            input_format,
            json,
        } => cmd_sleep(&input, input_format, json),

        Commands::Correlate {
            input,
            input_format,
            target,
            config,
            output,
            output_format,
            json,
        } => cmd_correlate(
            &input,
            input_format,
            &target,
            config.as_deref(),
            output.as_deref(),
            output_format,
            json,
        ),
    }
}

fn cmd_types(input: &Path, input_format: InputFormat, json: bool) -> Result<(), HktkCliError> {
    let records = load_records(input, input_format)?;
    let inventory = SleepAnalysis::new().inventory(&records);

    if json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
    } else {
        println!("Record Types");
        println!("============");
        println!("Total records: {}", records.len());
        println!();
        for info in &inventory {
            println!(
                "  {:>8}  {:<32} {:<20} {}",
                info.count, info.display_name, info.kind, info.record_type
            );
        }
    }

    Ok(())
}

fn cmd_summary(
    input: &Path,
    input_format: InputFormat,
    by_date: bool,
    latest_date: Option<NaiveDate>,
    json: bool,
) -> Result<(), HktkCliError> {
    let records = load_records(input, input_format)?;
    let analysis = match latest_date {
        Some(date) => SleepAnalysis::new().with_latest_date(date),
        None => SleepAnalysis::new(),
    };

    if by_date {
        let days = analysis.daily_summaries(&records)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&days)?);
        } else {
            for (date, summaries) in &days {
                println!("{}", date);
                println!("==========");
                print_summaries(&analysis, summaries);
                println!();
            }
        }
    } else {
        let summaries = analysis.type_summaries(&records)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        } else {
            println!("Feature Summaries");
            println!("=================");
            print_summaries(&analysis, &summaries);
        }
    }

    Ok(())
}

fn cmd_sleep(input: &Path, input_format: InputFormat, json: bool) -> Result<(), HktkCliError> {
    let records = load_records(input, input_format)?;
    let episodes = SleepAnalysis::new().episodes(&records)?;

    let report: Vec<EpisodeReport> = episodes
        .iter()
        .map(|episode| EpisodeReport {
            date: episode.date(),
            start: episode.start,
            end: episode.end,
            records: episode.stages().len(),
            stage_hours: episode
                .stage_durations()
                .into_iter()
                .map(|(stage, secs)| (stage, secs / 3600.0))
                .collect(),
            summary: episode.feature_summary(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Sleep Episodes");
        println!("==============");
        println!("Episodes found: {}", report.len());
        for episode in &report {
            println!();
            println!(
                "{}  {} -> {}  ({} records)",
                episode.date, episode.start, episode.end, episode.records
            );
            for (stage, hours) in &episode.stage_hours {
                println!("  {:<8} {:>6.2} h", stage.as_str(), hours);
            }
        }
    }

    Ok(())
}

fn cmd_correlate(
    input: &Path,
    input_format: InputFormat,
    target: &str,
    config: Option<&Path>,
    output: Option<&Path>,
    output_format: OutputFormat,
    json: bool,
) -> Result<(), HktkCliError> {
    let records = load_records(input, input_format)?;

    let mut analysis = SleepAnalysis::new();
    if let Some(config_path) = config {
        let config_json = fs::read_to_string(config_path)?;
        analysis.load_config(&config_json)?;
    }

    let report = analysis.correlate(&records, target)?;
    if report.series.x.is_empty() {
        return Err(HktkCliError::NoEpisodes);
    }

    if let Some(output_path) = output {
        let artifact = format_report(&report, &output_format)?;
        if output_path.to_string_lossy() == "-" {
            println!("{}", artifact);
        } else {
            fs::write(output_path, artifact)?;
            log::info!("wrote report to {}", output_path.display());
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report.table)?);
    } else {
        println!("Predictors of {}", target);
        println!("==============={}", "=".repeat(target.len()));
        println!("Episodes: {}", report.series.x.len());
        println!();
        if report.table.is_empty() {
            println!("  No feature had enough data to score");
        }
        for (rank, entry) in report.table.iter().enumerate() {
            println!("  {:>3}. {:.4}  {}", rank + 1, entry.score, entry.field);
        }
    }

    Ok(())
}

// Helper functions

fn load_records(input: &Path, format: InputFormat) -> Result<RecordCollection, HktkCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            log::warn!("reading records from an interactive terminal; end input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let records = match format {
        InputFormat::Auto => RecordLoader::parse(&input_data)?,
        InputFormat::Ndjson => RecordLoader::parse_ndjson(&input_data)?,
        InputFormat::Json => RecordLoader::parse_array(&input_data)?,
    };

    if records.is_empty() {
        return Err(HktkCliError::NoRecords);
    }
    log::info!("loaded {} records", records.len());
    Ok(records)
}

fn print_summaries(analysis: &SleepAnalysis, summaries: &TypeSummaries) {
    for (record_type, summary) in summaries {
        println!("  {}", analysis.registry().display_name(record_type));
        print_summary(summary);
    }
}

fn print_summary(summary: &FeatureSummary) {
    for (name, value) in summary.iter() {
        match value {
            Some(v) => println!("    {:<24} {:.3}", name, v),
            None => println!("    {:<24} -", name),
        }
    }
}

fn format_report(
    report: &CorrelationReport,
    format: &OutputFormat,
) -> Result<String, HktkCliError> {
    match format {
        OutputFormat::Json => Ok(report.to_json()?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(report)?),
    }
}

// Error types

#[derive(Debug)]
enum HktkCliError {
    Io(io::Error),
    Health(HealthError),
    Json(serde_json::Error),
    NoRecords,
    NoEpisodes,
}

impl From<io::Error> for HktkCliError {
    fn from(e: io::Error) -> Self {
        HktkCliError::Io(e)
    }
}

impl From<HealthError> for HktkCliError {
    fn from(e: HealthError) -> Self {
        HktkCliError::Health(e)
    }
}

impl From<serde_json::Error> for HktkCliError {
    fn from(e: serde_json::Error) -> Self {
        HktkCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<HktkCliError> for CliError {
    fn from(e: HktkCliError) -> Self {
        match e {
            HktkCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            HktkCliError::Health(e) => {
                let (code, hint) = match &e {
                    HealthError::ParseError(_)
                    | HealthError::JsonError(_)
                    | HealthError::DateParseError(_) => (
                        "PARSE_ERROR",
                        "Records need type, creationDate, startDate and endDate fields",
                    ),
                    HealthError::InvalidConfig(_) => (
                        "INVALID_CONFIG",
                        "Window hours must be between 0 and 8784; see README for the defaults",
                    ),
                    HealthError::UnknownFeature(_) => (
                        "UNKNOWN_FEATURE",
                        "Use a sleep metric such as total_hours, Deep_hours or REM_percent",
                    ),
                    HealthError::MalformedData(_) => {
                        ("MALFORMED_DATA", "Check values and units of the named record type")
                    }
                    HealthError::MixedTypes { .. } | HealthError::UnsupportedOperation(_) => {
                        ("ANALYSIS_ERROR", "Run 'hktk types' to inspect the input")
                    }
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            HktkCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            HktkCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            HktkCliError::NoEpisodes => CliError {
                code: "NO_EPISODES".to_string(),
                message: "No sleep episodes found in input".to_string(),
                hint: Some(
                    "Correlation needs HKCategoryTypeIdentifierSleepAnalysis records".to_string(),
                ),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct EpisodeReport {
    date: NaiveDate,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    records: usize,
    stage_hours: BTreeMap<SleepStage, f64>,
    summary: FeatureSummary,
}
