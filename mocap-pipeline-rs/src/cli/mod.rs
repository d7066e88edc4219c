//! Command-line interface for the motion-capture pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::TrimConfig;
use crate::processors::batch::BatchReport;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "mocap-pipeline")]
#[command(about = "Motion-capture trajectory cleaning pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pad raw comma-separated exports into rectangular tables
    Format {
        /// Raw export file or directory
        input: PathBuf,
        /// Output file or directory
        output: PathBuf,
        /// Limit number of files to process
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Fill base-marker gaps from extra markers and drop the extras
    Clean {
        /// Formatted export file or directory
        input: PathBuf,
        /// Output file or directory
        output: PathBuf,
        /// Limit number of files to process
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Cut recordings after the last significant movement
    Trim {
        /// Interpolated table file or directory
        input: PathBuf,
        /// Output file or directory
        output: PathBuf,
        /// Rolling window length in frames
        #[arg(long)]
        window_size: Option<usize>,
        /// Movement threshold (coordinate units per frame)
        #[arg(long)]
        threshold: Option<f64>,
        /// Limit number of files to process
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the header block and marker partition of a formatted export
    Inspect {
        /// Formatted export file
        file: PathBuf,
    },

    /// Write the active configuration as YAML
    WriteConfig {
        /// Destination path
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        // Paths often carry umlauts; cut on char boundaries.
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Summary rows shared by every batch command.
fn batch_items<T>(
    input: &Path,
    output: &Path,
    report: &BatchReport<T>,
    start: Instant,
) -> Vec<(&'static str, String)> {
    let mut items = vec![
        ("Input directory", input.display().to_string()),
        ("Output directory", output.display().to_string()),
        ("Files processed", report.success_count().to_string()),
        ("Files skipped", report.failure_count().to_string()),
    ];
    for (kind, count) in report.failures_by_kind() {
        items.push(("  skipped", format!("{} x {}", count, kind)));
    }
    items.push(("Duration", format!("{:.2?}", start.elapsed())));
    items
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Format { input, output, limit } => {
            cmd_format(&input, &output, limit, &config);
        }
        Commands::Clean { input, output, limit } => {
            cmd_clean(&input, &output, limit, &config);
        }
        Commands::Trim { input, output, window_size, threshold, limit } => {
            cmd_trim(&input, &output, window_size, threshold, limit, &config);
        }
        Commands::Inspect { file } => {
            cmd_inspect(&file, &config);
        }
        Commands::WriteConfig { path } => {
            cmd_write_config(&path, &config);
        }
    }
}

fn cmd_format(input: &Path, output: &Path, limit: Option<usize>, config: &PipelineConfig) {
    use crate::processors::formatting;

    let start = Instant::now();

    if input.is_dir() {
        println!("Formatting raw exports in batch mode...");
        let spinner = create_spinner("Formatting exports...");
        let result = formatting::format_batch(input, output, &config.io, limit);
        spinner.finish_and_clear();

        match result {
            Ok(report) => {
                print_summary("Formatting Complete", &batch_items(input, output, &report, start));
            }
            Err(e) => {
                error!("Batch formatting failed: {:#}", e);
                std::process::exit(1);
            }
        }
    } else {
        match formatting::format_file(input, output, &config.io) {
            Ok(summary) => {
                print_summary(
                    "Formatting Complete",
                    &[
                        ("Input file", input.display().to_string()),
                        ("Output file", output.display().to_string()),
                        ("Lines", summary.lines.to_string()),
                        ("Columns", summary.width.to_string()),
                        ("Duration", format!("{:.2?}", start.elapsed())),
                    ],
                );
            }
            Err(e) => {
                error!("Formatting failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn cmd_clean(input: &Path, output: &Path, limit: Option<usize>, config: &PipelineConfig) {
    use crate::processors::reconcile;

    let start = Instant::now();

    if input.is_dir() {
        println!("Cleaning formatted exports in batch mode...");
        println!("Input directory: {}", input.display());
        println!("Output directory: {}", output.display());

        if let Some(lim) = limit {
            println!("Processing limit: {} files", lim);
        }

        let spinner = create_spinner("Reconciling markers...");
        let result = reconcile::clean_batch(input, output, config, limit);
        spinner.finish_and_clear();

        match result {
            Ok(report) => {
                let filled: usize = report.succeeded().map(|(_, s)| s.filled).sum();
                let mut items = batch_items(input, output, &report, start);
                items.insert(4, ("Samples filled", filled.to_string()));
                print_summary("Cleaning Complete", &items);
            }
            Err(e) => {
                error!("Batch cleaning failed: {:#}", e);
                std::process::exit(1);
            }
        }
    } else {
        let spinner = create_spinner("Reconciling markers...");
        let result = reconcile::clean_file(input, output, config);
        spinner.finish_and_clear();

        match result {
            Ok(summary) => {
                print_summary(
                    "Cleaning Complete",
                    &[
                        ("Input file", input.display().to_string()),
                        ("Output file", output.display().to_string()),
                        ("Frames", summary.frames.to_string()),
                        ("Base markers", format!("{:?}", summary.base_markers)),
                        ("Extra markers", format!("{:?}", summary.extra_markers)),
                        ("Samples filled", summary.filled.to_string()),
                        ("Duration", format!("{:.2?}", start.elapsed())),
                    ],
                );
            }
            Err(e) => {
                error!("Cleaning failed [{}]: {}", e.kind(), e);
                std::process::exit(1);
            }
        }
    }
}

fn cmd_trim(
    input: &Path,
    output: &Path,
    window_size: Option<usize>,
    threshold: Option<f64>,
    limit: Option<usize>,
    config: &PipelineConfig,
) {
    use crate::processors::trimming;

    let start = Instant::now();

    // CLI flags override config values
    let trim_config = TrimConfig {
        window_size: window_size.unwrap_or(config.trim.window_size),
        movement_threshold: threshold.unwrap_or(config.trim.movement_threshold),
        ..config.trim.clone()
    };

    println!("Window size: {} frames", trim_config.window_size);
    println!("Movement threshold: {}", trim_config.movement_threshold);

    if input.is_dir() {
        let spinner = create_spinner("Trimming recordings...");
        let result = trimming::trim_batch(input, output, &trim_config, &config.io, limit);
        spinner.finish_and_clear();

        match result {
            Ok(report) => {
                let truncated = report.succeeded().filter(|(_, o)| o.truncated()).count();
                let mut items = batch_items(input, output, &report, start);
                items.insert(4, ("Files truncated", truncated.to_string()));
                print_summary("Trimming Complete", &items);
            }
            Err(e) => {
                error!("Batch trimming failed: {:#}", e);
                std::process::exit(1);
            }
        }
    } else {
        match trimming::trim_file(input, output, &trim_config, &config.io) {
            Ok(outcome) => {
                let last_active = outcome
                    .last_active
                    .map_or_else(|| "none".to_string(), |idx| idx.to_string());
                print_summary(
                    "Trimming Complete",
                    &[
                        ("Input file", input.display().to_string()),
                        ("Output file", output.display().to_string()),
                        ("Frames in", outcome.original_frames.to_string()),
                        ("Frames kept", outcome.kept_frames.to_string()),
                        ("Last active frame", last_active),
                        ("Duration", format!("{:.2?}", start.elapsed())),
                    ],
                );
            }
            Err(e) => {
                error!("Trimming failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn cmd_inspect(file: &Path, config: &PipelineConfig) {
    use crate::core::loaders;
    use crate::processors::header;
    use crate::processors::reconcile::{MarkerPartition, MarkerTable};

    let raw = match loaders::load_raw_table(file, config.io.delimiter_byte(), config.io.encoding) {
        Ok(raw) => raw,
        Err(e) => {
            error!("Failed to load {}: {}", file.display(), e);
            std::process::exit(1);
        }
    };

    let block = match header::resolve_header(&raw) {
        Ok(block) => block,
        Err(e) => {
            error!("{}: {}", file.display(), e);
            std::process::exit(1);
        }
    };

    println!("Columns:");
    for (idx, label) in block.columns.iter().enumerate() {
        println!("  {:>4}  {}", idx, label);
    }

    let base_ids = config.partition.base_markers_for(&file.to_string_lossy());
    let group = config
        .partition
        .match_group(&file.to_string_lossy())
        .map_or_else(|| "default".to_string(), |g| g.name.clone());

    let mut items = vec![
        ("File", file.display().to_string()),
        ("Marker row", block.marker_row.to_string()),
        ("Coordinate row", block.coord_row.to_string()),
        ("Columns", block.columns.len().to_string()),
        ("Task group", group),
    ];

    match MarkerTable::from_raw(&raw, &block) {
        Ok(table) => {
            let partition = MarkerPartition::new(&table.marker_ids(), &base_ids);
            items.push(("Frames", table.len().to_string()));
            items.push(("Base markers", format!("{:?}", partition.base)));
            items.push(("Extra markers", format!("{:?}", partition.extra)));
        }
        Err(e) => {
            warn!("{}: {}", file.display(), e);
            items.push(("Base markers", format!("{:?}", base_ids)));
            items.push(("Schema", format!("[{}]", e.kind())));
        }
    }

    print_summary("Header Inspection", &items);
}

fn cmd_write_config(path: &Path, config: &PipelineConfig) {
    match config.to_yaml(path) {
        Ok(()) => println!("Wrote configuration to {}", path.display()),
        Err(e) => {
            error!("Failed to write config to {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
