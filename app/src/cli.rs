//! Vigil CLI Tool
//!
//! Command-line interface for the audit log, replays and configuration.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use vigil_hal::{Geolocator, JsonFileStore, MemoryStore, NullSink};
use vigil_telemetry::audit::{export_file_name, VIEW_LEN};
use vigil_telemetry::presentation::{card_lines, MarkerStyle};
use vigil_telemetry::{
    ActivityEvent, AuditLogger, ConnectionStatus, DeviceRecord, Monitor, Presenter, Statistics,
};

mod config;
mod replay;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "vigil-cli")]
#[command(author = "Vigil Team")]
#[command(version = "0.1.0")]
#[command(about = "Vigil Wildlife Monitor CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides the configuration)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the most recent audit log entries
    Logs {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value_t = VIEW_LEN)]
        limit: usize,
    },

    /// Export the audit log
    Export {
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Output file path (default: timestamped file in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete all audit log entries
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Run recorded snapshots through the pipeline and print the result
    Replay {
        /// JSON array, JSON lines, or a log export
        file: PathBuf,
    },

    /// Generate sample configuration
    Config {
        /// Output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// System information
    Info,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return generate_config(output.as_deref());
    }

    let config = AppConfig::load(cli.config.as_deref())?;
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.data_directory));

    match cli.command {
        Commands::Logs { limit } => {
            show_logs(&open_logs(&data_dir, &config)?, limit);
        }

        Commands::Export { format, output } => {
            export_logs(&open_logs(&data_dir, &config)?, format, output)?;
        }

        Commands::Clear { yes } => {
            clear_logs(open_logs(&data_dir, &config)?, yes)?;
        }

        Commands::Replay { file } => {
            replay_file(&config, &file)?;
        }

        Commands::Config { .. } => {}

        Commands::Info => {
            show_info(&config, &data_dir);
        }
    }

    Ok(())
}

fn open_logs(data_dir: &Path, config: &AppConfig) -> Result<AuditLogger> {
    let store = JsonFileStore::new(data_dir)?;
    Ok(AuditLogger::open(Box::new(store), &config.monitor_config().storage_key))
}

fn show_logs(logger: &AuditLogger, limit: usize) {
    println!("{}", "=".repeat(80));
    println!("VIGIL DATA LOGS - Total Entries: {}", logger.len());
    println!("{}", "=".repeat(80));

    for (index, log) in logger.recent(limit).enumerate() {
        let location = |v: &Option<vigil_telemetry::Scalar>| {
            v.as_ref().map(|s| s.to_string()).unwrap_or_else(|| "null".to_string())
        };

        println!("\nLog #{}:", index + 1);
        println!("  Timestamp: {}", log.timestamp.to_rfc3339());
        println!("  Animal: {}", log.data.animal);
        println!("  Human: {}", log.data.human);
        println!("  Role: {}", log.data.role);
        println!("  Human Count: {}", log.data.human_count);
        println!("  BLE Present: {}", log.data.ble_present);
        println!("  Location: {}, {}", location(&log.data.lat), location(&log.data.lng));
    }

    if logger.len() > limit {
        println!("\n... and {} more entries", logger.len() - limit);
    }
    println!("{}", "=".repeat(80));
}

fn export_logs(logger: &AuditLogger, format: ExportFormat, output: Option<PathBuf>) -> Result<()> {
    if logger.is_empty() {
        bail!("No logs to export");
    }

    let now = chrono::Utc::now();
    let content = match format {
        ExportFormat::Json => logger.export_json(now)?,
        ExportFormat::Csv => logger.export_csv()?,
    };

    let path = output.unwrap_or_else(|| PathBuf::from(export_file_name(now, format.extension())));
    std::fs::write(&path, content)?;
    println!("Exported {} log entries to: {:?}", logger.len(), path);
    Ok(())
}

fn clear_logs(mut logger: AuditLogger, yes: bool) -> Result<()> {
    if !yes {
        println!(
            "This deletes all {} log entries and cannot be undone. Re-run with --yes to confirm.",
            logger.len()
        );
        return Ok(());
    }

    logger.clear()?;
    println!("All logs have been cleared");
    Ok(())
}

/// Presenter printing to stdout
struct PrintPresenter;

impl Presenter for PrintPresenter {
    fn on_device_updated(&self, record: &DeviceRecord, _stats: &Statistics) {
        let style = MarkerStyle::for_record(record);
        println!("{} [{}]", style.icon, style.color);
        for line in card_lines(record) {
            println!("    {}", line);
        }
    }

    fn on_activity(&self, event: &ActivityEvent) {
        println!(
            "{} {} {}: {}",
            event.occurred_at.format("%H:%M:%S"),
            event.icon(),
            event.device_id,
            event.message
        );
    }

    fn on_connection(&self, status: &ConnectionStatus) {
        println!("[{}] {}", status.state.as_str(), status.message);
    }
}

fn replay_file(config: &AppConfig, file: &Path) -> Result<()> {
    let documents = replay::load(file)?;

    let mut monitor = Monitor::new(
        config.monitor_config(),
        Box::new(MemoryStore::new()),
        Box::new(NullSink),
        Box::new(PrintPresenter),
    );
    if let Some(coordinate) = config.locator().current_coordinate() {
        monitor.set_host_location(coordinate);
    }

    let total = documents.len();
    let processed = monitor.replay(documents);
    let stats = monitor.statistics();

    println!("\n{}", "─".repeat(60));
    println!("Snapshots: {} processed, {} skipped", processed, total - processed);
    println!("Active devices: {}", stats.active_devices);
    println!("Animals detected: {}", stats.animals_detected);
    println!("Poacher alerts: {}", stats.poachers_detected);
    println!("Rangers detected: {}", stats.rangers_detected);
    Ok(())
}

fn generate_config(output: Option<&Path>) -> Result<()> {
    let example = AppConfig::example();

    if let Some(path) = output {
        std::fs::write(path, example)?;
        println!("Configuration written to: {:?}", path);
    } else {
        println!("{}", example);
    }

    Ok(())
}

fn show_info(config: &AppConfig, data_dir: &Path) {
    use sysinfo::System;

    let mut sys = System::new_all();
    sys.refresh_all();

    println!("╭──────────────────────────────────────────────────────────────╮");
    println!("│               Vigil System Information                       │");
    println!("╰──────────────────────────────────────────────────────────────╯\n");

    println!("System:");
    println!("  Hostname: {}", System::host_name().unwrap_or_default());
    println!("  OS: {} {}",
        System::name().unwrap_or_default(),
        System::os_version().unwrap_or_default());
    println!("  Kernel: {}", System::kernel_version().unwrap_or_default());
    println!("  Memory: {} MB total, {} MB used",
        sys.total_memory() / 1024 / 1024,
        sys.used_memory() / 1024 / 1024);

    println!("\nVigil:");
    println!("  Version: 0.1.0");
    println!("  Database: {}/{}", config.rtdb_config().database_url, config.data_path);
    println!("  Device: {}", config.device_id);
    println!("  Poll Interval: {:?}", config.poll_interval());
    println!("  Data Directory: {}", data_dir.display());

    let key = config.monitor_config().storage_key;
    let log_file = data_dir.join(format!("{}.json", key));
    println!("\nAvailability:");
    println!("  Audit Log: {}", if log_file.exists() { "✓" } else { "✗" });
    println!("  aplay: {}", if Path::new("/usr/bin/aplay").exists() { "✓" } else { "✗" });
}
