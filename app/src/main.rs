//! Vigil Wildlife Monitor
//!
//! Daemon entry point: follows the field device document in the realtime
//! database and raises activity, alerts and audit records as it changes.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use vigil_hal::{
    AudioFormat, AudioPlayback, Geolocator, JsonFileStore, ListStore, MemoryStore, NullSink,
    RtdbClient, ToneSink,
};
use vigil_telemetry::{LoggingPresenter, Monitor};

mod config;
mod replay;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(version = "0.1.0")]
#[command(about = "Vigil wildlife and anti-poaching monitor", long_about = None)]
struct Args {
    /// Configuration file (default: standard search paths)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay recorded snapshots instead of connecting
    #[arg(long, value_name = "FILE")]
    demo: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref())?;

    init_logging(&config.log_format);

    tracing::info!("╔══════════════════════════════════════════╗");
    tracing::info!("║      Vigil Wildlife Monitoring Suite     ║");
    tracing::info!("║            Version 0.1.0                 ║");
    tracing::info!("╚══════════════════════════════════════════╝");
    if config.loaded_from_file() {
        tracing::info!("Configuration loaded from {:?}", config.config_path);
    } else {
        tracing::warn!("No configuration file found, using defaults");
    }

    let mut monitor = Monitor::new(
        config.monitor_config(),
        build_store(&config),
        build_sink(&config),
        Box::new(LoggingPresenter),
    );
    tracing::info!("Audit log ready ({} stored entries)", monitor.audit().len());

    match config.locator().current_coordinate() {
        Some(coordinate) => monitor.set_host_location(coordinate),
        None => tracing::info!("Host location unavailable, using base {}", monitor.site()),
    }

    print_system_status(&config).await;

    if let Some(path) = args.demo {
        let documents = replay::load(&path)?;
        monitor.log_system(&format!("Demo mode: replaying {}", path.display()), chrono::Utc::now());
        let processed = monitor.replay(documents);

        let stats = monitor.statistics();
        tracing::info!(
            "Replayed {} snapshots: {} active, {} animals, {} poachers, {} rangers",
            processed,
            stats.active_devices,
            stats.animals_detected,
            stats.poachers_detected,
            stats.rangers_detected
        );
        return Ok(());
    }

    let source = RtdbClient::new(config.rtdb_config())?;
    tracing::info!("Vigil is now watching {}", source.url());
    tracing::info!("Press Ctrl+C to stop");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    monitor.run(&source, config.poll_interval(), shutdown).await;

    tracing::info!("Shutting down...");
    tracing::info!(
        "Vigil shutdown complete: {} audit entries, {} activity entries",
        monitor.audit().len(),
        monitor.activity().len()
    );

    Ok(())
}

fn init_logging(format: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vigil=debug,vigil_hal=debug,vigil_telemetry=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false))
            .init();
        if format != "text" {
            tracing::warn!("Unknown log_format {:?}, using text", format);
        }
    }
}

fn build_store(config: &AppConfig) -> Box<dyn ListStore> {
    match JsonFileStore::new(Path::new(&config.data_directory)) {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::warn!(
                "Cannot use {} for the audit log, keeping it in memory: {}",
                config.data_directory,
                e
            );
            Box::new(MemoryStore::new())
        }
    }
}

fn build_sink(config: &AppConfig) -> Box<dyn ToneSink> {
    if !config.audio_enabled {
        tracing::info!("Audio alerts disabled");
        return Box::new(NullSink);
    }

    match AudioPlayback::new(&config.audio_device, AudioFormat::default()) {
        Ok(playback) => {
            tracing::info!("Audio alerts on {}", playback.device());
            Box::new(playback)
        }
        Err(e) => {
            tracing::warn!("Audio unavailable, alerts will be silent: {}", e);
            Box::new(NullSink)
        }
    }
}

async fn print_system_status(config: &AppConfig) {
    use sysinfo::System;

    let mut sys = System::new_all();
    sys.refresh_all();

    tracing::info!("╭─────────────── System Status ───────────────╮");
    tracing::info!("│ Hostname: {:>32} │", System::host_name().unwrap_or_default());
    tracing::info!("│ OS: {:>38} │", System::name().unwrap_or_default());
    tracing::info!("│ Kernel: {:>34} │", System::kernel_version().unwrap_or_default());
    tracing::info!("│ Memory: {:>26} MB / {} MB │",
        sys.used_memory() / 1024 / 1024,
        sys.total_memory() / 1024 / 1024);
    tracing::info!("├──────────────── Configuration ────────────────┤");
    tracing::info!("│ Database: {:>32} │", config.database_url);
    tracing::info!("│ Path: {:>36} │", config.data_path);
    tracing::info!("│ Device: {:>34} │", config.device_id);
    tracing::info!("│ Poll Interval: {:>23} ms │", config.poll_interval_ms);
    tracing::info!("│ Alert Interval: {:>22} ms │", config.alert_interval_ms);
    tracing::info!("│ Audio: {:>35} │", if config.audio_enabled { config.audio_device.as_str() } else { "off" });
    tracing::info!("│ Data: {:>36} │", config.data_directory);
    tracing::info!("╰──────────────────────────────────────────────╯");
}
