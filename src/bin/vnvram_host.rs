//! vnvram host-link simulator
//!
//! Brings the platform up from a configuration file and drives it with
//! recorded host frames, the way the host would over UART.
//!
//! # Examples
//!
//! ```bash
//! # Replay a capture (one base64 frame per line) and print a JSON report
//! vnvram-host --config board.toml replay capture.b64
//!
//! # Mirror device notifications to a file as raw frames
//! vnvram-host replay capture.b64 --mirror-out events.bin
//!
//! # Show how the pool arena is laid out
//! vnvram-host layout
//! ```

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vnvram::nvram::NvramStats;
use vnvram::pool::{HeapArena, PoolAllocator, PoolStats};
use vnvram::transport::{
    Dispatch, HostTransport, Notification, RecordingTransport, WriterTransport,
};
use vnvram::PlatformConfig;

/// vnvram - pool allocator and virtual NVRAM host simulator
#[derive(Parser, Debug)]
#[command(name = "vnvram-host")]
#[command(version = vnvram::VERSION)]
#[command(about = "Drive the virtual NVRAM with recorded host frames", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Platform configuration file (TOML)
    #[arg(long, global = true, env = "VNVRAM_CONFIG")]
    config: Option<PathBuf>,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "VNVRAM_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay host frames against a fresh platform
    Replay(ReplayArgs),

    /// Print the pool arena layout for the configuration
    Layout,

    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Capture file, one base64-encoded frame per line ('#' starts a comment)
    input: PathBuf,

    /// Write outbound notifications to this file as raw frames
    #[arg(long)]
    mirror_out: Option<PathBuf>,

    /// Stop at the first frame that fails
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Debug, Default, Serialize)]
struct ReplayReport {
    frames: usize,
    stored: usize,
    ignored: usize,
    forwarded: usize,
    unhandled: usize,
    errors: usize,
    keys: Vec<u16>,
    nvram: NvramStats,
    pool: PoolStats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    notifications: Vec<Notification>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli)?;

    let config = PlatformConfig::load(cli.config.as_deref())
        .context("Failed to load platform configuration")?;

    match cli.command {
        Commands::Replay(args) => replay_command(&config, args),
        Commands::Layout => layout_command(&config),
        Commands::ShowConfig => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

/// Setup logging with rolling files and console output
fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, "vnvram.log");

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color)
                .pretty(),
        )
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

/// Replay command - feed a capture through the host link
fn replay_command(config: &PlatformConfig, args: ReplayArgs) -> anyhow::Result<()> {
    let capture = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read capture {}", args.input.display()))?;

    let recorder = RecordingTransport::new();
    let transport: Box<dyn HostTransport> = match &args.mirror_out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            info!(path = %path.display(), "Mirroring notifications to file");
            Box::new(WriterTransport::new(BufWriter::new(file), config.transport))
        }
        None => Box::new(recorder.clone()),
    };

    let mut link = vnvram::bring_up(config, transport)?.with_app_handler(
        |opcode: u16, payload: &[u8]| {
            info!(opcode, len = payload.len(), "Application frame");
        },
    );

    let mut report = ReplayReport::default();

    for (line_no, line) in capture.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        report.frames += 1;

        let outcome = STANDARD
            .decode(line)
            .map_err(anyhow::Error::from)
            .and_then(|raw| link.handle_bytes(&raw).map_err(anyhow::Error::from));

        match outcome {
            Ok(Dispatch::Stored { .. }) => report.stored += 1,
            Ok(Dispatch::Ignored) => report.ignored += 1,
            Ok(Dispatch::Forwarded { .. }) => report.forwarded += 1,
            Ok(Dispatch::Unhandled { .. }) => report.unhandled += 1,
            Err(e) => {
                report.errors += 1;
                if args.fail_fast {
                    return Err(e.context(format!("Frame on line {} failed", line_no + 1)));
                }
                warn!(line = line_no + 1, error = %e, "Frame failed");
            }
        }
    }

    let store = link.store();
    report.keys = store.keys();
    report.nvram = store.stats();
    report.pool = store.pool().stats();
    report.notifications = recorder.take();

    if report.errors > 0 {
        error!(errors = report.errors, frames = report.frames, "Replay finished with errors");
    } else {
        info!(frames = report.frames, "Replay finished");
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct LayoutReport {
    heap: String,
    heap_capacity: usize,
    heap_remaining: usize,
    pool: PoolStats,
}

/// Layout command - describe the arena the configuration produces
fn layout_command(config: &PlatformConfig) -> anyhow::Result<()> {
    let report = layout_report(config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn layout_report(config: &PlatformConfig) -> anyhow::Result<LayoutReport> {
    let heap = HeapArena::new(config.heap.name.as_str(), config.heap.size);
    let pool = PoolAllocator::initialize(&config.pool.classes, &heap)
        .context("Pool initialization failed")?;

    Ok(LayoutReport {
        heap: heap.name().to_string(),
        heap_capacity: heap.capacity(),
        heap_remaining: heap.remaining(),
        pool: pool.stats(),
    })
}
