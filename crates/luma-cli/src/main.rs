//! luma - batch RGBA to grayscale conversion on the GPU

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use luma_gpu::{ConverterConfig, TileSize};

mod commands;

#[derive(Parser)]
#[command(name = "luma")]
#[command(author, version, about = "Batch RGBA to grayscale conversion on the GPU")]
#[command(long_about = "
Converts every PNG/JPEG image in a directory to 8-bit grayscale using a
GPU compute kernel. Output files keep their names.

Examples:
  luma convert frames/ gray/            # Best GPU, 16x16 work-groups
  luma convert frames/ gray/ --device 1 --tile 32x8
  luma devices                          # List devices and the default pick
  RUST_LOG=luma_gpu=trace luma convert in/ out/
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every image in a directory
    #[command(visible_alias = "c")]
    Convert(ConvertArgs),

    /// List compute devices
    #[command(visible_alias = "d")]
    Devices(DeviceArgs),
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Input directory
    input: PathBuf,

    /// Output directory (created if missing)
    output: PathBuf,

    #[command(flatten)]
    device: DeviceArgs,

    /// Work-group size: N or WxH
    #[arg(short, long, default_value_t = TileSize::default())]
    tile: TileSize,

    /// Give up on a readback after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Args)]
pub struct DeviceArgs {
    /// Device index as listed by `luma devices`
    #[arg(short, long)]
    device: Option<usize>,

    /// Fail instead of falling back to a non-GPU device
    #[arg(long)]
    no_fallback: bool,
}

impl DeviceArgs {
    fn config(&self) -> ConverterConfig {
        ConverterConfig::default()
            .device_index(self.device)
            .allow_fallback(!self.no_fallback)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Convert(args) => commands::convert::run(args, cli.verbose),
        Commands::Devices(args) => commands::devices::run(args),
    }
}

/// Console logging to stderr plus an optional file sink. `RUST_LOG`
/// overrides the level derived from `-v`.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,luma_core={level},luma_gpu={level},luma_io={level},luma_cli={level}"
        ))
    });

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}
