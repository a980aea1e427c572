//! ctseg CLI: drives an nnU-Net style framework through preprocessing,
//! training, and prediction.

mod commands;

use clap::Parser;
use ctseg_core::{Configuration, Fold};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// ctseg: CT segmentation training and prediction pipeline
#[derive(Parser, Debug)]
#[command(name = "ctseg", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Workspace directory (holds `.ctseg/config.toml`)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Additional configuration file
    #[arg(long = "config-file", global = true)]
    config_file: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Validate the dataset, preprocess it, and train the custom trainer
    Train(TrainArgs),
    /// Predict segmentations for a folder of images
    Predict(PredictArgs),
    /// Validate a dataset directory without running any tools
    Check {
        /// Dataset ID (e.g., 1 for Dataset001_CT_Scans)
        #[arg(long, default_value_t = 1)]
        dataset: u32,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct TrainArgs {
    /// Dataset ID (e.g., 1 for Dataset001_CT_Scans)
    #[arg(long, default_value_t = 1)]
    pub dataset: u32,

    /// Fold number or 'all'
    #[arg(long, default_value_t = Fold::Index(0))]
    pub fold: Fold,

    /// Training configuration
    #[arg(long = "config", value_enum, default_value_t = Configuration::ThreeDFullres)]
    pub configuration: Configuration,

    /// Trainer class name (defaults to the configured trainer)
    #[arg(long)]
    pub trainer: Option<String>,

    /// Skip preprocessing if already done
    #[arg(long)]
    pub skip_preprocessing: bool,

    /// Keep existing preprocessed data instead of deleting it before preprocessing
    #[arg(long)]
    pub keep_preprocessed: bool,
}

#[derive(clap::Args, Debug)]
pub(crate) struct PredictArgs {
    /// Dataset ID
    #[arg(long, default_value_t = 1)]
    pub dataset: u32,

    /// Fold number or 'all'
    #[arg(long, default_value_t = Fold::Index(0))]
    pub fold: Fold,

    /// Training configuration
    #[arg(long = "config", value_enum, default_value_t = Configuration::ThreeDFullres)]
    pub configuration: Configuration,

    /// Trainer class name (defaults to the configured trainer)
    #[arg(long)]
    pub trainer: Option<String>,

    /// Input folder for images
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output folder for predictions
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Write a default configuration file into the workspace
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "ctseg", "ctseg")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "ctseg.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config_file.as_deref()).await
}
