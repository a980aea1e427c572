//! CLI subcommand handlers.

use crate::{Commands, ConfigAction, PredictArgs, TrainArgs};
use ctseg_core::config::workspace_config_path;
use ctseg_core::{
    CtsegConfig, DatasetId, EnvPaths, FrameworkCli, PipelineDriver, PipelineOptions,
    PredictOptions, PredictionDriver, SubprocessRunner, check_dataset, load_config,
};
use std::path::Path;
use std::sync::Arc;
use tracing::error;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Train(args) => handle_train(args, &load(workspace, config_file)?).await,
        Commands::Predict(args) => handle_predict(args, &load(workspace, config_file)?).await,
        Commands::Check { dataset } => handle_check(dataset, &load(workspace, config_file)?),
        Commands::Config { action } => handle_config(action, workspace, config_file),
    }
}

fn load(workspace: &Path, config_file: Option<&Path>) -> anyhow::Result<CtsegConfig> {
    load_config(Some(workspace), config_file, None)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

fn framework(config: &CtsegConfig) -> anyhow::Result<FrameworkCli> {
    let paths = EnvPaths::from_process(&config.paths)?;
    Ok(FrameworkCli::new(config.tools.clone(), paths))
}

async fn handle_train(args: TrainArgs, config: &CtsegConfig) -> anyhow::Result<()> {
    let driver = PipelineDriver::new(
        Arc::new(SubprocessRunner::new()),
        framework(config)?,
        config.dataset.layout(),
    );

    let options = PipelineOptions {
        dataset: DatasetId(args.dataset),
        fold: args.fold,
        configuration: args.configuration,
        trainer: args
            .trainer
            .unwrap_or_else(|| config.training.trainer.clone()),
        skip_preprocessing: args.skip_preprocessing,
        clear_stale_preprocessed: config.training.clear_stale_preprocessed
            && !args.keep_preprocessed,
    };

    let outcome = driver.run(&options).await?;
    if !outcome.succeeded() {
        anyhow::bail!("Training pipeline aborted ({:?})", outcome.state);
    }
    Ok(())
}

async fn handle_predict(args: PredictArgs, config: &CtsegConfig) -> anyhow::Result<()> {
    let driver = PredictionDriver::new(
        Arc::new(SubprocessRunner::new()),
        framework(config)?,
        config.dataset.layout(),
    );

    let options = PredictOptions {
        dataset: DatasetId(args.dataset),
        fold: args.fold,
        configuration: args.configuration,
        trainer: args
            .trainer
            .unwrap_or_else(|| config.training.trainer.clone()),
        input: args.input,
        output: args.output,
    };

    let report = driver.run(&options).await?;
    if !report.success {
        error!("Evaluation failed.");
        anyhow::bail!("Prediction failed");
    }
    Ok(())
}

fn handle_check(dataset: u32, config: &CtsegConfig) -> anyhow::Result<()> {
    let paths = EnvPaths::from_process(&config.paths)?;
    let report = check_dataset(DatasetId(dataset), &paths.raw, &config.dataset.layout());
    if !report.is_ready() {
        anyhow::bail!("Dataset {} is not ready", report.dataset_name);
    }
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }

            let toml_str = toml::to_string_pretty(&CtsegConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, config_file)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}
