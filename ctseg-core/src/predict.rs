//! Prediction on a folder of images with a trained model.

use crate::dataset::{DatasetId, DatasetLayout};
use crate::error::SegError;
use crate::framework::FrameworkCli;
use crate::runner::{CommandRunner, StageKind, StageReport, run_stage};
use crate::types::{Configuration, Fold};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Parameters of one prediction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictOptions {
    pub dataset: DatasetId,
    pub fold: Fold,
    pub configuration: Configuration,
    pub trainer: String,
    /// Defaults to `raw/<dataset>/<images_dir>`.
    pub input: Option<PathBuf>,
    /// Defaults to `results/<dataset>/predictions`.
    pub output: Option<PathBuf>,
}

impl PredictOptions {
    pub fn new(dataset: DatasetId) -> Self {
        Self {
            dataset,
            fold: Fold::default(),
            configuration: Configuration::default(),
            trainer: crate::network::DEFAULT_TRAINER_NAME.to_string(),
            input: None,
            output: None,
        }
    }
}

/// Runs the framework's prediction tool once.
pub struct PredictionDriver {
    runner: Arc<dyn CommandRunner>,
    framework: FrameworkCli,
    layout: DatasetLayout,
}

impl PredictionDriver {
    pub fn new(runner: Arc<dyn CommandRunner>, framework: FrameworkCli, layout: DatasetLayout) -> Self {
        Self {
            runner,
            framework,
            layout,
        }
    }

    /// Resolve `(input, output)` folders, filling in the conventional defaults.
    pub fn folders(&self, options: &PredictOptions) -> (PathBuf, PathBuf) {
        let dataset_name = self.layout.dataset_name(options.dataset);
        let paths = self.framework.paths();
        let input = options.input.clone().unwrap_or_else(|| {
            paths
                .raw
                .join(&dataset_name)
                .join(&self.layout.images_dir)
        });
        let output = options
            .output
            .clone()
            .unwrap_or_else(|| paths.results.join(&dataset_name).join("predictions"));
        (input, output)
    }

    /// Create the output folder and run prediction. A non-zero exit is returned
    /// as an unsuccessful report.
    pub async fn run(&self, options: &PredictOptions) -> Result<StageReport, SegError> {
        let dataset_name = self.layout.dataset_name(options.dataset);
        let (input, output) = self.folders(options);

        tokio::fs::create_dir_all(&output)
            .await
            .map_err(|source| SegError::CreateDir {
                path: output.clone(),
                source,
            })?;

        let invocation = self.framework.predict(
            &input,
            &output,
            &dataset_name,
            &options.trainer,
            options.configuration,
            options.fold,
        );
        let report = run_stage(self.runner.as_ref(), StageKind::Predict, &invocation).await?;
        if report.success {
            info!("Predictions saved to {}", output.display());
        }
        Ok(report)
    }
}
