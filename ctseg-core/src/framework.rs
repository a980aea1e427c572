//! Command lines for the framework's preprocessing, training, and prediction
//! tools, plus its result directory convention.

use crate::config::ToolsConfig;
use crate::dataset::DatasetId;
use crate::env::EnvPaths;
use crate::runner::ToolInvocation;
use crate::types::{Configuration, Fold};
use std::path::{Path, PathBuf};

/// Builds framework tool invocations. Every invocation carries the resolved
/// roots as environment variables.
#[derive(Debug, Clone)]
pub struct FrameworkCli {
    tools: ToolsConfig,
    paths: EnvPaths,
}

impl FrameworkCli {
    pub fn new(tools: ToolsConfig, paths: EnvPaths) -> Self {
        Self { tools, paths }
    }

    pub fn paths(&self) -> &EnvPaths {
        &self.paths
    }

    fn invocation(&self, program: &str) -> ToolInvocation {
        ToolInvocation::new(program).envs(self.paths.vars())
    }

    /// `plan_and_preprocess -d <id> -c <config> --verify_dataset_integrity`
    pub fn preprocess(&self, dataset: DatasetId) -> ToolInvocation {
        self.invocation(&self.tools.preprocess)
            .args(["-d".to_string(), dataset.to_string()])
            .args(["-c", self.tools.preprocess_configuration.as_str()])
            .arg("--verify_dataset_integrity")
    }

    /// `train <dataset_name> <config> <fold> -tr <trainer> --npz -device <device>`
    pub fn train(
        &self,
        dataset_name: &str,
        configuration: Configuration,
        fold: Fold,
        trainer: &str,
    ) -> ToolInvocation {
        self.invocation(&self.tools.train)
            .arg(dataset_name)
            .arg(configuration.as_str())
            .arg(fold.to_string())
            .args(["-tr", trainer])
            .arg("--npz")
            .args(["-device", self.tools.device.as_str()])
    }

    /// `predict -i <in> -o <out> -d <dataset_name> -tr <trainer> -c <config> -f <fold>`
    pub fn predict(
        &self,
        input: &Path,
        output: &Path,
        dataset_name: &str,
        trainer: &str,
        configuration: Configuration,
        fold: Fold,
    ) -> ToolInvocation {
        self.invocation(&self.tools.predict)
            .arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .args(["-d", dataset_name])
            .args(["-tr", trainer])
            .args(["-c", configuration.as_str()])
            .args(["-f".to_string(), fold.to_string()])
    }

    /// `results/<dataset>/<trainer>__<plans>__<config>`
    pub fn results_dir(&self, dataset_name: &str, trainer: &str, configuration: Configuration) -> PathBuf {
        self.paths.results.join(dataset_name).join(format!(
            "{}__{}__{}",
            trainer, self.tools.plans_identifier, configuration
        ))
    }

    /// Follow-up prediction command suggested after training.
    pub fn suggested_predict_command(
        &self,
        dataset_name: &str,
        trainer: &str,
        configuration: Configuration,
        fold: Fold,
    ) -> String {
        format!(
            "{} -i INPUT_FOLDER -o OUTPUT_FOLDER -d {} -tr {} -c {} -f {}",
            self.tools.predict, dataset_name, trainer, configuration, fold
        )
    }
}
