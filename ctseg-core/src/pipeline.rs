//! Dataset check, preprocessing, and training, run strictly in sequence.
//!
//! ```text
//! NotStarted -> DatasetChecked -> Preprocessed -> Trained -> Done
//!      \______________\_______________\____________\-> Aborted
//! ```
//!
//! A failed stage moves the run to `Aborted` and nothing after it runs.

use crate::dataset::{DatasetId, DatasetLayout, DatasetReport, check_dataset};
use crate::error::SegError;
use crate::framework::FrameworkCli;
use crate::runner::{CommandRunner, StageKind, StageReport, run_stage};
use crate::types::{Configuration, Fold};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

const BANNER_WIDTH: usize = 80;

/// Position of a run in the pipeline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    NotStarted,
    DatasetChecked,
    Preprocessed,
    Trained,
    Done,
    Aborted,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

/// Parameters of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub dataset: DatasetId,
    pub fold: Fold,
    pub configuration: Configuration,
    pub trainer: String,
    pub skip_preprocessing: bool,
    /// Remove an existing preprocessed directory before preprocessing again.
    pub clear_stale_preprocessed: bool,
}

impl PipelineOptions {
    pub fn new(dataset: DatasetId) -> Self {
        Self {
            dataset,
            fold: Fold::default(),
            configuration: Configuration::default(),
            trainer: crate::network::DEFAULT_TRAINER_NAME.to_string(),
            skip_preprocessing: false,
            clear_stale_preprocessed: true,
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub state: PipelineState,
    pub dataset: DatasetReport,
    pub stages: Vec<StageReport>,
    /// Set only when the run reached `Done`.
    pub results_dir: Option<PathBuf>,
}

impl PipelineOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Done
    }

    pub fn stage(&self, kind: StageKind) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == kind)
    }
}

/// Drives one dataset through preprocessing and training.
pub struct PipelineDriver {
    runner: Arc<dyn CommandRunner>,
    framework: FrameworkCli,
    layout: DatasetLayout,
}

impl PipelineDriver {
    pub fn new(runner: Arc<dyn CommandRunner>, framework: FrameworkCli, layout: DatasetLayout) -> Self {
        Self {
            runner,
            framework,
            layout,
        }
    }

    /// Run the pipeline to `Done` or `Aborted`.
    ///
    /// Tool failures are reported through the outcome; `Err` is reserved for
    /// faults such as a tool that cannot be spawned or an undeletable
    /// preprocessed directory.
    pub async fn run(&self, options: &PipelineOptions) -> Result<PipelineOutcome, SegError> {
        let mut state = PipelineState::NotStarted;
        let mut stages = Vec::new();

        let report = check_dataset(options.dataset, &self.framework.paths().raw, &self.layout);
        if !report.is_ready() {
            error!("Dataset check failed. Please fix the issues and try again.");
            transition(&mut state, PipelineState::Aborted);
            return Ok(PipelineOutcome {
                state,
                dataset: report,
                stages,
                results_dir: None,
            });
        }
        transition(&mut state, PipelineState::DatasetChecked);

        let dataset_name = report.dataset_name.clone();

        if options.skip_preprocessing {
            info!("Skipping preprocessing (skip_preprocessing=true)");
        } else {
            let stage = self.preprocess(options, &dataset_name).await?;
            let ok = stage.success;
            stages.push(stage);
            if !ok {
                error!("Preprocessing failed. Exiting.");
                transition(&mut state, PipelineState::Aborted);
                return Ok(PipelineOutcome {
                    state,
                    dataset: report,
                    stages,
                    results_dir: None,
                });
            }
        }
        transition(&mut state, PipelineState::Preprocessed);

        banner("STEP 2: TRAINING");
        let invocation = self.framework.train(
            &dataset_name,
            options.configuration,
            options.fold,
            &options.trainer,
        );
        let stage = run_stage(self.runner.as_ref(), StageKind::Train, &invocation).await?;
        let ok = stage.success;
        stages.push(stage);
        if !ok {
            error!("Training failed. Please check the errors above.");
            transition(&mut state, PipelineState::Aborted);
            return Ok(PipelineOutcome {
                state,
                dataset: report,
                stages,
                results_dir: None,
            });
        }
        transition(&mut state, PipelineState::Trained);

        let results_dir =
            self.framework
                .results_dir(&dataset_name, &options.trainer, options.configuration);
        info!("Results saved to: {}", results_dir.display());
        info!("To evaluate your model, run:");
        info!(
            "{}",
            self.framework.suggested_predict_command(
                &dataset_name,
                &options.trainer,
                options.configuration,
                options.fold,
            )
        );
        transition(&mut state, PipelineState::Done);

        Ok(PipelineOutcome {
            state,
            dataset: report,
            stages,
            results_dir: Some(results_dir),
        })
    }

    async fn preprocess(
        &self,
        options: &PipelineOptions,
        dataset_name: &str,
    ) -> Result<StageReport, SegError> {
        if options.clear_stale_preprocessed {
            let stale = self.framework.paths().preprocessed.join(dataset_name);
            if stale.exists() {
                tokio::fs::remove_dir_all(&stale).await?;
                info!("Old preprocessed data removed: {}", stale.display());
            }
        }

        banner("STEP 1: PREPROCESSING");
        let invocation = self.framework.preprocess(options.dataset);
        run_stage(self.runner.as_ref(), StageKind::Preprocess, &invocation).await
    }
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    debug!(from = ?state, to = ?next, "Pipeline transition");
    *state = next;
}

fn banner(title: &str) {
    info!("{}", "=".repeat(BANNER_WIDTH));
    info!("{}", title);
    info!("{}", "=".repeat(BANNER_WIDTH));
}
