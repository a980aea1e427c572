//! End-to-end pipeline and prediction scenarios against a recording runner.

use async_trait::async_trait;
use ctseg_core::config::{PathsConfig, ToolsConfig};
use ctseg_core::{
    CommandRunner, Configuration, DatasetId, DatasetLayout, EnvPaths, Fold, FrameworkCli,
    PipelineDriver, PipelineOptions, PipelineState, PredictOptions, PredictionDriver, SegError,
    StageKind, ToolInvocation, ToolOutput,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Records invocations and answers with a scripted exit code per program.
#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<ToolInvocation>>,
    exit_codes: HashMap<String, i32>,
    /// Path whose existence is sampled at each invocation.
    watched: Option<PathBuf>,
    watched_seen: Mutex<Vec<bool>>,
}

impl RecordingRunner {
    fn failing(program: &str, code: i32) -> Self {
        Self {
            exit_codes: HashMap::from([(program.to_string(), code)]),
            ..Default::default()
        }
    }

    fn programs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.program.clone())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, SegError> {
        if let Some(path) = &self.watched {
            self.watched_seen.lock().unwrap().push(path.exists());
        }
        self.calls.lock().unwrap().push(invocation.clone());
        let code = self
            .exit_codes
            .get(&invocation.program)
            .copied()
            .unwrap_or(0);
        Ok(ToolOutput {
            exit_code: Some(code),
            stdout: format!("{} done", invocation.program),
            stderr: if code == 0 {
                String::new()
            } else {
                "boom".to_string()
            },
        })
    }
}

struct Fixture {
    _dir: TempDir,
    paths: EnvPaths,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let paths = EnvPaths::resolve(dir.path(), &PathsConfig::default(), |_| None).unwrap();
        Self { _dir: dir, paths }
    }

    fn with_dataset(id: u32) -> Self {
        let fixture = Self::new();
        let root = fixture.paths.raw.join(DatasetId(id).name("CT_Scans"));
        std::fs::create_dir_all(root.join("imagesTr")).unwrap();
        std::fs::create_dir_all(root.join("labelsTr")).unwrap();
        std::fs::write(root.join("dataset.json"), "{}").unwrap();
        std::fs::write(root.join("imagesTr").join("case_000_0000.nii.gz"), b"").unwrap();
        std::fs::write(root.join("labelsTr").join("case_000.nii.gz"), b"").unwrap();
        fixture
    }

    fn preprocessed_dir(&self, id: u32) -> PathBuf {
        self.paths.preprocessed.join(DatasetId(id).name("CT_Scans"))
    }

    fn pipeline(&self, runner: Arc<RecordingRunner>) -> PipelineDriver {
        PipelineDriver::new(
            runner,
            FrameworkCli::new(ToolsConfig::default(), self.paths.clone()),
            DatasetLayout::default(),
        )
    }
}

fn seed_stale(dir: &Path) {
    std::fs::create_dir_all(dir.join("nnUNetPlans_3d_fullres")).unwrap();
    std::fs::write(dir.join("nnUNetPlans.json"), "{}").unwrap();
}

#[tokio::test]
async fn test_full_run_reaches_done() {
    let fixture = Fixture::with_dataset(1);
    let runner = Arc::new(RecordingRunner::default());

    let outcome = fixture
        .pipeline(runner.clone())
        .run(&PipelineOptions::new(DatasetId(1)))
        .await
        .unwrap();

    assert!(outcome.succeeded());
    assert_eq!(outcome.state, PipelineState::Done);
    assert_eq!(
        runner.programs(),
        vec!["nnUNetv2_plan_and_preprocess", "nnUNetv2_train"]
    );
    assert_eq!(
        outcome.results_dir,
        Some(
            fixture
                .paths
                .results
                .join("Dataset001_CT_Scans")
                .join("trainer__nnUNetPlans__3d_fullres")
        )
    );

    let calls = runner.calls.lock().unwrap();
    for call in calls.iter() {
        let env: HashMap<_, _> = call.envs.iter().cloned().collect();
        assert_eq!(
            env.get("nnUNet_raw").map(OsString::as_os_str),
            Some(fixture.paths.raw.as_os_str())
        );
        assert!(env.contains_key("nnUNet_preprocessed"));
        assert!(env.contains_key("nnUNet_results"));
    }
}

#[tokio::test]
async fn test_failed_validation_invokes_nothing() {
    let fixture = Fixture::new();
    let runner = Arc::new(RecordingRunner::default());

    let outcome = fixture
        .pipeline(runner.clone())
        .run(&PipelineOptions::new(DatasetId(9)))
        .await
        .unwrap();

    assert_eq!(outcome.state, PipelineState::Aborted);
    assert!(!outcome.dataset.is_ready());
    assert!(outcome.stages.is_empty());
    assert!(runner.programs().is_empty());
}

#[tokio::test]
async fn test_training_failure_aborts_before_done() {
    let fixture = Fixture::with_dataset(1);
    let runner = Arc::new(RecordingRunner::failing("nnUNetv2_train", 1));

    let outcome = fixture
        .pipeline(runner.clone())
        .run(&PipelineOptions::new(DatasetId(1)))
        .await
        .unwrap();

    assert!(!outcome.succeeded());
    assert_eq!(outcome.state, PipelineState::Aborted);
    assert_eq!(outcome.results_dir, None);
    assert!(outcome.stage(StageKind::Preprocess).unwrap().success);
    let train = outcome.stage(StageKind::Train).unwrap();
    assert!(!train.success);
    assert_eq!(train.exit_code, Some(1));
    assert_eq!(train.stderr, "boom");
}

#[tokio::test]
async fn test_preprocess_failure_skips_training() {
    let fixture = Fixture::with_dataset(1);
    let runner = Arc::new(RecordingRunner::failing("nnUNetv2_plan_and_preprocess", 2));

    let outcome = fixture
        .pipeline(runner.clone())
        .run(&PipelineOptions::new(DatasetId(1)))
        .await
        .unwrap();

    assert_eq!(outcome.state, PipelineState::Aborted);
    assert_eq!(runner.programs(), vec!["nnUNetv2_plan_and_preprocess"]);
}

#[tokio::test]
async fn test_stale_preprocessed_removed_before_preprocess() {
    let fixture = Fixture::with_dataset(1);
    let stale = fixture.preprocessed_dir(1);
    seed_stale(&stale);
    let runner = Arc::new(RecordingRunner {
        watched: Some(stale.clone()),
        ..Default::default()
    });

    let outcome = fixture
        .pipeline(runner.clone())
        .run(&PipelineOptions::new(DatasetId(1)))
        .await
        .unwrap();

    assert!(outcome.succeeded());
    // Sampled at the preprocess call and again at the train call.
    assert_eq!(*runner.watched_seen.lock().unwrap(), vec![false, false]);
}

#[tokio::test]
async fn test_keep_preprocessed_leaves_directory() {
    let fixture = Fixture::with_dataset(1);
    let stale = fixture.preprocessed_dir(1);
    seed_stale(&stale);
    let runner = Arc::new(RecordingRunner::default());

    let mut options = PipelineOptions::new(DatasetId(1));
    options.clear_stale_preprocessed = false;
    fixture.pipeline(runner.clone()).run(&options).await.unwrap();

    assert!(stale.join("nnUNetPlans.json").exists());
    assert_eq!(runner.programs().len(), 2);
}

#[tokio::test]
async fn test_skip_preprocessing_never_preprocesses() {
    let fixture = Fixture::with_dataset(1);
    let stale = fixture.preprocessed_dir(1);
    seed_stale(&stale);
    let runner = Arc::new(RecordingRunner::default());

    let mut options = PipelineOptions::new(DatasetId(1));
    options.skip_preprocessing = true;
    options.fold = Fold::All;
    options.configuration = Configuration::TwoD;
    let outcome = fixture.pipeline(runner.clone()).run(&options).await.unwrap();

    assert!(outcome.succeeded());
    assert_eq!(runner.programs(), vec!["nnUNetv2_train"]);
    assert!(stale.exists());
    let calls = runner.calls.lock().unwrap();
    let args: Vec<_> = calls[0].args.iter().map(|a| a.to_str().unwrap()).collect();
    assert_eq!(
        args,
        vec!["Dataset001_CT_Scans", "2d", "all", "-tr", "trainer", "--npz", "-device", "cpu"]
    );
}

#[tokio::test]
async fn test_prediction_creates_output_and_reports() {
    let fixture = Fixture::with_dataset(1);
    let runner = Arc::new(RecordingRunner::default());
    let driver = PredictionDriver::new(
        runner.clone(),
        FrameworkCli::new(ToolsConfig::default(), fixture.paths.clone()),
        DatasetLayout::default(),
    );

    let report = driver.run(&PredictOptions::new(DatasetId(1))).await.unwrap();

    let output = fixture
        .paths
        .results
        .join("Dataset001_CT_Scans")
        .join("predictions");
    assert!(report.success);
    assert_eq!(report.stage, StageKind::Predict);
    assert!(output.is_dir());
    assert_eq!(runner.programs(), vec!["nnUNetv2_predict"]);
}

#[tokio::test]
async fn test_prediction_failure_is_reported_not_raised() {
    let fixture = Fixture::with_dataset(1);
    let runner = Arc::new(RecordingRunner::failing("nnUNetv2_predict", 1));
    let driver = PredictionDriver::new(
        runner.clone(),
        FrameworkCli::new(ToolsConfig::default(), fixture.paths.clone()),
        DatasetLayout::default(),
    );

    let mut options = PredictOptions::new(DatasetId(1));
    options.output = Some(fixture.paths.results.join("custom_out"));
    let report = driver.run(&options).await.unwrap();

    assert!(!report.success);
    assert!(fixture.paths.results.join("custom_out").is_dir());
    assert_eq!(runner.programs().len(), 1);
}
