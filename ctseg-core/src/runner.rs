//! External command execution.
//!
//! Every framework tool runs to completion with stdout and stderr fully
//! captured. There is no timeout and no retry; the exit status is the only
//! success signal.

use crate::error::SegError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// A fully specified external command.
///
/// Arguments and variable values are OS strings so paths reach the child
/// unchanged even when they are not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<OsString>,
    /// Variables added on top of the inherited environment.
    pub envs: Vec<(String, OsString)>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    pub fn envs(mut self, vars: Vec<(String, OsString)>) -> Self {
        self.envs.extend(vars);
        self
    }

    /// The command line as it is logged. Non-UTF-8 bytes are replaced.
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|arg| arg.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external commands. Implemented by [`SubprocessRunner`] and by test
/// doubles that record invocations.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, SegError>;
}

/// Spawns real child processes with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner;

impl SubprocessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SubprocessRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, SegError> {
        debug!(program = %invocation.program, args = ?invocation.args, "Spawning tool");

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k.as_str(), v.as_os_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SegError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Which external step a [`StageReport`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Preprocess,
    Train,
    Predict,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Preprocess => "Preprocessing",
            Self::Train => "Training",
            Self::Predict => "Prediction",
        })
    }
}

/// Outcome of one external stage. Each stage either fully succeeds or fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: StageKind,
    pub command: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Run one stage and log its captured output.
///
/// Successful runs log stdout at INFO and any stderr at WARN. Failed runs log
/// the return code and stderr at ERROR.
pub async fn run_stage(
    runner: &dyn CommandRunner,
    stage: StageKind,
    invocation: &ToolInvocation,
) -> Result<StageReport, SegError> {
    let command = invocation.display_command();
    info!("Running {} command: {}", stage.to_string().to_lowercase(), command);

    let started_at = Utc::now();
    let output = runner.run(invocation).await?;
    let finished_at = Utc::now();
    let success = output.success();

    if success {
        if !output.stdout.trim().is_empty() {
            info!("{}", output.stdout.trim_end());
        }
        if !output.stderr.trim().is_empty() {
            warn!("{}", output.stderr.trim_end());
        }
        info!("{} completed successfully", stage);
    } else {
        match output.exit_code {
            Some(code) => error!("{} failed with return code {}", stage, code),
            None => error!("{} was terminated by a signal", stage),
        }
        if !output.stderr.trim().is_empty() {
            error!("{}", output.stderr.trim_end());
        }
    }

    Ok(StageReport {
        stage,
        command,
        success,
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
        started_at,
        finished_at,
    })
}
