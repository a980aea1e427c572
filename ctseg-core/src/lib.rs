//! # ctseg-core
//!
//! Orchestration layer around an nnU-Net style segmentation framework. The
//! framework itself (planning, training, inference) is an external collaborator
//! reached through its command-line tools; this crate resolves the directory
//! roots those tools expect, validates datasets, and sequences the tool
//! invocations.

pub mod config;
pub mod dataset;
pub mod env;
pub mod error;
pub mod framework;
pub mod network;
pub mod pipeline;
pub mod predict;
pub mod runner;
pub mod types;

pub use config::{CtsegConfig, load_config};
pub use dataset::{DatasetId, DatasetLayout, DatasetReport, MissingItem, check_dataset};
pub use env::EnvPaths;
pub use error::SegError;
pub use framework::FrameworkCli;
pub use network::{ArchitectureSpec, ChannelLoggingBuilder, CustomTrainer, NetworkBuilder};
pub use pipeline::{PipelineDriver, PipelineOptions, PipelineOutcome, PipelineState};
pub use predict::{PredictOptions, PredictionDriver};
pub use runner::{CommandRunner, StageKind, StageReport, SubprocessRunner, ToolInvocation, ToolOutput};
pub use types::{Configuration, Fold};
