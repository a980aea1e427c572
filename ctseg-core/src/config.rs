//! Configuration system for ctseg.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment -> explicit overrides. Files are read
//! from `~/.config/ctseg/config.toml` and `<workspace>/.ctseg/config.toml`.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dataset::DatasetLayout;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CtsegConfig {
    /// Default directory names for the three framework roots.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Dataset naming and layout conventions.
    #[serde(default)]
    pub dataset: DatasetConfig,
    /// External framework executables and fixed flags.
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Training defaults.
    #[serde(default)]
    pub training: TrainingConfig,
}

/// Subdirectory names used under the current directory when the framework
/// environment variables are unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_dir: String,
    #[serde(default = "default_preprocessed_dir")]
    pub preprocessed_dir: String,
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            preprocessed_dir: default_preprocessed_dir(),
            results_dir: default_results_dir(),
        }
    }
}

fn default_raw_dir() -> String {
    "Datasets_Tr".to_string()
}

fn default_preprocessed_dir() -> String {
    "Datasets_preprocessed".to_string()
}

fn default_results_dir() -> String {
    "Datasets_results".to_string()
}

/// Dataset directory conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Suffix after `DatasetNNN_` in the dataset directory name.
    #[serde(default = "default_name_suffix")]
    pub name_suffix: String,
    #[serde(default = "default_images_dir")]
    pub images_dir: String,
    #[serde(default = "default_labels_dir")]
    pub labels_dir: String,
    /// Metadata descriptor expected directly under the dataset directory.
    #[serde(default = "default_descriptor_file")]
    pub descriptor_file: String,
    /// Extension counted when comparing images against labels.
    #[serde(default = "default_image_extension")]
    pub image_extension: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name_suffix: default_name_suffix(),
            images_dir: default_images_dir(),
            labels_dir: default_labels_dir(),
            descriptor_file: default_descriptor_file(),
            image_extension: default_image_extension(),
        }
    }
}

impl DatasetConfig {
    pub fn layout(&self) -> DatasetLayout {
        DatasetLayout {
            name_suffix: self.name_suffix.clone(),
            images_dir: self.images_dir.clone(),
            labels_dir: self.labels_dir.clone(),
            descriptor_file: self.descriptor_file.clone(),
            image_extension: self.image_extension.clone(),
        }
    }
}

fn default_name_suffix() -> String {
    "CT_Scans".to_string()
}

fn default_images_dir() -> String {
    "imagesTr".to_string()
}

fn default_labels_dir() -> String {
    "labelsTr".to_string()
}

fn default_descriptor_file() -> String {
    "dataset.json".to_string()
}

fn default_image_extension() -> String {
    ".nii.gz".to_string()
}

/// Framework command-line tools and the fixed flags passed to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_preprocess_tool")]
    pub preprocess: String,
    #[serde(default = "default_train_tool")]
    pub train: String,
    #[serde(default = "default_predict_tool")]
    pub predict: String,
    /// Compute device passed to the training tool.
    #[serde(default = "default_device")]
    pub device: String,
    /// Configuration planned during preprocessing.
    #[serde(default = "default_preprocess_configuration")]
    pub preprocess_configuration: String,
    /// Plans identifier embedded in result directory names.
    #[serde(default = "default_plans_identifier")]
    pub plans_identifier: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            preprocess: default_preprocess_tool(),
            train: default_train_tool(),
            predict: default_predict_tool(),
            device: default_device(),
            preprocess_configuration: default_preprocess_configuration(),
            plans_identifier: default_plans_identifier(),
        }
    }
}

fn default_preprocess_tool() -> String {
    "nnUNetv2_plan_and_preprocess".to_string()
}

fn default_train_tool() -> String {
    "nnUNetv2_train".to_string()
}

fn default_predict_tool() -> String {
    "nnUNetv2_predict".to_string()
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_preprocess_configuration() -> String {
    "3d_fullres".to_string()
}

fn default_plans_identifier() -> String {
    "nnUNetPlans".to_string()
}

/// Training defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Trainer class name handed to the framework.
    #[serde(default = "default_trainer")]
    pub trainer: String,
    /// Delete existing preprocessed output before re-running preprocessing.
    #[serde(default = "default_true")]
    pub clear_stale_preprocessed: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            trainer: default_trainer(),
            clear_stale_preprocessed: true,
        }
    }
}

fn default_trainer() -> String {
    crate::network::DEFAULT_TRAINER_NAME.to_string()
}

fn default_true() -> bool {
    true
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "ctseg", "ctseg")
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".ctseg").join("config.toml")
}

/// Load configuration by merging, in increasing precedence:
/// 1. Built-in defaults
/// 2. User config (`~/.config/ctseg/config.toml`)
/// 3. Workspace-local config (`.ctseg/config.toml`) or an explicit file
/// 4. Environment variables (`CTSEG_TOOLS__DEVICE`, ...)
/// 5. Explicit overrides
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&CtsegConfig>,
) -> Result<CtsegConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(CtsegConfig::default()));

    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(file) = config_file {
        figment = figment.merge(Toml::file(file));
    }

    figment = figment.merge(Env::prefixed("CTSEG_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}
