//! Resolution of the three directory roots the framework reads from its
//! environment.
//!
//! The resolved roots are never written into this process's environment.
//! They travel as an [`EnvPaths`] value and are attached to each child
//! command right before it is spawned (see [`crate::runner::ToolInvocation`]).

use crate::config::PathsConfig;
use crate::error::SegError;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming the raw dataset root.
pub const RAW_VAR: &str = "nnUNet_raw";
/// Environment variable naming the preprocessed data root.
pub const PREPROCESSED_VAR: &str = "nnUNet_preprocessed";
/// Environment variable naming the results root.
pub const RESULTS_VAR: &str = "nnUNet_results";

/// The three resolved framework roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvPaths {
    pub raw: PathBuf,
    pub preprocessed: PathBuf,
    pub results: PathBuf,
}

impl EnvPaths {
    /// Resolve each root from `lookup`, falling back to `cwd/<default>`, and
    /// create every directory (with parents) that does not exist yet.
    ///
    /// Values returned by `lookup` are used verbatim, including bytes that are
    /// not valid UTF-8. An empty value counts as unset.
    pub fn resolve<F>(cwd: &Path, defaults: &PathsConfig, lookup: F) -> Result<Self, SegError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let pick = |var: &str, default: &str| -> PathBuf {
            match lookup(var) {
                Some(value) if !value.is_empty() => PathBuf::from(value),
                _ => cwd.join(default),
            }
        };

        let paths = Self {
            raw: pick(RAW_VAR, &defaults.raw_dir),
            preprocessed: pick(PREPROCESSED_VAR, &defaults.preprocessed_dir),
            results: pick(RESULTS_VAR, &defaults.results_dir),
        };

        info!("Setting up framework environment variables:");
        for (name, dir) in paths.entries() {
            std::fs::create_dir_all(dir).map_err(|source| SegError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
            info!("  {}: {}", name, dir.display());
        }

        Ok(paths)
    }

    /// Resolve from the process environment and current working directory.
    pub fn from_process(defaults: &PathsConfig) -> Result<Self, SegError> {
        let cwd = std::env::current_dir()?;
        Self::resolve(&cwd, defaults, |var| std::env::var_os(var))
    }

    fn entries(&self) -> [(&'static str, &Path); 3] {
        [
            (RAW_VAR, self.raw.as_path()),
            (PREPROCESSED_VAR, self.preprocessed.as_path()),
            (RESULTS_VAR, self.results.as_path()),
        ]
    }

    /// `(name, value)` pairs to export to child processes.
    pub fn vars(&self) -> Vec<(String, OsString)> {
        self.entries()
            .iter()
            .map(|(name, dir)| (name.to_string(), dir.as_os_str().to_os_string()))
            .collect()
    }
}
