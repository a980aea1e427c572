//! Error types for the ctseg-core crate.
//!
//! Expected outcomes (a malformed dataset, a tool exiting non-zero) are reported
//! as values; `SegError` only carries faults that end the run.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for orchestration operations.
#[derive(Debug, Error)]
pub enum SegError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Network construction error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl SegError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }
}

