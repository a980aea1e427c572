//! Network construction hook for the custom trainer.
//!
//! The framework builds its network by calling back into the trainer it was
//! given by name. The custom trainer only wraps the framework's own builder:
//! arguments and the returned network pass through untouched, and channel
//! counts are logged on the way.

use crate::error::SegError;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Trainer name passed to the framework via `-tr`.
pub const DEFAULT_TRAINER_NAME: &str = "trainer";

/// Arguments the framework supplies when it asks for a network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureSpec {
    /// Fully qualified architecture class.
    pub class_name: String,
    /// Keyword arguments for the architecture constructor.
    #[serde(default)]
    pub init_kwargs: serde_json::Map<String, serde_json::Value>,
    /// Modules to import when resolving entries of `init_kwargs`.
    #[serde(default)]
    pub required_imports: Vec<String>,
    pub input_channels: u32,
    pub output_channels: u32,
    #[serde(default = "default_deep_supervision")]
    pub deep_supervision: bool,
}

fn default_deep_supervision() -> bool {
    true
}

impl ArchitectureSpec {
    pub fn from_json(text: &str) -> Result<Self, SegError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Capability to construct a network from an [`ArchitectureSpec`].
pub trait NetworkBuilder {
    type Network;

    fn build_network(&self, spec: &ArchitectureSpec) -> Result<Self::Network, SegError>;
}

/// Adapts a closure into a [`NetworkBuilder`].
pub struct BuilderFn<F>(pub F);

impl<F, N> NetworkBuilder for BuilderFn<F>
where
    F: Fn(&ArchitectureSpec) -> Result<N, SegError>,
{
    type Network = N;

    fn build_network(&self, spec: &ArchitectureSpec) -> Result<N, SegError> {
        (self.0)(spec)
    }
}

/// Passthrough builder that logs channel counts around construction.
pub struct ChannelLoggingBuilder<B> {
    inner: B,
}

impl<B: NetworkBuilder> ChannelLoggingBuilder<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B: NetworkBuilder> NetworkBuilder for ChannelLoggingBuilder<B> {
    type Network = B::Network;

    fn build_network(&self, spec: &ArchitectureSpec) -> Result<Self::Network, SegError> {
        info!("Building network architecture...");
        info!("  Input channels: {}", spec.input_channels);
        info!("  Output channels: {}", spec.output_channels);

        let network = self.inner.build_network(spec)?;

        info!(
            "  Network built with {} total input channels",
            spec.input_channels
        );
        Ok(network)
    }
}

/// A named trainer the framework dispatches to when it constructs a network.
pub struct CustomTrainer<B> {
    name: String,
    builder: ChannelLoggingBuilder<B>,
}

impl<B: NetworkBuilder> CustomTrainer<B> {
    /// Wrap the framework's default builder under [`DEFAULT_TRAINER_NAME`].
    pub fn new(framework_builder: B) -> Self {
        Self::with_name(DEFAULT_TRAINER_NAME, framework_builder)
    }

    pub fn with_name(name: impl Into<String>, framework_builder: B) -> Self {
        Self {
            name: name.into(),
            builder: ChannelLoggingBuilder::new(framework_builder),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Callback entry point used by the framework.
    pub fn build_network_architecture(
        &self,
        spec: &ArchitectureSpec,
    ) -> Result<B::Network, SegError> {
        self.builder.build_network(spec)
    }
}
