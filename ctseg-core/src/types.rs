//! Shared value types: configuration presets and fold selectors.

use crate::error::SegError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model/resolution preset understood by the framework.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Configuration {
    #[serde(rename = "2d")]
    #[value(name = "2d")]
    TwoD,
    #[default]
    #[serde(rename = "3d_fullres")]
    #[value(name = "3d_fullres")]
    ThreeDFullres,
    #[serde(rename = "3d_lowres")]
    #[value(name = "3d_lowres")]
    ThreeDLowres,
}

impl Configuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoD => "2d",
            Self::ThreeDFullres => "3d_fullres",
            Self::ThreeDLowres => "3d_lowres",
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Configuration {
    type Err = SegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2d" => Ok(Self::TwoD),
            "3d_fullres" => Ok(Self::ThreeDFullres),
            "3d_lowres" => Ok(Self::ThreeDLowres),
            other => Err(SegError::invalid_input(format!(
                "unknown configuration '{other}' (expected 2d, 3d_fullres or 3d_lowres)"
            ))),
        }
    }
}

/// Cross-validation fold: a single partition index, or every partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Fold {
    Index(u32),
    All,
}

impl Default for Fold {
    fn default() -> Self {
        Self::Index(0)
    }
}

impl fmt::Display for Fold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::All => f.write_str("all"),
        }
    }
}

impl FromStr for Fold {
    type Err = SegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<u32>()
            .map(Self::Index)
            .map_err(|_| SegError::invalid_input(format!("invalid fold '{s}' (expected an integer or 'all')")))
    }
}

impl TryFrom<String> for Fold {
    type Error = SegError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fold> for String {
    fn from(fold: Fold) -> Self {
        fold.to_string()
    }
}
