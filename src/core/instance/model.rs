use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::LauncherError;

/// Supported mod loaders. "No loader" is `Option::<LoaderKind>::None`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    Fabric,
    Forge,
    NeoForge,
}

impl LoaderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderKind::Fabric => "fabric",
            LoaderKind::Forge => "forge",
            LoaderKind::NeoForge => "neoforge",
        }
    }

    /// Parse a configured loader name. Empty (or `none`/`vanilla`) means no
    /// loader.
    pub fn parse_optional(raw: &str) -> Result<Option<Self>, LauncherError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "vanilla" => Ok(None),
            other => other.parse().map(Some),
        }
    }

    /// Version id a loader install produces for the given versions.
    pub fn version_id(&self, game_version: &str, loader_version: &str) -> String {
        match self {
            LoaderKind::Fabric => format!("fabric-loader-{}-{}", loader_version, game_version),
            LoaderKind::Forge | LoaderKind::NeoForge => {
                format!("{}-{}", self.as_str(), loader_version)
            }
        }
    }
}

impl FromStr for LoaderKind {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fabric" => Ok(LoaderKind::Fabric),
            "forge" => Ok(LoaderKind::Forge),
            "neoforge" => Ok(LoaderKind::NeoForge),
            other => Err(LauncherError::Config(format!("unsupported loader: {}", other))),
        }
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
