use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{read_json, write_json, LauncherPaths};
use crate::core::error::LauncherResult;
use crate::core::instance::{InstallLayout, LoaderKind};

pub const DEFAULT_MEMORY_MB: u32 = 4096;
pub const MIN_MEMORY_MB: u32 = 512;

/// Last-applied desired state plus user preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default)]
    pub install_dir: PathBuf,
    #[serde(default)]
    pub game_version: String,
    /// `""`, `fabric`, `forge` or `neoforge`.
    #[serde(default)]
    pub loader: String,
    #[serde(default)]
    pub loader_version: String,
    #[serde(default)]
    pub memory_mb: u32,
    #[serde(default)]
    pub console_enabled: bool,
}

impl LocalConfig {
    /// Load from `paths`, applying defaults. A missing file yields defaults.
    pub fn load(paths: &LauncherPaths) -> LauncherResult<Self> {
        let config: LocalConfig = read_json(&paths.local_config())?.unwrap_or_default();
        config.with_defaults(paths.root())
    }

    pub fn save(&self, paths: &LauncherPaths) -> LauncherResult<()> {
        write_json(&paths.local_config(), self)
    }

    fn with_defaults(mut self, default_install_dir: &Path) -> LauncherResult<Self> {
        if self.install_dir.as_os_str().is_empty() {
            self.install_dir = default_install_dir.to_path_buf();
        }
        if self.memory_mb == 0 {
            self.memory_mb = DEFAULT_MEMORY_MB;
        }
        self.memory_mb = self.memory_mb.max(MIN_MEMORY_MB);
        self.loader = self.loader.trim().to_ascii_lowercase();
        LoaderKind::parse_optional(&self.loader)?;
        Ok(self)
    }

    pub fn loader_kind(&self) -> LauncherResult<Option<LoaderKind>> {
        LoaderKind::parse_optional(&self.loader)
    }

    pub fn layout(&self) -> InstallLayout {
        InstallLayout::new(self.install_dir.clone())
    }

    /// The version id the installed loader (if any) produces.
    pub fn effective_version_id(&self) -> LauncherResult<String> {
        match self.loader_kind()? {
            Some(kind) if !self.loader_version.is_empty() => {
                Ok(kind.version_id(&self.game_version, &self.loader_version))
            }
            _ => Ok(self.game_version.clone()),
        }
    }
}

/// Local player identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub player_uuid: String,
}

impl PlayerProfile {
    pub fn load(paths: &LauncherPaths) -> LauncherResult<Self> {
        Ok(read_json(&paths.profile())?.unwrap_or_default())
    }

    pub fn save(&self, paths: &LauncherPaths) -> LauncherResult<()> {
        write_json(&paths.profile(), self)
    }
}
