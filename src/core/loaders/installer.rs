use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::LauncherResult;
use crate::core::instance::LoaderKind;

use super::{context::InstallContext, fabric::FabricInstaller, forge::ForgeInstaller};

/// What a loader install leaves behind: a persisted version record and the
/// loader version that was actually installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderInstallResult {
    pub version_id: String,
    pub loader_version: String,
}

#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult>;
}

/// Static dispatch over the supported loaders.
pub enum Installer {
    Fabric(FabricInstaller),
    Forge(ForgeInstaller),
}

impl Installer {
    pub fn new(kind: LoaderKind) -> Self {
        match kind {
            LoaderKind::Fabric => Self::Fabric(FabricInstaller),
            LoaderKind::Forge | LoaderKind::NeoForge => Self::Forge(ForgeInstaller::new(kind)),
        }
    }

    pub async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult> {
        match self {
            Installer::Fabric(i) => i.install(ctx).await,
            Installer::Forge(i) => i.install(ctx).await,
        }
    }
}
