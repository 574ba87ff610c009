// ─── Forge / NeoForge ───
// Installs from the official installer jar without running its GUI: profile
// libraries, data table, client processors, then the version record.

pub mod data;
pub mod processors;
pub mod profile;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use super::context::InstallContext;
use super::installer::{LoaderInstallResult, LoaderInstaller};
use crate::core::downloader::{DownloadSource, Integrity};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::LoaderKind;
use crate::core::maven::MavenArtifact;
use crate::core::retry::{check_cancelled, first_success};
use crate::core::version::version_file::join_slashed;

use data::{build_data_table, DataTable, InjectedData};
use processors::{LibraryPaths, ProcessorRunner};
use profile::{open_archive, read_installer, InstallProfile};

/// Installer for the Forge family. NeoForge differs only in coordinates and
/// mirrors.
pub struct ForgeInstaller {
    kind: LoaderKind,
}

impl ForgeInstaller {
    pub fn new(kind: LoaderKind) -> Self {
        Self { kind }
    }

    fn installer_artifact(&self, loader_version: &str) -> MavenArtifact {
        let (group, artifact) = match self.kind {
            LoaderKind::NeoForge => ("net.neoforged", "neoforge"),
            _ => ("net.minecraftforge", "forge"),
        };
        MavenArtifact {
            group_id: group.to_string(),
            artifact_id: artifact.to_string(),
            version: loader_version.to_string(),
            classifier: Some("installer".to_string()),
            extension: "jar".to_string(),
        }
    }

    fn mirrors<'c>(&self, ctx: &'c InstallContext<'_>) -> &'c [String] {
        match self.kind {
            LoaderKind::NeoForge => &ctx.game.endpoints.neoforge_maven,
            _ => &ctx.game.endpoints.forge_maven,
        }
    }

    fn installer_path(&self, ctx: &InstallContext<'_>, loader_version: &str) -> PathBuf {
        ctx.game
            .layout
            .installers_dir()
            .join(format!("{}-{}-installer.jar", self.kind, loader_version))
    }

    async fn download_installer(
        &self,
        ctx: &InstallContext<'_>,
        loader_version: &str,
    ) -> LauncherResult<PathBuf> {
        let artifact = self.installer_artifact(loader_version);
        let dest = self.installer_path(ctx, loader_version);
        first_success(self.mirrors(ctx), |base| {
            let source = DownloadSource::new(artifact.url(base));
            let dest = &dest;
            async move {
                ctx.game
                    .downloader
                    .ensure_file(&source, dest, &Integrity::none(), ctx.cancel)
                    .await
            }
        })
        .await
        .map_err(|e| match e {
            LauncherError::Cancelled => e,
            other => LauncherError::LoaderApi(format!("{} installer: {}", self.kind, other)),
        })?;
        Ok(dest)
    }

    /// Fetch or unpack every profile library. Returns where each landed.
    async fn install_profile_libraries(
        &self,
        ctx: &InstallContext<'_>,
        profile: &InstallProfile,
        installer: &Path,
    ) -> LauncherResult<LibraryPaths> {
        let libraries_dir = ctx.game.layout.libraries_dir();
        let mut paths = LibraryPaths::new();
        let mut bundled = Vec::new();

        for lib in &profile.libraries {
            check_cancelled(ctx.cancel)?;
            let dest = join_slashed(&libraries_dir, &lib.relative_path());
            paths.insert(lib.name.clone(), dest.clone());

            match lib.artifact().filter(|a| !a.url.is_empty()) {
                Some(artifact) => {
                    ctx.game
                        .downloader
                        .ensure_file(
                            &DownloadSource::new(artifact.url.clone()),
                            &dest,
                            &artifact.integrity(),
                            ctx.cancel,
                        )
                        .await?;
                }
                None => bundled.push((lib.bundled_entry(), dest)),
            }
        }

        if !bundled.is_empty() {
            let installer = installer.to_path_buf();
            tokio::task::spawn_blocking(move || -> LauncherResult<()> {
                let mut archive = open_archive(&installer)?;
                for (entry, dest) in bundled {
                    profile::extract_entry(&mut archive, &entry, &dest)?;
                }
                Ok(())
            })
            .await??;
        }

        Ok(paths)
    }
}

#[async_trait]
impl LoaderInstaller for ForgeInstaller {
    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult> {
        let loader_version = ctx.loader_version.trim().to_string();
        if loader_version.is_empty() {
            return Err(LauncherError::Loader(format!(
                "loader version required for {}",
                self.kind
            )));
        }
        let java_path = ctx
            .java_path
            .ok_or_else(|| LauncherError::Loader(format!("java path required for {} install", self.kind)))?;

        info!(
            "Installing {} {} for Minecraft {}",
            self.kind, loader_version, ctx.game_version
        );

        let installer = self.download_installer(&ctx, &loader_version).await?;
        ctx.game.ensure_installed(ctx.game_version, ctx.cancel).await?;

        let reader_path = installer.clone();
        let documents = tokio::task::spawn_blocking(move || read_installer(&reader_path)).await??;

        let libraries = self
            .install_profile_libraries(&ctx, &documents.profile, &installer)
            .await?;

        let layout = ctx.game.layout;
        let scratch = layout.scratch_dir(&format!("{}-{}", self.kind, loader_version));
        let result = async {
            let data = {
                let profile = documents.profile.clone();
                let installer = installer.clone();
                let scratch = scratch.clone();
                let layout = layout.clone();
                let game_version = ctx.game_version.to_string();
                let loader_version = loader_version.clone();
                tokio::task::spawn_blocking(move || -> LauncherResult<DataTable> {
                    let mut archive = open_archive(&installer)?;
                    build_data_table(
                        &profile,
                        &mut archive,
                        &scratch,
                        &InjectedData {
                            layout: &layout,
                            game_version: &game_version,
                            loader_version: &loader_version,
                            installer_path: &installer,
                        },
                    )
                })
                .await??
            };

            let libraries_dir = layout.libraries_dir();
            ProcessorRunner {
                java_path,
                libraries: &libraries,
                libraries_dir: &libraries_dir,
                data: &data,
            }
            .run_all(&documents.profile.processors, ctx.cancel)
            .await
        }
        .await;

        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove {:?}: {}", scratch, e);
            }
        }
        let ran = result?;

        let mut version = documents.version;
        version.id = self.kind.version_id(ctx.game_version, &loader_version);
        if version.inherits_from.as_deref().map_or(true, |p| p.trim().is_empty()) {
            version.inherits_from = Some(ctx.game_version.to_string());
        }
        version.save(&layout.version_json(&version.id)).await?;

        info!("{} installed as {} ({} processors)", self.kind, version.id, ran);
        Ok(LoaderInstallResult {
            version_id: version.id,
            loader_version,
        })
    }
}
