// ─── Base Game Install ───
// Persists version metadata, then syncs the client jar, libraries and assets.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::core::assets::AssetSync;
use crate::core::config::Endpoints;
use crate::core::downloader::{DownloadSource, Downloader, Integrity};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::InstallLayout;
use crate::core::progress::ProgressTracker;
use crate::core::retry::check_cancelled;
use crate::core::version::manifest::fetch_version_metadata;
use crate::core::version::resolve::load_version;
use crate::core::version::rules::Platform;
use crate::core::version::{Library, VersionJson};

const LIBRARIES_STEP: &str = "libraries";

/// Everything the install phases share.
pub struct GameInstaller<'a> {
    pub downloader: &'a Downloader,
    pub endpoints: &'a Endpoints,
    pub layout: &'a InstallLayout,
    pub progress: &'a Arc<ProgressTracker>,
    pub asset_workers: usize,
}

impl GameInstaller<'_> {
    /// Make sure `version` is fully present: metadata, client jar,
    /// libraries (with natives) and assets.
    #[instrument(skip(self, cancel))]
    pub async fn ensure_installed(
        &self,
        version: &str,
        cancel: &CancellationToken,
    ) -> LauncherResult<VersionJson> {
        let version = version.trim();
        if version.is_empty() {
            return Err(LauncherError::Config("game version is required".into()));
        }

        let (meta, raw) = fetch_version_metadata(
            self.downloader.client(),
            &self.endpoints.version_manifest,
            version,
            cancel,
        )
        .await?;
        VersionJson::save_raw(&raw, &self.layout.version_json(&meta.id)).await?;

        if let Some(client) = meta.client_download() {
            self.downloader
                .ensure_file(
                    &DownloadSource::new(client.url.clone()),
                    &self.layout.version_jar(&meta.id),
                    &Integrity::sha1(client.size, &client.sha1),
                    cancel,
                )
                .await?;
        }

        self.sync_libraries(&meta.libraries, cancel).await?;

        if let Some(index) = meta.asset_index.as_ref() {
            let assets_dir = self.layout.assets_dir();
            AssetSync {
                downloader: self.downloader,
                resources_base: &self.endpoints.resources,
                assets_dir: &assets_dir,
                workers: self.asset_workers,
                progress: self.progress,
            }
            .run(index, cancel)
            .await?;
        }

        info!("Base version {} installed", meta.id);
        Ok(meta)
    }

    /// Re-sync the libraries of an already persisted version record.
    pub async fn ensure_libraries_for_version(
        &self,
        version_id: &str,
        cancel: &CancellationToken,
    ) -> LauncherResult<()> {
        let record = load_version(&self.layout.versions_dir(), version_id)?;
        self.sync_libraries(&record.libraries, cancel).await
    }

    /// Download every permitted library and its platform native, in order.
    pub async fn sync_libraries(
        &self,
        libraries: &[Library],
        cancel: &CancellationToken,
    ) -> LauncherResult<()> {
        let platform = Platform::current();
        let libraries_dir = self.layout.libraries_dir();
        let allowed: Vec<&Library> = libraries.iter().filter(|l| l.is_allowed(platform)).collect();

        let total: usize = allowed
            .iter()
            .map(|lib| 1 + usize::from(lib.native_artifact(platform).is_some()))
            .sum();
        let mut done = 0u64;
        self.progress.update(LIBRARIES_STEP, 0, total as u64);

        for lib in allowed {
            check_cancelled(cancel)?;

            let main = lib.main_file(&libraries_dir, &self.endpoints.libraries)?;
            self.downloader
                .ensure_file(&main.source, &main.dest, &main.integrity, cancel)
                .await?;
            done += 1;
            self.progress.update(LIBRARIES_STEP, done, total as u64);

            if let Some(native) = lib.native_file(&libraries_dir, platform) {
                debug!("Native for {}: {:?}", lib.name, native.dest);
                self.downloader
                    .ensure_file(&native.source, &native.dest, &native.integrity, cancel)
                    .await?;
                done += 1;
                self.progress.update(LIBRARIES_STEP, done, total as u64);
            }
        }

        Ok(())
    }
}
