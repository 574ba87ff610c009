use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::context::InstallContext;
use super::installer::{LoaderInstallResult, LoaderInstaller};
use crate::core::downloader::DownloadSource;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::fetch_json;
use crate::core::instance::LoaderKind;
use crate::core::retry::first_success;
use crate::core::version::VersionJson;

/// One entry of the Fabric loader version list.
#[derive(Debug, Clone, Deserialize)]
pub struct FabricLoaderVersion {
    pub version: String,
    #[serde(default)]
    pub stable: bool,
}

/// First stable entry, else the first entry.
pub fn pick_loader_version(versions: &[FabricLoaderVersion]) -> Option<&str> {
    versions
        .iter()
        .find(|v| v.stable)
        .or_else(|| versions.first())
        .map(|v| v.version.as_str())
}

pub struct FabricInstaller;

impl FabricInstaller {
    async fn latest_loader(&self, ctx: &InstallContext<'_>) -> LauncherResult<String> {
        let mirrors = &ctx.game.endpoints.fabric_meta;
        let (versions, _): (Vec<FabricLoaderVersion>, _) = first_success(mirrors, |base| {
            let source = DownloadSource::new(format!(
                "{}/v2/versions/loader",
                base.trim_end_matches('/')
            ));
            async move {
                fetch_json(
                    ctx.game.downloader.client(),
                    &source,
                    ctx.game.downloader.policy(),
                    ctx.cancel,
                )
                .await
            }
        })
        .await
        .map_err(|e| match e {
            LauncherError::Cancelled => e,
            other => LauncherError::LoaderApi(format!("fabric loader list: {}", other)),
        })?;

        pick_loader_version(&versions)
            .map(str::to_string)
            .ok_or_else(|| LauncherError::LoaderApi("no fabric loader versions".into()))
    }

    async fn fetch_profile(
        &self,
        ctx: &InstallContext<'_>,
        loader_version: &str,
    ) -> LauncherResult<VersionJson> {
        let mirrors = &ctx.game.endpoints.fabric_meta;
        let (profile, _): (VersionJson, _) = first_success(mirrors, |base| {
            let source = DownloadSource::new(format!(
                "{}/v2/versions/loader/{}/{}/profile/json",
                base.trim_end_matches('/'),
                ctx.game_version,
                loader_version
            ));
            async move {
                fetch_json(
                    ctx.game.downloader.client(),
                    &source,
                    ctx.game.downloader.policy(),
                    ctx.cancel,
                )
                .await
            }
        })
        .await
        .map_err(|e| match e {
            LauncherError::Cancelled => e,
            other => LauncherError::LoaderApi(format!("fabric profile: {}", other)),
        })?;
        Ok(profile)
    }
}

#[async_trait]
impl LoaderInstaller for FabricInstaller {
    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult> {
        if ctx.game_version.trim().is_empty() {
            return Err(LauncherError::Config("game version is required".into()));
        }

        let loader_version = match ctx.loader_version.trim() {
            "" => {
                let latest = self.latest_loader(&ctx).await?;
                debug!("Selected fabric loader {}", latest);
                latest
            }
            pinned => pinned.to_string(),
        };

        info!(
            "Installing Fabric {} for Minecraft {}",
            loader_version, ctx.game_version
        );

        let mut profile = self.fetch_profile(&ctx, &loader_version).await?;
        if profile.id.is_empty() {
            profile.id = LoaderKind::Fabric.version_id(ctx.game_version, &loader_version);
        }
        if profile.inherits_from.is_none() {
            profile.inherits_from = Some(ctx.game_version.to_string());
        }
        profile.save(&ctx.game.layout.version_json(&profile.id)).await?;

        ctx.game.sync_libraries(&profile.libraries, ctx.cancel).await?;

        info!("Fabric installed as {}", profile.id);
        Ok(LoaderInstallResult {
            version_id: profile.id,
            loader_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Endpoints;
    use crate::core::downloader::Downloader;
    use crate::core::instance::InstallLayout;
    use crate::core::progress::ProgressTracker;
    use crate::core::retry::RetryPolicy;
    use crate::core::test_support::StubServer;
    use crate::core::version::GameInstaller;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn versions(raw: serde_json::Value) -> Vec<FabricLoaderVersion> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn prefers_first_stable_loader() {
        let list = versions(json!([
            {"version": "0.16.0-beta", "stable": false},
            {"version": "0.15.7", "stable": true},
            {"version": "0.15.6", "stable": true}
        ]));
        assert_eq!(pick_loader_version(&list), Some("0.15.7"));
    }

    #[test]
    fn falls_back_to_first_when_none_stable() {
        let list = versions(json!([{"version": "0.2"}, {"version": "0.1"}]));
        assert_eq!(pick_loader_version(&list), Some("0.2"));
        assert_eq!(pick_loader_version(&[]), None);
    }

    #[tokio::test]
    async fn installs_profile_from_second_mirror() {
        let primary = StubServer::start().await;
        let mirror = StubServer::start().await;
        primary.route("/v2/versions/loader", 500, b"down".to_vec());
        mirror.route(
            "/v2/versions/loader",
            200,
            serde_json::to_vec(&json!([{"version": "0.15.7", "stable": true}])).unwrap(),
        );
        mirror.route(
            "/v2/versions/loader/1.20.1/0.15.7/profile/json",
            200,
            serde_json::to_vec(&json!({
                "id": "fabric-loader-0.15.7-1.20.1",
                "inheritsFrom": "1.20.1",
                "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
                "libraries": [
                    {"name": "net.fabricmc:fabric-loader:0.15.7", "url": mirror.url("/maven/")}
                ],
                "releaseTime": "2024-01-01T00:00:00+0000"
            }))
            .unwrap(),
        );
        mirror.route(
            "/maven/net/fabricmc/fabric-loader/0.15.7/fabric-loader-0.15.7.jar",
            200,
            b"loader".to_vec(),
        );

        let dir = tempfile::tempdir().unwrap();
        let layout = InstallLayout::new(dir.path());
        let endpoints = Endpoints {
            fabric_meta: vec![primary.base_url(), mirror.base_url()],
            ..Endpoints::default()
        };
        let downloader = Downloader::new(reqwest::Client::new())
            .with_policy(RetryPolicy::new(1, std::time::Duration::from_millis(1)));
        let progress = ProgressTracker::silent();
        let game = GameInstaller {
            downloader: &downloader,
            endpoints: &endpoints,
            layout: &layout,
            progress: &progress,
            asset_workers: 1,
        };
        let cancel = CancellationToken::new();

        let result = FabricInstaller
            .install(InstallContext {
                game_version: "1.20.1",
                loader_version: "",
                java_path: None,
                game: &game,
                cancel: &cancel,
            })
            .await
            .unwrap();

        assert_eq!(result.version_id, "fabric-loader-0.15.7-1.20.1");
        assert_eq!(result.loader_version, "0.15.7");
        let saved = VersionJson::load(&layout.version_json(&result.version_id))
            .await
            .unwrap();
        assert_eq!(saved.inherits_from.as_deref(), Some("1.20.1"));
        assert!(saved.extra.contains_key("releaseTime"));
        assert!(layout
            .libraries_dir()
            .join("net/fabricmc/fabric-loader/0.15.7/fabric-loader-0.15.7.jar")
            .exists());
        assert_eq!(primary.hit_count("/v2/versions/loader"), 1);
    }
}
