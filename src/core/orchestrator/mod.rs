// ─── Orchestrator ───
// Top-level install / launch / sync operations driven by the server's
// desired state.

pub mod clean;
pub mod mods;

pub use clean::clean_install_dir;
pub use mods::{mod_key, sync_mods, ModSyncReport};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;
use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::core::config::{Endpoints, LauncherPaths, LocalConfig, PlayerProfile, ServerConfig};
use crate::core::downloader::{DownloadSource, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::identity::offline_uuid;
use crate::core::instance::{InstallLayout, LoaderKind};
use crate::core::java::{acquire_runtime, find_installed, locate_java, required_java_major};
use crate::core::launch::{extract_natives, launch_game, LaunchRequest};
use crate::core::loaders::{InstallContext, Installer};
use crate::core::progress::ProgressTracker;
use crate::core::retry::RetryPolicy;
use crate::core::server::{Manifest, ManifestClient};
use crate::core::version::{resolve_version, GameInstaller, Platform};

const NATIVES_STEP: &str = "natives";

/// Entry point for every user-facing operation.
pub struct Launcher {
    paths: LauncherPaths,
    http: Client,
    endpoints: Endpoints,
    downloader: Downloader,
    manifest_policy: RetryPolicy,
}

impl Launcher {
    pub fn new(paths: LauncherPaths) -> LauncherResult<Self> {
        let http = build_http_client()?;
        Ok(Self {
            paths,
            downloader: Downloader::new(http.clone()),
            http,
            endpoints: Endpoints::default(),
            manifest_policy: RetryPolicy::manifest(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Use `policy` for downloads and manifest fetches alike.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.downloader = Downloader::new(self.http.clone()).with_policy(policy);
        self.manifest_policy = policy;
        self
    }

    pub fn paths(&self) -> &LauncherPaths {
        &self.paths
    }

    pub fn load_config(&self) -> LauncherResult<LocalConfig> {
        LocalConfig::load(&self.paths)
    }

    fn manifest_client(&self, server: &ServerConfig) -> ManifestClient {
        ManifestClient::from_config(server, &self.paths, self.http.clone())
            .with_policy(self.manifest_policy)
    }

    // ── Install ─────────────────────────────────────────

    /// Bring the install dir to the server's desired state. Works offline
    /// from the last applied config when the server is unreachable.
    #[instrument(skip_all)]
    pub async fn install(
        &self,
        progress: &Arc<ProgressTracker>,
        cancel: &CancellationToken,
    ) -> LauncherResult<LocalConfig> {
        let mut config = self.load_config()?;
        let server_config = ServerConfig::load(&self.paths)?;
        let server = self.manifest_client(&server_config);
        info!("Fetching manifest from {}", server.base_url());

        let old_game_version = config.game_version.clone();
        let old_loader = config.loader.clone();

        let manifest = match server.fetch_manifest(cancel).await {
            Ok(manifest) => {
                info!("Manifest has {} mods", manifest.packages.mods.len());
                apply_manifest(&mut config, &manifest);
                Some(manifest)
            }
            Err(LauncherError::Cancelled) => return Err(LauncherError::Cancelled),
            Err(e) if config.game_version.trim().is_empty() => {
                return Err(LauncherError::ManifestUnavailable(format!(
                    "{} (and no saved game version)",
                    e
                )));
            }
            Err(e) => {
                info!(
                    "Manifest unavailable ({}), continuing with saved {} {}",
                    e, config.game_version, config.loader
                );
                None
            }
        };
        let kind = config.loader_kind()?;

        let version_changed =
            !old_game_version.is_empty() && old_game_version != config.game_version;
        if version_changed || old_loader != config.loader {
            info!(
                "Switching {} {:?} -> {} {:?}",
                old_game_version, old_loader, config.game_version, config.loader
            );
            clean_install_dir(&config.install_dir)?;
        }

        config.save(&self.paths)?;
        std::fs::create_dir_all(&config.install_dir)
            .map_err(|e| LauncherError::io(&config.install_dir, e))?;
        let layout = config.layout();

        match manifest.as_ref() {
            Some(manifest) => {
                sync_mods(
                    &self.downloader,
                    &server,
                    &layout.mods_dir(),
                    &manifest.packages.mods,
                    progress,
                    cancel,
                )
                .await?;
            }
            None => info!("Skipping mod sync without a manifest"),
        }

        let required_java = required_java_major(
            manifest
                .as_ref()
                .map(|m| m.dependencies.game_version.as_str())
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(&config.game_version),
        );
        let java_path = self
            .prepare_java(&server, manifest.as_ref(), &layout, required_java, cancel)
            .await?;

        let game = GameInstaller {
            downloader: &self.downloader,
            endpoints: &self.endpoints,
            layout: &layout,
            progress,
            asset_workers: server_config.asset_workers(),
        };
        game.ensure_installed(&config.game_version, cancel).await?;

        let version_id = match kind {
            None => {
                config.loader_version.clear();
                config.save(&self.paths)?;
                config.game_version.clone()
            }
            Some(kind) => {
                let java = match (kind, java_path) {
                    (LoaderKind::Fabric, _) => None,
                    (_, Some(path)) => Some(path),
                    // Processors may still run on a suitable system Java.
                    (_, None) => {
                        Some(locate_java(&layout.java_dir(), required_java).await?)
                    }
                };
                let result = Installer::new(kind)
                    .install(InstallContext {
                        game_version: &config.game_version,
                        loader_version: &config.loader_version,
                        java_path: java.as_deref(),
                        game: &game,
                        cancel,
                    })
                    .await?;
                if !result.loader_version.is_empty()
                    && result.loader_version != config.loader_version
                {
                    config.loader_version = result.loader_version;
                    config.save(&self.paths)?;
                }
                game.ensure_libraries_for_version(&result.version_id, cancel)
                    .await?;
                result.version_id
            }
        };

        let natives = prepare_natives(&layout, &version_id).await?;
        if natives > 0 {
            progress.set_total(NATIVES_STEP, natives as u64);
            progress.update(NATIVES_STEP, natives as u64, natives as u64);
        }

        info!("Install of {} complete", version_id);
        Ok(config)
    }

    /// Find or fetch the runtime for `required`. Only the final lookup's
    /// result matters: acquisition failures are logged.
    async fn prepare_java(
        &self,
        server: &ManifestClient,
        manifest: Option<&Manifest>,
        layout: &InstallLayout,
        required: u32,
        cancel: &CancellationToken,
    ) -> LauncherResult<Option<PathBuf>> {
        let java_dir = layout.java_dir();
        if let Some(found) = find_installed(&java_dir, required).await {
            info!("Using Java {} at {:?}", required, found);
            return Ok(Some(found));
        }

        if let Some(manifest) = manifest {
            match self
                .ensure_java(server, manifest, &java_dir, required, cancel)
                .await
            {
                Ok(path) => return Ok(Some(path)),
                Err(LauncherError::Cancelled) => return Err(LauncherError::Cancelled),
                Err(e) => warn!("Java {} not acquired: {}", required, e),
            }
        }
        Ok(find_installed(&java_dir, required).await)
    }

    async fn ensure_java(
        &self,
        server: &ManifestClient,
        manifest: &Manifest,
        java_dir: &Path,
        required: u32,
        cancel: &CancellationToken,
    ) -> LauncherResult<PathBuf> {
        if required == 0 {
            return Err(LauncherError::Config("java version not resolved".into()));
        }
        let url = manifest
            .dependencies
            .java_urls
            .for_major(required)
            .ok_or_else(|| {
                LauncherError::Config(format!("no java url for Java {}", required))
            })?;
        let source = if url.starts_with("http://") || url.starts_with("https://") {
            DownloadSource::new(url)
        } else {
            server.signed_source(&server.resolve_url(url))?
        };
        acquire_runtime(&self.downloader, java_dir, required, &source, cancel).await
    }

    // ── Launch ──────────────────────────────────────────

    /// Start the installed version. Returns the running game process.
    #[instrument(skip(self, cancel))]
    pub async fn launch(
        &self,
        player_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> LauncherResult<Child> {
        let config = self.load_config()?;
        let mut profile = PlayerProfile::load(&self.paths)?;

        let player_name = player_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(profile.player_name.trim())
            .to_string();
        if player_name.is_empty() {
            return Err(LauncherError::Config("player name required".into()));
        }
        if profile.player_uuid.trim().is_empty() || profile.player_name != player_name {
            profile.player_uuid = offline_uuid(&player_name);
            profile.player_name = player_name.clone();
            if let Err(e) = profile.save(&self.paths) {
                warn!("Could not save player profile: {}", e);
            }
        }

        let layout = config.layout();
        let required_java = required_java_major(&config.game_version);
        let java_path = locate_java(&layout.java_dir(), required_java).await?;
        info!("Java {} at {:?}", required_java, java_path);

        let request = LaunchRequest {
            install_dir: config.install_dir.clone(),
            version_id: config.effective_version_id()?,
            java_path,
            player_name,
            player_uuid: profile.player_uuid,
            memory_mb: config.memory_mb,
            console_enabled: config.console_enabled,
        };
        launch_game(&request, cancel).await
    }

    // ── Maintenance ─────────────────────────────────────

    /// Reconcile `mods/` only. An unreachable server skips the sync.
    pub async fn sync_mods(
        &self,
        progress: &Arc<ProgressTracker>,
        cancel: &CancellationToken,
    ) -> LauncherResult<()> {
        let config = self.load_config()?;
        let server = self.manifest_client(&ServerConfig::load(&self.paths)?);
        let manifest = match server.fetch_manifest(cancel).await {
            Ok(manifest) => manifest,
            Err(LauncherError::Cancelled) => return Err(LauncherError::Cancelled),
            Err(e) => {
                info!("Mod sync skipped: {}", e);
                return Ok(());
            }
        };
        sync_mods(
            &self.downloader,
            &server,
            &config.layout().mods_dir(),
            &manifest.packages.mods,
            progress,
            cancel,
        )
        .await?;
        Ok(())
    }

    /// Apply and persist the server's desired state without installing.
    pub async fn refresh_from_server(&self, cancel: &CancellationToken) -> LauncherResult<LocalConfig> {
        let mut config = self.load_config()?;
        let manifest = self
            .manifest_client(&ServerConfig::load(&self.paths)?)
            .fetch_manifest(cancel)
            .await?;
        apply_manifest(&mut config, &manifest);
        config.loader_kind()?;
        config.save(&self.paths)?;
        Ok(config)
    }

    /// Whether the effective version's record is on disk.
    pub fn is_installed(&self) -> LauncherResult<bool> {
        let config = self.load_config()?;
        let id = config.effective_version_id()?;
        if id.is_empty() {
            return Ok(false);
        }
        Ok(config.layout().version_json(&id).is_file())
    }
}

/// Overlay the manifest's dependencies on the local config.
pub fn apply_manifest(config: &mut LocalConfig, manifest: &Manifest) {
    let deps = &manifest.dependencies;
    if !deps.game_version.trim().is_empty() {
        config.game_version = deps.game_version.trim().to_string();
    }
    let loader = deps.loader.trim().to_ascii_lowercase();
    if loader.is_empty() {
        config.loader.clear();
        config.loader_version.clear();
    } else {
        config.loader = loader;
        if !deps.loader_version.trim().is_empty() {
            config.loader_version = deps.loader_version.trim().to_string();
        }
    }
}

/// Unpack natives for `version_id` into `bin/<id>`.
async fn prepare_natives(layout: &InstallLayout, version_id: &str) -> LauncherResult<usize> {
    let resolved = resolve_version(&layout.versions_dir(), version_id)?;
    let natives_dir = layout.natives_dir(&resolved.id);
    let libraries_dir = layout.libraries_dir();
    tokio::task::spawn_blocking(move || {
        extract_natives(
            &resolved.libraries,
            &libraries_dir,
            &natives_dir,
            Platform::current(),
        )
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::server::{Dependencies, FilePackage, Packages};
    use crate::core::test_support::{sha1_hex, sha256_hex, StubServer};
    use serde_json::json;
    use std::time::Duration;

    fn manifest(game: &str, loader: &str, loader_version: &str) -> Manifest {
        Manifest {
            dependencies: Dependencies {
                game_version: game.into(),
                loader: loader.into(),
                loader_version: loader_version.into(),
                ..Dependencies::default()
            },
            ..Manifest::default()
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        paths: LauncherPaths,
        install_dir: PathBuf,
    }

    fn fixture(server_url: &str, local: serde_json::Value) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let paths = LauncherPaths::at(dir.path().join("config"));
        let install_dir = dir.path().join("game");
        let mut local = local;
        local["install_dir"] = json!(install_dir);
        std::fs::create_dir_all(paths.root()).unwrap();
        std::fs::write(paths.local_config(), serde_json::to_vec(&local).unwrap()).unwrap();
        ServerConfig {
            server_base_url: server_url.into(),
            server_secret: "secret".into(),
            asset_workers: Some(2),
        }
        .save(&paths)
        .unwrap();
        Fixture {
            _dir: dir,
            paths,
            install_dir,
        }
    }

    fn launcher(paths: &LauncherPaths, endpoints: Endpoints) -> Launcher {
        Launcher::new(paths.clone())
            .unwrap()
            .with_endpoints(endpoints)
            .with_retry_policy(RetryPolicy::new(1, Duration::from_millis(1)))
    }

    #[test]
    fn manifest_overrides_game_and_loader() {
        let mut config = LocalConfig {
            game_version: "1.19.2".into(),
            loader: "forge".into(),
            loader_version: "43.2.0".into(),
            ..LocalConfig::default()
        };
        apply_manifest(&mut config, &manifest("1.20.1", "Fabric", ""));
        assert_eq!(config.game_version, "1.20.1");
        assert_eq!(config.loader, "fabric");
        // An unpinned loader version keeps the previous value.
        assert_eq!(config.loader_version, "43.2.0");

        apply_manifest(&mut config, &manifest("", "", "ignored"));
        assert_eq!(config.game_version, "1.20.1");
        assert_eq!(config.loader, "");
        assert_eq!(config.loader_version, "");
    }

    #[tokio::test]
    async fn install_without_manifest_or_saved_version_fails() {
        let server = StubServer::start().await;
        server.route("/manifest", 500, "down");
        let fx = fixture(&server.base_url(), json!({}));

        let result = launcher(&fx.paths, Endpoints::default())
            .install(&ProgressTracker::silent(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(LauncherError::ManifestUnavailable(_))));
    }

    #[tokio::test]
    async fn sync_mods_skips_when_server_is_down() {
        let server = StubServer::start().await;
        server.route("/manifest", 500, "down");
        let fx = fixture(&server.base_url(), json!({"game_version": "1.20.1"}));
        std::fs::create_dir_all(fx.install_dir.join("mods")).unwrap();
        std::fs::write(fx.install_dir.join("mods/local.jar"), b"x").unwrap();

        launcher(&fx.paths, Endpoints::default())
            .sync_mods(&ProgressTracker::silent(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(fx.install_dir.join("mods/local.jar").exists());
    }

    #[tokio::test]
    async fn refresh_persists_desired_state() {
        let server = StubServer::start().await;
        server.route(
            "/manifest",
            200,
            serde_json::to_vec(&manifest("1.20.1", "neoforge", "20.1.5")).unwrap(),
        );
        let fx = fixture(&server.base_url(), json!({"game_version": "1.19.4"}));
        let launcher = launcher(&fx.paths, Endpoints::default());

        let config = launcher
            .refresh_from_server(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(config.effective_version_id().unwrap(), "neoforge-20.1.5");
        assert_eq!(launcher.load_config().unwrap(), config);
        assert!(!launcher.is_installed().unwrap());
    }

    #[tokio::test]
    async fn fabric_install_picks_stable_loader_end_to_end() {
        let server = StubServer::start().await;
        let mod_body = b"mod-bytes";
        let desired = Manifest {
            packages: Packages {
                mods: vec![FilePackage {
                    path: "fabric-api.jar".into(),
                    name: "Fabric API".into(),
                    size: mod_body.len() as u64,
                    sha256: sha256_hex(mod_body),
                    url: "/download/mods/fabric-api.jar".into(),
                }],
            },
            ..manifest("1.20.1", "fabric", "")
        };
        server.route("/manifest", 200, serde_json::to_vec(&desired).unwrap());
        server.route("/download/mods/fabric-api.jar", 200, mod_body.to_vec());
        server.route(
            "/mc/manifest.json",
            200,
            serde_json::to_vec(&json!({"versions": [{"id": "1.20.1", "url": server.url("/mc/1.20.1.json")}]}))
                .unwrap(),
        );
        server.route(
            "/mc/1.20.1.json",
            200,
            serde_json::to_vec(&json!({
                "id": "1.20.1",
                "mainClass": "net.minecraft.client.main.Main",
                "downloads": {"client": {"sha1": sha1_hex(b"client"), "size": 6, "url": server.url("/mc/client.jar")}},
                "libraries": []
            }))
            .unwrap(),
        );
        server.route("/mc/client.jar", 200, b"client".to_vec());
        server.route(
            "/fabric/v2/versions/loader",
            200,
            serde_json::to_vec(&json!([
                {"version": "0.16.0-beta", "stable": false},
                {"version": "0.15.7", "stable": true}
            ]))
            .unwrap(),
        );
        server.route(
            "/fabric/v2/versions/loader/1.20.1/0.15.7/profile/json",
            200,
            serde_json::to_vec(&json!({
                "id": "fabric-loader-0.15.7-1.20.1",
                "inheritsFrom": "1.20.1",
                "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
                "libraries": []
            }))
            .unwrap(),
        );

        // Same desired state as last time, so nothing is wiped first.
        let fx = fixture(
            &server.base_url(),
            json!({"game_version": "1.20.1", "loader": "fabric", "loader_version": ""}),
        );
        std::fs::create_dir_all(fx.install_dir.join("mods")).unwrap();
        std::fs::write(fx.install_dir.join("mods/removed.jar"), b"old").unwrap();
        let endpoints = Endpoints {
            version_manifest: server.url("/mc/manifest.json"),
            fabric_meta: vec![server.url("/fabric")],
            ..Endpoints::default()
        };
        let launcher = launcher(&fx.paths, endpoints);
        let progress = ProgressTracker::silent();

        let config = launcher
            .install(&progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(config.loader, "fabric");
        assert_eq!(config.loader_version, "0.15.7");
        assert_eq!(
            config.effective_version_id().unwrap(),
            "fabric-loader-0.15.7-1.20.1"
        );
        assert_eq!(launcher.load_config().unwrap().loader_version, "0.15.7");
        assert_eq!(required_java_major(&config.game_version), 17);
        assert!(launcher.is_installed().unwrap());
        assert_eq!(
            std::fs::read(fx.install_dir.join("mods/fabric-api.jar")).unwrap(),
            mod_body
        );
        assert!(!fx.install_dir.join("mods/removed.jar").exists());
        assert!(fx
            .install_dir
            .join("versions/fabric-loader-0.15.7-1.20.1/fabric-loader-0.15.7-1.20.1.json")
            .exists());
        assert_eq!(progress.step("mods"), Some((2, 2)));

        let hits = server.hits();
        let position = |path: &str| hits.iter().position(|h| h == path).unwrap();
        assert_eq!(position("/manifest"), 0);
        assert!(position("/download/mods/fabric-api.jar") < position("/mc/manifest.json"));
        assert!(position("/mc/manifest.json") < position("/fabric/v2/versions/loader"));
        assert!(
            position("/fabric/v2/versions/loader")
                < position("/fabric/v2/versions/loader/1.20.1/0.15.7/profile/json")
        );
        assert_eq!(
            server.hit_count("/fabric/v2/versions/loader/1.20.1/0.16.0-beta/profile/json"),
            0
        );
    }

    #[tokio::test]
    async fn offline_install_uses_saved_state() {
        let server = StubServer::start().await;
        server.route("/manifest", 503, "down");
        server.route(
            "/mc/manifest.json",
            200,
            serde_json::to_vec(&json!({"versions": [{"id": "1.20.1", "url": server.url("/mc/1.20.1.json")}]}))
                .unwrap(),
        );
        server.route(
            "/mc/1.20.1.json",
            200,
            serde_json::to_vec(&json!({"id": "1.20.1", "mainClass": "M", "libraries": []})).unwrap(),
        );
        let fx = fixture(&server.base_url(), json!({"game_version": "1.20.1"}));
        std::fs::create_dir_all(fx.install_dir.join("mods")).unwrap();
        std::fs::write(fx.install_dir.join("mods/local.jar"), b"x").unwrap();
        let endpoints = Endpoints {
            version_manifest: server.url("/mc/manifest.json"),
            ..Endpoints::default()
        };
        let launcher = launcher(&fx.paths, endpoints);

        let config = launcher
            .install(&ProgressTracker::silent(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(config.game_version, "1.20.1");
        assert_eq!(config.loader, "");
        assert!(launcher.is_installed().unwrap());
        assert!(fx.install_dir.join("mods/local.jar").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn launch_derives_offline_identity_and_spawns_java() {
        use crate::core::test_support::fake_java;

        let fx = fixture("http://127.0.0.1:9", json!({"game_version": "1.20.1"}));
        let version = fx.install_dir.join("versions/1.20.1/1.20.1.json");
        std::fs::create_dir_all(version.parent().unwrap()).unwrap();
        std::fs::write(&version, r#"{"id": "1.20.1", "mainClass": "net.minecraft.client.main.Main"}"#)
            .unwrap();
        fake_java(&fx.install_dir.join("java/java17/bin/java"), 17);
        let launcher = launcher(&fx.paths, Endpoints::default());
        let cancel = CancellationToken::new();

        assert!(matches!(
            launcher.launch(None, &cancel).await,
            Err(LauncherError::Config(_))
        ));

        let mut child = launcher.launch(Some("Steve"), &cancel).await.unwrap();
        assert!(child.wait().await.unwrap().success());

        let profile = PlayerProfile::load(&fx.paths).unwrap();
        assert_eq!(profile.player_name, "Steve");
        assert_eq!(profile.player_uuid, offline_uuid("Steve"));
        assert!(launcher.is_installed().unwrap());
    }
}
