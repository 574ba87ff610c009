// ─── Version Manifest ───
// Fetches the upstream version list and per-version metadata.

use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::downloader::DownloadSource;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::fetch_json;
use crate::core::retry::RetryPolicy;
use crate::core::version::VersionJson;

#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type", default)]
    pub version_type: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionManifest {
    pub async fn fetch(
        client: &Client,
        manifest_url: &str,
        cancel: &CancellationToken,
    ) -> LauncherResult<Self> {
        info!("Fetching version manifest...");
        let (manifest, _): (VersionManifest, _) = fetch_json(
            client,
            &DownloadSource::new(manifest_url),
            RetryPolicy::downloads(),
            cancel,
        )
        .await?;
        info!("Loaded {} versions from manifest", manifest.versions.len());
        Ok(manifest)
    }

    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }
}

impl VersionEntry {
    /// Fetch and parse this entry's metadata, keeping the raw body for
    /// persisting unchanged.
    pub async fn fetch_metadata(
        &self,
        client: &Client,
        cancel: &CancellationToken,
    ) -> LauncherResult<(VersionJson, String)> {
        let (mut version, raw): (VersionJson, String) = fetch_json(
            client,
            &DownloadSource::new(self.url.clone()),
            RetryPolicy::downloads(),
            cancel,
        )
        .await?;
        if version.id.is_empty() {
            version.id = self.id.clone();
        }
        Ok((version, raw))
    }
}

/// Look up `id` in the upstream manifest and fetch its metadata.
pub async fn fetch_version_metadata(
    client: &Client,
    manifest_url: &str,
    id: &str,
    cancel: &CancellationToken,
) -> LauncherResult<(VersionJson, String)> {
    let manifest = VersionManifest::fetch(client, manifest_url, cancel).await?;
    let entry = manifest
        .find_version(id)
        .ok_or_else(|| LauncherError::VersionNotFound(id.to_string()))?;
    entry.fetch_metadata(client, cancel).await
}
