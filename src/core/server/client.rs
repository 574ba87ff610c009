// ─── Manifest Client ───
// Signed requests to the modpack server and the offline manifest cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use sha2::Sha256;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::manifest::Manifest;
use crate::core::config::{LauncherPaths, ServerConfig};
use crate::core::downloader::DownloadSource;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::fetch_text;
use crate::core::retry::RetryPolicy;

type HmacSha256 = Hmac<Sha256>;

const MANIFEST_TIMEOUT: Duration = Duration::from_secs(30);
const HEADER_TIMESTAMP: &str = "X-Timestamp";
const HEADER_SIGNATURE: &str = "X-Signature";

#[derive(Debug, Clone)]
pub struct ManifestClient {
    base_url: String,
    secret: String,
    cache_path: PathBuf,
    http: Client,
    policy: RetryPolicy,
}

impl ManifestClient {
    pub fn new(
        base_url: impl Into<String>,
        secret: impl Into<String>,
        cache_path: impl Into<PathBuf>,
        http: Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            secret: secret.into(),
            cache_path: cache_path.into(),
            http,
            policy: RetryPolicy::manifest(),
        }
    }

    pub fn from_config(config: &ServerConfig, paths: &LauncherPaths, http: Client) -> Self {
        Self::new(
            config.server_base_url.clone(),
            config.server_secret.clone(),
            paths.manifest_cache(),
            http,
        )
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Signing ─────────────────────────────────────────

    /// `X-Timestamp` and `X-Signature` headers for `method url`. Empty when
    /// no secret is configured.
    pub fn sign(&self, method: &str, url: &str) -> LauncherResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if self.secret.trim().is_empty() {
            return Ok(headers);
        }

        let timestamp = chrono::Utc::now().timestamp();
        let signature = signature(&self.secret, method, &request_path(url), timestamp)?;
        headers.insert(HEADER_TIMESTAMP, HeaderValue::from(timestamp));
        headers.insert(
            HEADER_SIGNATURE,
            HeaderValue::from_str(&signature)
                .map_err(|e| LauncherError::Other(format!("signature header: {}", e)))?,
        );
        Ok(headers)
    }

    /// A signed GET template for an artifact hosted on the server.
    pub fn signed_source(&self, url: &str) -> LauncherResult<DownloadSource> {
        Ok(DownloadSource::with_headers(url, self.sign("GET", url)?))
    }

    /// Absolute URLs pass through; anything else is joined to the base.
    pub fn resolve_url(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return raw.to_string();
        }
        format!("{}/{}", self.base_url, raw.trim_start_matches('/'))
    }

    /// Relative URL under the server's `/download/` tree.
    pub fn is_local_download(&self, raw: &str) -> bool {
        let raw = raw.trim();
        if raw.contains("://") {
            return false;
        }
        let path = raw.split(['?', '#']).next().unwrap_or_default();
        clean_path(path).starts_with("/download/")
    }

    // ── Manifest ────────────────────────────────────────

    /// Fetch the desired state. Falls back to the last good copy on any
    /// failure except cancellation.
    #[instrument(skip(self, cancel), fields(base = %self.base_url))]
    pub async fn fetch_manifest(&self, cancel: &CancellationToken) -> LauncherResult<Manifest> {
        let err = match self.fetch_remote(cancel).await {
            Ok(manifest) => return Ok(manifest),
            Err(LauncherError::Cancelled) => return Err(LauncherError::Cancelled),
            Err(e) => e,
        };

        warn!("Manifest fetch failed: {}", err);
        match self.load_cached() {
            Some(manifest) => {
                info!("Using cached manifest {:?}", self.cache_path);
                Ok(manifest)
            }
            None => Err(LauncherError::ManifestUnavailable(err.to_string())),
        }
    }

    async fn fetch_remote(&self, cancel: &CancellationToken) -> LauncherResult<Manifest> {
        let url = format!("{}/manifest", self.base_url);
        let source = self.signed_source(&url)?;
        let raw = tokio::time::timeout(
            MANIFEST_TIMEOUT,
            fetch_text(&self.http, &source, self.policy, cancel),
        )
        .await
        .map_err(|_| LauncherError::ManifestUnavailable(format!("{} timed out", url)))??;

        let manifest: Manifest = serde_json::from_str(&raw)?;
        if let Err(e) = write_atomically(&self.cache_path, raw.as_bytes()) {
            warn!("Could not cache manifest: {}", e);
        }
        debug!(
            "Manifest {} {} ({} mods)",
            manifest.project,
            manifest.version,
            manifest.packages.mods.len()
        );
        Ok(manifest)
    }

    fn load_cached(&self) -> Option<Manifest> {
        let raw = std::fs::read_to_string(&self.cache_path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("Ignoring unreadable manifest cache: {}", e);
                None
            }
        }
    }
}

/// Hex HMAC-SHA256 of `METHOD\nPATH\nTIMESTAMP`.
pub fn signature(secret: &str, method: &str, path: &str, timestamp: i64) -> LauncherResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| LauncherError::Other(format!("hmac key: {}", e)))?;
    mac.update(format!("{}\n{}\n{}", method, path, timestamp).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Path component of `url`, always starting with `/`.
fn request_path(url: &str) -> String {
    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}

/// Lexical clean of a rooted path: drops `.` and empty segments and folds
/// `..`.
fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if path.starts_with('/') {
        format!("/{}", joined)
    } else {
        joined
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> LauncherResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes).map_err(|e| LauncherError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| LauncherError::io(path, e))
}
