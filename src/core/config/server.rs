use serde::{Deserialize, Serialize};

use super::{read_json, write_json, LauncherPaths};
use crate::core::error::LauncherResult;

pub const DEFAULT_SERVER_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_ASSET_WORKERS: usize = 16;
pub const MAX_ASSET_WORKERS: usize = 16;

const ENV_SERVER_URL: &str = "KEYSTONE_SERVER_URL";
const ENV_SERVER_SECRET: &str = "KEYSTONE_SERVER_SECRET";

/// Where the desired-state server lives and how to authenticate to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server_base_url: String,
    #[serde(default)]
    pub server_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_base_url: DEFAULT_SERVER_BASE_URL.to_string(),
            server_secret: String::new(),
            asset_workers: None,
        }
    }
}

impl ServerConfig {
    /// Load `server.json`, then apply environment overrides.
    pub fn load(paths: &LauncherPaths) -> LauncherResult<Self> {
        let config: ServerConfig = read_json(&paths.server_config())?.unwrap_or_default();
        Ok(config.with_overrides(
            std::env::var(ENV_SERVER_URL).ok(),
            std::env::var(ENV_SERVER_SECRET).ok(),
        ))
    }

    pub fn save(&self, paths: &LauncherPaths) -> LauncherResult<()> {
        write_json(&paths.server_config(), self)
    }

    fn with_overrides(mut self, url: Option<String>, secret: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.server_base_url = url;
        }
        if let Some(secret) = secret {
            self.server_secret = secret;
        }
        self.server_base_url = normalize_base_url(&self.server_base_url);
        if self.server_base_url.is_empty() {
            self.server_base_url = DEFAULT_SERVER_BASE_URL.to_string();
        }
        self
    }

    /// Asset worker count, clamped to `1..=16`.
    pub fn asset_workers(&self) -> usize {
        self.asset_workers
            .unwrap_or(DEFAULT_ASSET_WORKERS)
            .clamp(1, MAX_ASSET_WORKERS)
    }
}

fn normalize_base_url(raw: &str) -> String {
    let base = raw.trim().trim_end_matches('/');
    if base.is_empty() || base.starts_with("http://") || base.starts_with("https://") {
        return base.to_string();
    }
    format!("https://{}", base)
}
