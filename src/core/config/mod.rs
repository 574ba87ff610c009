// ─── Configuration ───
// Small JSON records under the per-user config root, plus the upstream
// endpoint table.

mod endpoints;
mod local;
mod server;

pub use endpoints::Endpoints;
pub use local::{LocalConfig, PlayerProfile};
pub use server::ServerConfig;

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::error::{LauncherError, LauncherResult};

pub const APP_DIR_NAME: &str = "keystone";

/// Locations of the launcher's own files.
#[derive(Debug, Clone)]
pub struct LauncherPaths {
    root: PathBuf,
}

impl LauncherPaths {
    /// `<user config dir>/keystone`, falling back to the working directory.
    pub fn from_user_dirs() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::at(base.join(APP_DIR_NAME))
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn local_config(&self) -> PathBuf {
        self.root.join("launcher.json")
    }

    pub fn server_config(&self) -> PathBuf {
        self.root.join("server.json")
    }

    pub fn profile(&self) -> PathBuf {
        self.root.join("profile.json")
    }

    pub fn manifest_cache(&self) -> PathBuf {
        self.root.join("manifest_cache.json")
    }
}

/// Read a JSON record, or `None` when the file does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> LauncherResult<Option<T>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LauncherError::io(path, e)),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> LauncherResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|e| LauncherError::io(path, e))
}
