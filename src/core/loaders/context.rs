use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::core::version::GameInstaller;

/// Everything a loader install needs. The base game installer is shared so
/// loaders can sync their own libraries through it.
pub struct InstallContext<'a> {
    pub game_version: &'a str,
    /// Empty means "pick one" for loaders that support it.
    pub loader_version: &'a str,
    /// Required by loaders that run installer processors.
    pub java_path: Option<&'a Path>,
    pub game: &'a GameInstaller<'a>,
    pub cancel: &'a CancellationToken,
}
