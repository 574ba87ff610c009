use std::path::Path;

use tracing::{info, warn};

use crate::core::error::{LauncherError, LauncherResult};

/// Everything a version or loader switch invalidates. `java/` survives.
const INVALIDATED_ENTRIES: [&str; 15] = [
    "versions",
    "libraries",
    "mods",
    "assets",
    "bin",
    "logs",
    "saves",
    "resourcepacks",
    "shaderpacks",
    "config",
    "screenshots",
    "options.txt",
    "optionsof.txt",
    "usercache.json",
    "usernamecache.json",
];

/// Reset the install dir after a game version or loader change. Removal
/// failures are logged, not fatal.
pub fn clean_install_dir(base: &Path) -> LauncherResult<()> {
    if base.as_os_str().is_empty() {
        return Err(LauncherError::Config("install dir is empty".into()));
    }

    for name in INVALIDATED_ENTRIES {
        let path = base.join(name);
        let result = match std::fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&path),
            Ok(_) => std::fs::remove_file(&path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Failed to remove {:?}: {}", path, e);
        }
    }

    let java_dir = base.join("java");
    std::fs::create_dir_all(&java_dir).map_err(|e| LauncherError::io(&java_dir, e))?;
    info!("Install dir {:?} cleaned", base);
    Ok(())
}
