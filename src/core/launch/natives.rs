// ─── Natives ───
// Unpacks platform native jars into `bin/<version-id>`.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::{Library, Platform};

/// Extract every native jar of `libraries` for `platform` into
/// `natives_dir`. Returns how many native jars were unpacked.
pub fn extract_natives(
    libraries: &[Library],
    libraries_dir: &Path,
    natives_dir: &Path,
    platform: Platform,
) -> LauncherResult<usize> {
    std::fs::create_dir_all(natives_dir).map_err(|e| LauncherError::io(natives_dir, e))?;

    let mut count = 0;
    for lib in libraries.iter().filter(|l| l.is_allowed(platform)) {
        let Some(native) = lib.native_artifact(platform) else {
            continue;
        };
        count += 1;
        let jar = native.local_path(libraries_dir);
        let exclude = lib
            .extract
            .as_ref()
            .map(|e| e.exclude.as_slice())
            .unwrap_or_default();
        let written = extract_native_jar(&jar, natives_dir, exclude)?;
        debug!("Extracted {} files from {:?}", written, jar);
    }
    Ok(count)
}

fn extract_native_jar(jar: &Path, dest: &Path, exclude: &[String]) -> LauncherResult<usize> {
    let file = File::open(jar).map_err(|e| LauncherError::io(jar, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if name.starts_with("META-INF/") || exclude.iter().any(|ex| name.starts_with(ex.as_str())) {
            continue;
        }
        let Some(target) = safe_join(dest, &name) else {
            warn!("Skipping unsafe native entry {:?} in {:?}", name, jar);
            continue;
        };

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| LauncherError::io(&target, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&target, e))?;
        written += 1;
    }
    Ok(written)
}

/// `base/name`, or `None` if `name` is absolute or climbs out of `base`.
pub fn safe_join(base: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    let mut out = base.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (out != base).then_some(out)
}
