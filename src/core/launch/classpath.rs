// ─── Classpath Builder ───
// Constructs the classpath string for launching the game.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::{Platform, ResolvedVersion};

/// Platform-specific Java classpath separator.
pub fn classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

/// Classpath entries: every permitted library in chain order, then the
/// root client jar.
pub fn classpath_entries(
    libraries_dir: &Path,
    versions_dir: &Path,
    resolved: &ResolvedVersion,
    platform: Platform,
) -> Vec<String> {
    let mut entries = Vec::with_capacity(resolved.libraries.len() + 1);
    for lib in resolved.libraries.iter().filter(|l| l.is_allowed(platform)) {
        match lib.artifact_path(libraries_dir) {
            Ok(path) => entries.push(path.display().to_string()),
            Err(e) => debug!("Skipping {} on classpath: {}", lib.name, e),
        }
    }

    let client = if resolved.client_version.is_empty() {
        &resolved.id
    } else {
        &resolved.client_version
    };
    if !client.is_empty() {
        entries.push(
            versions_dir
                .join(client)
                .join(format!("{}.jar", client))
                .display()
                .to_string(),
        );
    }

    dedup_preserving_order(&mut entries);
    entries
}

pub fn build_classpath(
    libraries_dir: &Path,
    versions_dir: &Path,
    resolved: &ResolvedVersion,
) -> LauncherResult<String> {
    let entries = classpath_entries(libraries_dir, versions_dir, resolved, Platform::current());
    if entries.is_empty() {
        return Err(LauncherError::Loader(format!(
            "empty classpath for {}",
            resolved.id
        )));
    }
    Ok(entries.join(classpath_separator()))
}

// A loader and its parent can both list the same artifact.
fn dedup_preserving_order(entries: &mut Vec<String>) {
    let mut seen = HashSet::new();
    entries.retain(|entry| {
        let key = if cfg!(target_os = "windows") {
            entry.to_lowercase()
        } else {
            entry.clone()
        };
        seen.insert(key)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::Library;

    fn lib(raw: serde_json::Value) -> Library {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn libraries_in_order_then_client_jar() {
        let libs = Path::new("/root/libraries");
        let versions = Path::new("/root/versions");
        let resolved = ResolvedVersion {
            id: "fabric-loader-0.15.7-1.20.1".into(),
            client_version: "1.20.1".into(),
            libraries: vec![
                lib(serde_json::json!({"name": "com.mojang:brigadier:1.1.8",
                    "downloads": {"artifact": {"path": "com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar"}}})),
                lib(serde_json::json!({"name": "org.lwjgl:lwjgl:3.3.1",
                    "rules": [{"action": "allow", "os": {"name": "osx"}}]})),
                lib(serde_json::json!({"name": "net.fabricmc:fabric-loader:0.15.7"})),
                lib(serde_json::json!({"name": "com.mojang:brigadier:1.1.8"})),
            ],
            ..ResolvedVersion::default()
        };

        let entries = classpath_entries(libs, versions, &resolved, Platform::Linux);
        assert_eq!(
            entries,
            vec![
                libs.join("com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar").display().to_string(),
                libs.join("net/fabricmc/fabric-loader/0.15.7/fabric-loader-0.15.7.jar").display().to_string(),
                versions.join("1.20.1").join("1.20.1.jar").display().to_string(),
            ]
        );
    }

    #[test]
    fn empty_version_has_no_classpath() {
        let resolved = ResolvedVersion::default();
        assert!(build_classpath(Path::new("/l"), Path::new("/v"), &resolved).is_err());
    }
}
