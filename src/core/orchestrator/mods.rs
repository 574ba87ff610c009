// ─── Mod Reconciliation ───
// Makes `mods/` contain exactly the manifest's files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::downloader::{Downloader, Integrity};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::natives::safe_join;
use crate::core::progress::ProgressTracker;
use crate::core::retry::check_cancelled;
use crate::core::server::{FilePackage, ManifestClient};

pub const MODS_STEP: &str = "mods";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModSyncReport {
    /// Fetched from the server.
    pub downloaded: usize,
    /// Already present with the declared size and digest.
    pub unchanged: usize,
    pub removed: usize,
}

/// Comparison key: lower-case, forward slashes.
pub fn mod_key(relative: &str) -> String {
    relative.replace('\\', "/").to_lowercase()
}

/// Every file below `root`, keyed by [`mod_key`] of its relative path. A
/// missing directory is empty.
pub fn list_local_files(root: &Path) -> LauncherResult<BTreeMap<String, PathBuf>> {
    let mut files = BTreeMap::new();
    collect(root, root, &mut files)?;
    Ok(files)
}

fn collect(root: &Path, dir: &Path, out: &mut BTreeMap<String, PathBuf>) -> LauncherResult<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(LauncherError::io(dir, e)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| LauncherError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| LauncherError::io(&path, e))?;
        if file_type.is_dir() {
            collect(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.insert(mod_key(&relative.to_string_lossy()), path.clone());
        }
    }
    Ok(())
}

/// Download every desired mod and delete every file the manifest does not
/// list.
pub async fn sync_mods(
    downloader: &Downloader,
    server: &ManifestClient,
    mods_dir: &Path,
    mods: &[FilePackage],
    progress: &ProgressTracker,
    cancel: &CancellationToken,
) -> LauncherResult<ModSyncReport> {
    std::fs::create_dir_all(mods_dir).map_err(|e| LauncherError::io(mods_dir, e))?;

    let mut expected: BTreeMap<String, &FilePackage> = BTreeMap::new();
    for package in mods {
        if package.path.trim().is_empty() || package.url.trim().is_empty() {
            continue;
        }
        expected.insert(mod_key(&package.path), package);
    }

    let extras: Vec<PathBuf> = list_local_files(mods_dir)?
        .into_iter()
        .filter(|(key, _)| !expected.contains_key(key))
        .map(|(_, path)| path)
        .collect();

    progress.set_total(MODS_STEP, (expected.len() + extras.len()) as u64);
    info!(
        "Mod sync: {} expected, {} to remove",
        expected.len(),
        extras.len()
    );

    let mut report = ModSyncReport::default();
    for package in expected.values() {
        check_cancelled(cancel)?;
        let dest = safe_join(mods_dir, &package.path).ok_or_else(|| {
            LauncherError::Config(format!("unsafe mod path: {}", package.path))
        })?;
        let source = server.signed_source(&server.resolve_url(&package.url))?;
        let requests = downloader
            .ensure_file(
                &source,
                &dest,
                &Integrity::sha256(package.size, &package.sha256),
                cancel,
            )
            .await?;
        if requests > 0 {
            report.downloaded += 1;
        } else {
            report.unchanged += 1;
        }
        progress.increment(MODS_STEP);
    }

    for extra in extras {
        if let Err(e) = std::fs::remove_file(&extra) {
            warn!("Could not remove {:?}: {}", extra, e);
        }
        report.removed += 1;
        progress.increment(MODS_STEP);
    }

    info!(
        "Mod sync complete: {} downloaded, {} unchanged, {} removed",
        report.downloaded, report.unchanged, report.removed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{sha256_hex, StubServer};

    fn package(path: &str, url: &str, body: &[u8]) -> FilePackage {
        FilePackage {
            path: path.into(),
            name: String::new(),
            size: body.len() as u64,
            sha256: sha256_hex(body),
            url: url.into(),
        }
    }

    #[test]
    fn keys_are_case_and_separator_insensitive() {
        assert_eq!(mod_key("Sub\\Mod.JAR"), "sub/mod.jar");
        assert_eq!(mod_key("sub/mod.jar"), mod_key("SUB/mod.jar"));
    }

    #[test]
    fn missing_mods_dir_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_local_files(&dir.path().join("mods")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn reconciles_mods_dir_with_manifest() {
        let server = StubServer::start().await;
        server.route("/download/mods/a.jar", 200, b"aaa".to_vec());
        server.route("/download/mods/lib/b.jar", 200, b"bbb".to_vec());

        let dir = tempfile::tempdir().unwrap();
        let mods_dir = dir.path().join("mods");
        std::fs::create_dir_all(mods_dir.join("lib")).unwrap();
        std::fs::write(mods_dir.join("stale.jar"), b"old").unwrap();
        std::fs::write(mods_dir.join("lib/B.JAR"), b"bbb").unwrap();

        let client = ManifestClient::new(
            server.base_url(),
            "secret",
            dir.path().join("cache.json"),
            reqwest::Client::new(),
        );
        let mods = vec![
            package("a.jar", "/download/mods/a.jar", b"aaa"),
            package("lib/b.jar", "download/mods/lib/b.jar", b"bbb"),
            package("", "/download/ignored.jar", b"x"),
            package("no-url.jar", "", b"x"),
        ];
        let downloader = Downloader::new(reqwest::Client::new());
        let progress = ProgressTracker::silent();

        let report = sync_mods(
            &downloader,
            &client,
            &mods_dir,
            &mods,
            &progress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            report,
            ModSyncReport {
                downloaded: 2,
                unchanged: 0,
                removed: 1
            }
        );
        assert_eq!(std::fs::read(mods_dir.join("a.jar")).unwrap(), b"aaa");
        assert!(!mods_dir.join("stale.jar").exists());
        assert_eq!(progress.step(MODS_STEP), Some((3, 3)));
        assert_eq!(server.hit_count("/download/mods/a.jar"), 1);
        assert!(server.requests()[0].headers.contains_key("x-signature"));
    }

    #[tokio::test]
    async fn matching_mod_is_left_untouched() {
        let server = StubServer::start().await;
        server.route("/download/mods/a.jar", 200, b"aaa".to_vec());
        server.route("/download/mods/b.jar", 200, b"bbb".to_vec());

        let dir = tempfile::tempdir().unwrap();
        let mods_dir = dir.path().join("mods");
        std::fs::create_dir_all(&mods_dir).unwrap();
        std::fs::write(mods_dir.join("a.jar"), b"aaa").unwrap();
        std::fs::write(mods_dir.join("c.jar"), b"ccc").unwrap();
        let a_modified = std::fs::metadata(mods_dir.join("a.jar"))
            .unwrap()
            .modified()
            .unwrap();

        let client = ManifestClient::new(
            server.base_url(),
            "secret",
            dir.path().join("cache.json"),
            reqwest::Client::new(),
        );
        let mods = vec![
            package("a.jar", "/download/mods/a.jar", b"aaa"),
            package("b.jar", "/download/mods/b.jar", b"bbb"),
        ];
        let progress = ProgressTracker::silent();

        let report = sync_mods(
            &Downloader::new(reqwest::Client::new()),
            &client,
            &mods_dir,
            &mods,
            &progress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            report,
            ModSyncReport {
                downloaded: 1,
                unchanged: 1,
                removed: 1
            }
        );
        assert_eq!(server.hit_count("/download/mods/a.jar"), 0);
        assert_eq!(server.hit_count("/download/mods/b.jar"), 1);
        assert_eq!(
            std::fs::metadata(mods_dir.join("a.jar"))
                .unwrap()
                .modified()
                .unwrap(),
            a_modified
        );
        assert_eq!(std::fs::read(mods_dir.join("b.jar")).unwrap(), b"bbb");
        assert!(!mods_dir.join("c.jar").exists());
        assert_eq!(progress.step(MODS_STEP), Some((3, 3)));
    }

    #[tokio::test]
    async fn integrity_failure_aborts_sync() {
        let server = StubServer::start().await;
        server.route("/download/a.jar", 200, b"tampered".to_vec());
        let dir = tempfile::tempdir().unwrap();
        let client = ManifestClient::new(
            server.base_url(),
            "",
            dir.path().join("cache.json"),
            reqwest::Client::new(),
        );
        let downloader = Downloader::new(reqwest::Client::new());

        let result = sync_mods(
            &downloader,
            &client,
            &dir.path().join("mods"),
            &[package("a.jar", "/download/a.jar", b"original")],
            &ProgressTracker::silent(),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(LauncherError::ChecksumMismatch { .. })));
        assert!(!dir.path().join("mods/a.jar").exists());
    }
}
