// ─── Runtime Acquisition ───
// Downloads a server-provided Java package into `java/downloads/` and
// unpacks or installs it.

use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;

#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

use flate2::read::GzDecoder;
use tar::Archive;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::runtime::{find_installed, java_version_dir};
use crate::core::downloader::{DownloadSource, Downloader, Integrity};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::natives::safe_join;

/// How a downloaded runtime package is turned into a usable Java.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimePackage {
    Zip,
    TarGz,
    Msi,
    Exe,
}

impl RuntimePackage {
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".msi") {
            Some(Self::Msi)
        } else if lower.ends_with(".exe") {
            Some(Self::Exe)
        } else {
            None
        }
    }
}

/// File name for the downloaded package: the URL path's last segment, or
/// `java<major>.zip`.
pub fn archive_name(url: &str, major: u32) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, p)| p).unwrap_or_default(),
        None => without_query,
    };
    match path.rsplit('/').next().map(str::trim) {
        Some(name) if !name.is_empty() && name != "." && name != ".." => name.to_string(),
        _ => format!("java{}.zip", major),
    }
}

/// Download `source` and make Java `major` available under
/// `<java_dir>/java<major>`. Returns the discovered binary.
#[instrument(skip(downloader, source, cancel), fields(url = %source.url))]
pub async fn acquire_runtime(
    downloader: &Downloader,
    java_dir: &Path,
    major: u32,
    source: &DownloadSource,
    cancel: &CancellationToken,
) -> LauncherResult<PathBuf> {
    if major == 0 {
        return Err(LauncherError::Config("java version not resolved".into()));
    }
    let name = archive_name(&source.url, major);
    let package = RuntimePackage::from_file_name(&name).ok_or_else(|| {
        LauncherError::Other(format!("unsupported java package: {}", name))
    })?;

    let archive = java_dir.join("downloads").join(&name);
    downloader
        .ensure_file(source, &archive, &Integrity::none(), cancel)
        .await?;
    info!("Installing Java {} from {:?}", major, archive);

    match package {
        RuntimePackage::Zip | RuntimePackage::TarGz => {
            let target = java_version_dir(java_dir, major);
            let archive = archive.clone();
            tokio::task::spawn_blocking(move || -> LauncherResult<()> {
                match std::fs::remove_dir_all(&target) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(LauncherError::io(&target, e)),
                }
                std::fs::create_dir_all(&target).map_err(|e| LauncherError::io(&target, e))?;
                if package == RuntimePackage::Zip {
                    extract_zip(&archive, &target)?;
                } else {
                    extract_tar_gz(&archive, &target)?;
                }
                mark_binaries_executable(&target)
            })
            .await??;
        }
        RuntimePackage::Msi | RuntimePackage::Exe => {
            run_installer(&archive, package, cancel).await?;
        }
    }

    find_installed(java_dir, major)
        .await
        .ok_or(LauncherError::JavaNotFound(major))
}

/// Unpack a zip, refusing entries that escape `dest`.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> LauncherResult<usize> {
    let file = File::open(archive_path).map_err(|e| LauncherError::io(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        let Some(target) = entry_target(dest, &name)? else {
            continue;
        };
        if entry.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| LauncherError::io(&target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| LauncherError::io(&target, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&target, e))?;
        written += 1;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode & 0o777))
                    .map_err(|e| LauncherError::io(&target, e))?;
            }
        }
    }
    Ok(written)
}

/// Unpack a `.tar.gz`, refusing entries that escape `dest`.
pub fn extract_tar_gz(archive_path: &Path, dest: &Path) -> LauncherResult<usize> {
    let file = File::open(archive_path).map_err(|e| LauncherError::io(archive_path, e))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let mut written = 0;

    let entries = archive
        .entries()
        .map_err(|e| LauncherError::io(archive_path, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| LauncherError::io(archive_path, e))?;
        let name = entry
            .path()
            .map_err(|e| LauncherError::io(archive_path, e))?
            .to_string_lossy()
            .into_owned();
        if entry_target(dest, &name)?.is_none() {
            continue;
        }
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| LauncherError::io(dest, e))?;
        if !unpacked {
            return Err(LauncherError::Other(format!("unsafe archive entry: {}", name)));
        }
        written += 1;
    }
    Ok(written)
}

/// Where an archive entry lands. `..` and absolute names are errors; an
/// entry naming the root itself yields `None`.
fn entry_target(dest: &Path, name: &str) -> LauncherResult<Option<PathBuf>> {
    let escapes = Path::new(name).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(LauncherError::Other(format!("unsafe archive entry: {}", name)));
    }
    Ok(safe_join(dest, name))
}

/// Archives built on Windows carry no permission bits; give every file in
/// a `bin` directory the execute bit.
fn mark_binaries_executable(root: &Path) -> LauncherResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let Ok(entries) = std::fs::read_dir(root) else {
            return Ok(());
        };
        let in_bin = root.file_name().and_then(|n| n.to_str()) == Some("bin");
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                mark_binaries_executable(&path)?;
            } else if in_bin && file_type.is_file() {
                let mut perms = std::fs::metadata(&path)
                    .map_err(|e| LauncherError::io(&path, e))?
                    .permissions();
                perms.set_mode(perms.mode() | 0o755);
                std::fs::set_permissions(&path, perms).map_err(|e| LauncherError::io(&path, e))?;
            }
        }
    }
    #[cfg(not(unix))]
    let _ = root;
    Ok(())
}

async fn run_installer(
    installer: &Path,
    package: RuntimePackage,
    cancel: &CancellationToken,
) -> LauncherResult<()> {
    let mut cmd = if package == RuntimePackage::Msi {
        let mut cmd = Command::new("msiexec");
        cmd.arg("/i").arg(installer);
        cmd
    } else {
        Command::new(installer)
    };
    cmd.args(["/qn", "/norestart"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(target_os = "windows")]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    let program = installer.display().to_string();
    let child = cmd.spawn().map_err(|e| LauncherError::io(installer, e))?;
    let output = tokio::select! {
        _ = cancel.cancelled() => return Err(LauncherError::Cancelled),
        output = child.wait_with_output() => output.map_err(|e| LauncherError::io(installer, e))?,
    };

    if !output.status.success() {
        warn!("Java installer {} exited with {:?}", program, output.status.code());
        return Err(LauncherError::ProcessFailed {
            program,
            code: output.status.code(),
            output: format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }
    Ok(())
}
