// ─── Installer Archive ───
// `install_profile.json` schema and helpers for pulling files out of an
// installer jar.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use zip::ZipArchive;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MavenArtifact;
use crate::core::version::{LibraryArtifact, VersionJson};

const PROFILE_ENTRY: &str = "install_profile.json";
const DEFAULT_VERSION_ENTRY: &str = "version.json";

#[derive(Debug, Clone, Deserialize)]
pub struct InstallProfile {
    #[serde(default)]
    pub minecraft: String,
    /// Archive entry holding the version document, e.g. `/version.json`.
    #[serde(default)]
    pub json: Option<String>,
    #[serde(default)]
    pub libraries: Vec<ProfileLibrary>,
    #[serde(default)]
    pub processors: Vec<Processor>,
    #[serde(default)]
    pub data: BTreeMap<String, DataEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileLibrary {
    pub name: MavenArtifact,
    #[serde(default)]
    pub downloads: Option<ProfileLibraryDownloads>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileLibraryDownloads {
    #[serde(default)]
    pub artifact: Option<LibraryArtifact>,
}

impl ProfileLibrary {
    pub fn artifact(&self) -> Option<&LibraryArtifact> {
        self.downloads.as_ref()?.artifact.as_ref()
    }

    /// Repository-relative path: the declared one, else the coordinate's.
    pub fn relative_path(&self) -> String {
        match self.artifact().filter(|a| !a.path.is_empty()) {
            Some(artifact) => artifact.path.clone(),
            None => self.name.repository_path(),
        }
    }

    /// Where the installer bundles this artifact when it has no URL.
    pub fn bundled_entry(&self) -> String {
        format!("maven/{}", self.name.repository_path())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataEntry {
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub server: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Processor {
    pub jar: MavenArtifact,
    #[serde(default)]
    pub sides: Vec<String>,
    #[serde(default)]
    pub classpath: Vec<MavenArtifact>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

impl Processor {
    pub fn runs_on_client(&self) -> bool {
        self.sides.is_empty() || self.sides.iter().any(|s| s == "client")
    }
}

/// Both documents an installer carries.
#[derive(Debug, Clone)]
pub struct InstallerDocuments {
    pub profile: InstallProfile,
    pub version: VersionJson,
}

pub fn open_archive(path: &Path) -> LauncherResult<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| LauncherError::io(path, e))?;
    Ok(ZipArchive::new(file)?)
}

/// Read the install profile and the version document it names.
pub fn read_installer(path: &Path) -> LauncherResult<InstallerDocuments> {
    let mut archive = open_archive(path)?;

    let raw_profile = read_entry(&mut archive, PROFILE_ENTRY)?
        .ok_or_else(|| LauncherError::Loader(format!("{} missing {}", path.display(), PROFILE_ENTRY)))?;
    let profile: InstallProfile = serde_json::from_slice(&raw_profile)?;

    let named = profile
        .json
        .as_deref()
        .map(|name| name.trim_start_matches('/'))
        .filter(|name| !name.is_empty());
    let mut raw_version = None;
    for candidate in named.into_iter().chain(std::iter::once(DEFAULT_VERSION_ENTRY)) {
        raw_version = read_entry(&mut archive, candidate)?;
        if raw_version.is_some() {
            break;
        }
    }
    let raw_version = raw_version.ok_or_else(|| {
        LauncherError::Loader(format!("{} carries no version document", path.display()))
    })?;
    let version = VersionJson::parse(&String::from_utf8_lossy(&raw_version))?;

    Ok(InstallerDocuments { profile, version })
}

/// Entry bytes by name, accepting a leading `/` on either side.
pub fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> LauncherResult<Option<Vec<u8>>> {
    let wanted = name.trim_start_matches('/');
    let index = (0..archive.len()).find(|&i| {
        archive
            .name_for_index(i)
            .map(|n| n.trim_start_matches('/') == wanted)
            .unwrap_or(false)
    });
    let Some(index) = index else {
        return Ok(None);
    };

    let mut entry = archive.by_index(index)?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

/// Write entry `name` to `dest`, creating parents. A missing entry is an
/// error.
pub fn extract_entry(archive: &mut ZipArchive<File>, name: &str, dest: &Path) -> LauncherResult<()> {
    let bytes = read_entry(archive, name)?
        .ok_or_else(|| LauncherError::Loader(format!("installer entry missing: {}", name)))?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }
    std::fs::write(dest, bytes).map_err(|e| LauncherError::io(dest, e))
}
