// ─── Version File ───
// Schema of a per-version metadata document, plus platform filtering for
// its libraries and argument templates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::downloader::{DownloadSource, Integrity};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MavenArtifact;
use crate::core::version::rules::{rules_allow, Platform, Rule};

/// A version record as stored at `versions/<id>/<id>.json`.
///
/// Unknown top-level keys are carried in `extra` so that records written
/// back to disk keep everything upstream sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,
    #[serde(default)]
    pub main_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,
    /// Legacy whitespace-delimited game arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<VersionDownloads>,
    #[serde(default)]
    pub libraries: Vec<Library>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_version: Option<JavaVersionInfo>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersionInfo {
    pub major_version: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<DownloadArtifact>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadArtifact {
    #[serde(default)]
    pub sha1: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub sha1: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Argument>,
    #[serde(default)]
    pub jvm: Vec<Argument>,
}

impl Arguments {
    pub fn is_empty(&self) -> bool {
        self.game.is_empty() && self.jvm.is_empty()
    }
}

// ─── Argument templates ───

/// One argument template: either a bare string or a rule-guarded value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Plain(String),
    Conditional {
        #[serde(default)]
        rules: Vec<Rule>,
        value: ArgumentValue,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    One(String),
    Many(Vec<String>),
}

impl Argument {
    /// Tokens this template contributes on `platform`.
    pub fn expand(&self, platform: Platform) -> Vec<String> {
        match self {
            Argument::Plain(value) => vec![value.clone()],
            Argument::Conditional { rules, value } => {
                if !rules_allow(rules, platform) {
                    return Vec::new();
                }
                match value {
                    ArgumentValue::One(v) => vec![v.clone()],
                    ArgumentValue::Many(vs) => vs.clone(),
                }
            }
        }
    }
}

// ─── Libraries ───

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    /// Repository base for libraries without a direct descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub natives: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<LibraryExtract>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<LibraryArtifact>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub classifiers: BTreeMap<String, LibraryArtifact>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryArtifact {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub sha1: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url: String,
}

impl LibraryArtifact {
    pub fn local_path(&self, libraries_dir: &Path) -> PathBuf {
        join_slashed(libraries_dir, &self.path)
    }

    pub fn integrity(&self) -> Integrity {
        Integrity::sha1(self.size, &self.sha1)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryExtract {
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// A concrete file to fetch for a library.
#[derive(Debug, Clone)]
pub struct LibraryFile {
    pub source: DownloadSource,
    pub dest: PathBuf,
    pub integrity: Integrity,
}

impl Library {
    pub fn is_allowed(&self, platform: Platform) -> bool {
        rules_allow(&self.rules, platform)
    }

    fn direct_artifact(&self) -> Option<&LibraryArtifact> {
        self.downloads
            .as_ref()?
            .artifact
            .as_ref()
            .filter(|a| !a.path.is_empty())
    }

    /// The native classifier for `platform`, with `${arch}` expanded.
    pub fn native_classifier(&self, platform: Platform) -> Option<String> {
        self.natives
            .get(platform.as_str())
            .map(|c| c.replace("${arch}", Platform::arch_bits()))
    }

    /// The native artifact descriptor for `platform`, if this library
    /// declares one.
    pub fn native_artifact(&self, platform: Platform) -> Option<&LibraryArtifact> {
        let classifier = self.native_classifier(platform)?;
        self.downloads.as_ref()?.classifiers.get(&classifier)
    }

    /// On-disk location of the main artifact.
    pub fn artifact_path(&self, libraries_dir: &Path) -> LauncherResult<PathBuf> {
        if let Some(artifact) = self.direct_artifact() {
            return Ok(artifact.local_path(libraries_dir));
        }
        Ok(MavenArtifact::parse(&self.name)?.local_path(libraries_dir))
    }

    /// What to fetch for the main artifact: the direct descriptor when
    /// present, otherwise the repository layout under `self.url` or
    /// `default_repo`.
    pub fn main_file(&self, libraries_dir: &Path, default_repo: &str) -> LauncherResult<LibraryFile> {
        if let Some(artifact) = self.direct_artifact() {
            if !artifact.url.is_empty() {
                return Ok(LibraryFile {
                    source: DownloadSource::new(artifact.url.clone()),
                    dest: artifact.local_path(libraries_dir),
                    integrity: artifact.integrity(),
                });
            }
        }

        let coordinate = MavenArtifact::parse(&self.name)?;
        // Installer-produced artifacts carry a path but no URL. An existing
        // file is accepted as is.
        let dest = match self.direct_artifact() {
            Some(artifact) => artifact.local_path(libraries_dir),
            None => coordinate.local_path(libraries_dir),
        };
        let repo = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(default_repo);
        Ok(LibraryFile {
            source: DownloadSource::new(coordinate.url(repo)),
            dest,
            integrity: Integrity::none(),
        })
    }

    pub fn native_file(&self, libraries_dir: &Path, platform: Platform) -> Option<LibraryFile> {
        let native = self.native_artifact(platform)?;
        Some(LibraryFile {
            source: DownloadSource::new(native.url.clone()),
            dest: native.local_path(libraries_dir),
            integrity: native.integrity(),
        })
    }
}

impl VersionJson {
    pub fn parse(raw: &str) -> LauncherResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub async fn load(path: &Path) -> LauncherResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        Self::parse(&raw)
    }

    /// Write this record as pretty JSON, creating parent directories.
    pub async fn save(&self, path: &Path) -> LauncherResult<()> {
        write_file(path, serde_json::to_string_pretty(self)?.as_bytes()).await
    }

    /// Persist a raw upstream document unchanged.
    pub async fn save_raw(raw: &str, path: &Path) -> LauncherResult<()> {
        write_file(path, raw.as_bytes()).await
    }

    pub fn client_download(&self) -> Option<&DownloadArtifact> {
        self.downloads
            .as_ref()?
            .client
            .as_ref()
            .filter(|c| !c.url.is_empty())
    }

    /// Structured arguments, or the legacy string tokenized into game
    /// arguments when no structured ones exist.
    pub fn normalized_arguments(&self) -> Arguments {
        if let Some(args) = self.arguments.as_ref().filter(|a| !a.is_empty()) {
            return args.clone();
        }
        let game = self
            .minecraft_arguments
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(|token| Argument::Plain(token.to_string()))
            .collect();
        Arguments {
            game,
            jvm: Vec::new(),
        }
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> LauncherResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| LauncherError::io(path, e))
}

/// Join a forward-slashed relative path onto `base`.
pub fn join_slashed(base: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(base.to_path_buf(), |path, part| path.join(part))
}
