// ─── Processor Data ───
// The installer's data table and the argument templating that reads it.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use super::profile::{extract_entry, InstallProfile};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::InstallLayout;
use crate::core::maven::MavenArtifact;
use crate::core::version::version_file::join_slashed;

/// A resolved data value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    /// `[group:artifact:version]`, resolved against the libraries dir.
    Library(MavenArtifact),
    /// `'text'`
    Literal(String),
    /// Anything else: a file on disk.
    File(PathBuf),
}

pub type DataTable = BTreeMap<String, DataValue>;

impl DataValue {
    /// Classify a raw client-side data value. Archive paths land under
    /// `scratch_dir`; the caller extracts them.
    pub fn classify(raw: &str, scratch_dir: &Path) -> LauncherResult<Self> {
        if let Some(parsed) = MavenArtifact::parse_bracketed(raw) {
            return Ok(DataValue::Library(parsed?));
        }
        if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
            return Ok(DataValue::Literal(raw[1..raw.len() - 1].to_string()));
        }
        let entry = archive_entry_name(raw)?;
        Ok(DataValue::File(join_slashed(scratch_dir, entry)))
    }

    pub fn resolve(&self, libraries_dir: &Path) -> String {
        match self {
            DataValue::Library(artifact) => artifact.local_path(libraries_dir).display().to_string(),
            DataValue::Literal(value) => value.clone(),
            DataValue::File(path) => path.display().to_string(),
        }
    }
}

/// Archive entry a file value refers to. Rejects entries that would escape
/// the scratch directory.
fn archive_entry_name(raw: &str) -> LauncherResult<&str> {
    let entry = raw.trim_start_matches('/');
    let escapes = Path::new(entry)
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if entry.is_empty() || escapes {
        return Err(LauncherError::Loader(format!("unsafe installer data path: {}", raw)));
    }
    Ok(entry)
}

/// Values every install gets on top of the profile's own data.
pub struct InjectedData<'a> {
    pub layout: &'a InstallLayout,
    pub game_version: &'a str,
    pub loader_version: &'a str,
    pub installer_path: &'a Path,
}

/// Classify every profile data entry, extract file values from the
/// installer into `scratch_dir`, then add the injected keys.
pub fn build_data_table(
    profile: &InstallProfile,
    archive: &mut ZipArchive<File>,
    scratch_dir: &Path,
    injected: &InjectedData<'_>,
) -> LauncherResult<DataTable> {
    let mut table = DataTable::new();

    for (key, entry) in &profile.data {
        let value = DataValue::classify(&entry.client, scratch_dir)?;
        if let DataValue::File(dest) = &value {
            extract_entry(archive, archive_entry_name(&entry.client)?, dest)?;
        }
        table.insert(key.clone(), value);
    }

    let game = injected.game_version;
    table.insert("SIDE".into(), DataValue::Literal("client".into()));
    table.insert(
        "MINECRAFT_JAR".into(),
        DataValue::File(injected.layout.version_jar(game)),
    );
    table.insert("MINECRAFT_VERSION".into(), DataValue::Literal(game.to_string()));
    table.insert(
        "INSTALLER".into(),
        DataValue::File(injected.installer_path.to_path_buf()),
    );
    table.insert(
        "LIBRARY_DIR".into(),
        DataValue::File(injected.layout.libraries_dir()),
    );
    table.insert(
        "LOADER_VERSION".into(),
        DataValue::Literal(injected.loader_version.to_string()),
    );

    Ok(table)
}

/// Expand one processor argument.
///
/// A bare `[coordinate]` becomes a library path. Otherwise `{KEY}` tokens
/// are replaced from `data` (unknown keys expand to nothing) and `\`
/// escapes the next character.
pub fn format_processor_arg(input: &str, libraries_dir: &Path, data: &DataTable) -> String {
    if let Some(Ok(artifact)) = MavenArtifact::parse_bracketed(input) {
        return artifact.local_path(libraries_dir).display().to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut token: Option<String> = None;
    let mut escaped = false;

    for ch in input.chars() {
        match ch {
            '\\' if !escaped => escaped = true,
            '{' if !escaped && token.is_none() => token = Some(String::new()),
            '}' if !escaped && token.is_some() => {
                let key = token.take().unwrap_or_default();
                if let Some(value) = data.get(&key) {
                    out.push_str(&value.resolve(libraries_dir));
                }
            }
            _ => {
                match token.as_mut() {
                    Some(key) => key.push(ch),
                    None => out.push(ch),
                }
                escaped = false;
            }
        }
    }

    out
}
