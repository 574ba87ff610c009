use std::path::{Path, PathBuf};

/// Directory layout of one install root.
///
/// - `versions/<id>/<id>.json|jar` - version records and client jars
/// - `libraries/`                  - repository-layout artifacts
/// - `assets/`                     - asset indexes and objects
/// - `bin/<id>/`                   - extracted natives
/// - `mods/`                       - reconciled mod files
/// - `java/java<major>/`           - managed runtimes
/// - `installers/`, `tmp/`         - loader installer archives and scratch
#[derive(Debug, Clone)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_json(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id).join(format!("{}.json", id))
    }

    pub fn version_jar(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id).join(format!("{}.jar", id))
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn natives_dir(&self, id: &str) -> PathBuf {
        self.root.join("bin").join(id)
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.root.join("mods")
    }

    pub fn java_dir(&self) -> PathBuf {
        self.root.join("java")
    }

    pub fn installers_dir(&self) -> PathBuf {
        self.root.join("installers")
    }

    pub fn scratch_dir(&self, name: &str) -> PathBuf {
        self.root.join("tmp").join(name)
    }
}
