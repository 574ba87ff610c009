use serde::{Deserialize, Serialize};

/// Desired state published by the modpack server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub project: String,
    pub studio: String,
    pub version: String,
    pub generated_at: String,
    pub dependencies: Dependencies,
    pub packages: Packages,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dependencies {
    pub game_version: String,
    /// `""`, `fabric`, `forge` or `neoforge`.
    pub loader: String,
    pub loader_version: String,
    pub java_urls: JavaUrls,
}

/// Runtime packages per Java major. Relative URLs live on the manifest
/// server and need a signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JavaUrls {
    pub java_8: String,
    pub java_17: String,
    pub java_21: String,
}

impl JavaUrls {
    /// URL for `major`, if one is published.
    pub fn for_major(&self, major: u32) -> Option<&str> {
        let url = match major {
            8 => &self.java_8,
            17 => &self.java_17,
            21 => &self.java_21,
            _ => return None,
        };
        Some(url.trim()).filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Packages {
    pub mods: Vec<FilePackage>,
}

/// One file the install dir must contain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePackage {
    /// Relative to `mods/`, forward slashes.
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub size: u64,
    pub sha256: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_document_with_missing_sections() {
        let manifest: Manifest = serde_json::from_str(
            r#"{
                "project": "pack",
                "dependencies": {"game_version": "1.20.1", "loader": "fabric",
                                 "java_urls": {"java_17": "/download/java/jdk17.zip"}},
                "packages": {"mods": [{"path": "mods/a.jar", "size": 3, "sha256": "ab", "url": "/download/mods/a.jar"}]}
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.dependencies.game_version, "1.20.1");
        assert_eq!(manifest.dependencies.loader_version, "");
        assert_eq!(manifest.packages.mods[0].size, 3);
        assert_eq!(
            manifest.dependencies.java_urls.for_major(17),
            Some("/download/java/jdk17.zip")
        );
        assert_eq!(manifest.dependencies.java_urls.for_major(8), None);
        assert_eq!(manifest.dependencies.java_urls.for_major(16), None);
    }
}
