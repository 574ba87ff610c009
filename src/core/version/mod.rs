pub mod install;
pub mod manifest;
pub mod resolve;
pub mod rules;
pub mod version_file;

pub use install::GameInstaller;
pub use manifest::{VersionEntry, VersionManifest};
pub use resolve::{resolve_version, ResolvedVersion};
pub use rules::{rules_allow, Platform, Rule, RuleAction};
pub use version_file::{
    Argument, ArgumentValue, Arguments, AssetIndexInfo, DownloadArtifact, Library,
    LibraryArtifact, LibraryDownloads, VersionJson,
};
