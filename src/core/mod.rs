// ─── Keystone Core ───
// Server-driven modpack installer and launcher.
//
// Architecture:
//   core/
//     config/       - Local config, player profile, server settings, endpoints
//     server/       - Signed manifest client with offline cache
//     downloader/   - Verified, resumable-safe file downloads
//     version/      - Version manifest, version records, OS rules, base install
//     assets/       - Asset index + parallel object sync
//     maven/        - Maven coordinates
//     loaders/      - Fabric, Forge, NeoForge
//     java/         - Runtime discovery and acquisition
//     launch/       - Classpath, natives, arguments, process spawn
//     orchestrator/ - Install / launch / mod sync entry points

pub mod assets;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod identity;
pub mod instance;
pub mod java;
pub mod launch;
pub mod loaders;
pub mod maven;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod server;
pub mod version;

#[cfg(test)]
pub(crate) mod test_support;
