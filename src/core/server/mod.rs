pub mod client;
pub mod manifest;

pub use client::ManifestClient;
pub use manifest::{Dependencies, FilePackage, JavaUrls, Manifest, Packages};
