pub mod client;

pub use client::{Checksum, DownloadSource, Downloader, Integrity};
