pub mod core;

pub use crate::core::config::{LauncherPaths, LocalConfig, PlayerProfile, ServerConfig};
pub use crate::core::error::{LauncherError, LauncherResult};
pub use crate::core::orchestrator::Launcher;
pub use crate::core::progress::{ProgressCallback, ProgressEvent, ProgressTracker};
