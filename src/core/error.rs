use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the entire launcher backend.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Manifest unavailable: {0}")]
    ManifestUnavailable(String),

    // ── Integrity ───────────────────────────────────────
    #[error("Checksum mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Size mismatch for {path:?}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    // ── Maven ───────────────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Version metadata ────────────────────────────────
    #[error("Version not found: {0}")]
    VersionNotFound(String),

    // ── Java ────────────────────────────────────────────
    #[error("Java runtime not found: Java {0} is required")]
    JavaNotFound(u32),

    #[error("Java {found} found but Java {required} is required")]
    JavaVersionMismatch { required: u32, found: u32 },

    // ── Processes ───────────────────────────────────────
    #[error("{program} failed (code {code:?})\n{output}")]
    ProcessFailed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    // ── Loader ──────────────────────────────────────────
    #[error("Loader error: {0}")]
    Loader(String),

    #[error("Loader API unreachable: {0}")]
    LoaderApi(String),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Config ──────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    // ── Control flow ────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl LauncherError {
    /// Build an `Io` error bound to the path that caused it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Transport errors and 5xx responses are transient. 4xx responses,
    /// integrity failures, parse failures and cancellation are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            LauncherError::Http(_) => true,
            LauncherError::DownloadFailed { .. } => !self.is_permanent(),
            _ => false,
        }
    }

    /// A 4xx response: the resource will not appear by asking again.
    pub fn is_permanent(&self) -> bool {
        matches!(self, LauncherError::DownloadFailed { status, .. } if (400..500).contains(status))
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for LauncherError {
    fn from(source: tokio::task::JoinError) -> Self {
        LauncherError::Other(format!("Task join error: {}", source))
    }
}
