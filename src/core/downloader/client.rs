use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::Client;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::retry::{with_retry, RetryPolicy};

/// Expected content digest, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checksum {
    Sha256(String),
    Sha1(String),
}

impl Checksum {
    fn expected(&self) -> &str {
        match self {
            Checksum::Sha256(hex) | Checksum::Sha1(hex) => hex,
        }
    }
}

/// What a finished file must look like. `size == 0` means unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Integrity {
    pub size: u64,
    pub checksum: Option<Checksum>,
}

impl Integrity {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn sha256(size: u64, hex: &str) -> Self {
        Self {
            size,
            checksum: non_empty(hex).map(Checksum::Sha256),
        }
    }

    pub fn sha1(size: u64, hex: &str) -> Self {
        Self {
            size,
            checksum: non_empty(hex).map(Checksum::Sha1),
        }
    }
}

fn non_empty(hex: &str) -> Option<String> {
    let hex = hex.trim();
    (!hex.is_empty()).then(|| hex.to_ascii_lowercase())
}

/// A request template. A fresh request is built from it for every attempt.
#[derive(Debug, Clone)]
pub struct DownloadSource {
    pub url: String,
    pub headers: HeaderMap,
}

impl DownloadSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_headers(url: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            url: url.into(),
            headers,
        }
    }
}

impl From<&str> for DownloadSource {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for DownloadSource {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

enum Hasher {
    Sha256(Sha256),
    Sha1(Sha1),
    Skip,
}

impl Hasher {
    fn for_checksum(checksum: Option<&Checksum>) -> Self {
        match checksum {
            Some(Checksum::Sha256(_)) => Hasher::Sha256(Sha256::new()),
            Some(Checksum::Sha1(_)) => Hasher::Sha1(Sha1::new()),
            None => Hasher::Skip,
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(bytes),
            Hasher::Sha1(h) => h.update(bytes),
            Hasher::Skip => {}
        }
    }

    fn finish(self) -> Option<String> {
        match self {
            Hasher::Sha256(h) => Some(hex::encode(h.finalize())),
            Hasher::Sha1(h) => Some(hex::encode(h.finalize())),
            Hasher::Skip => None,
        }
    }
}

/// Verified, resumable-by-replacement file fetcher.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    policy: RetryPolicy,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            policy: RetryPolicy::downloads(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    // ── Single file ─────────────────────────────────────

    /// Make sure `dest` exists and matches `expect`.
    ///
    /// Returns the number of HTTP requests issued; zero when the file on
    /// disk was already valid.
    pub async fn ensure_file(
        &self,
        source: &DownloadSource,
        dest: &Path,
        expect: &Integrity,
        cancel: &CancellationToken,
    ) -> LauncherResult<u32> {
        if Self::is_valid(dest, expect).await {
            debug!("Up to date: {:?}", dest);
            return Ok(0);
        }

        let requests = with_retry(self.policy, cancel, |attempt| async move {
            self.fetch_once(source, dest, expect, cancel)
                .await
                .map(|_| attempt)
        })
        .await?;

        debug!("Downloaded: {} -> {:?}", source.url, dest);
        Ok(requests)
    }

    async fn fetch_once(
        &self,
        source: &DownloadSource,
        dest: &Path,
        expect: &Integrity,
        cancel: &CancellationToken,
    ) -> LauncherResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let tmp = temp_path(dest);
        let transfer = self.stream_to(source, &tmp, expect);
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(LauncherError::Cancelled),
            result = transfer => result,
        };

        if let Err(err) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err);
        }

        if tokio::fs::try_exists(dest).await.unwrap_or(false) {
            tokio::fs::remove_file(dest)
                .await
                .map_err(|e| LauncherError::io(dest, e))?;
        }
        tokio::fs::rename(&tmp, dest)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;
        Ok(())
    }

    async fn stream_to(
        &self,
        source: &DownloadSource,
        tmp: &Path,
        expect: &Integrity,
    ) -> LauncherResult<()> {
        let response = self
            .client
            .get(&source.url)
            .headers(source.headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: source.url.clone(),
                status: status.as_u16(),
            });
        }

        let mut hasher = Hasher::for_checksum(expect.checksum.as_ref());
        let mut written: u64 = 0;
        {
            let mut file = tokio::fs::File::create(tmp)
                .await
                .map_err(|e| LauncherError::io(tmp, e))?;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                hasher.update(&chunk);
                written += chunk.len() as u64;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| LauncherError::io(tmp, e))?;
            }
            file.flush().await.map_err(|e| LauncherError::io(tmp, e))?;
            file.sync_all().await.map_err(|e| LauncherError::io(tmp, e))?;
            // handle dropped before rename, required on Windows
        }

        if expect.size > 0 && written != expect.size {
            return Err(LauncherError::SizeMismatch {
                path: tmp.to_path_buf(),
                expected: expect.size,
                actual: written,
            });
        }

        if let (Some(expected), Some(actual)) = (expect.checksum.as_ref(), hasher.finish()) {
            if actual != expected.expected() {
                return Err(LauncherError::ChecksumMismatch {
                    path: tmp.to_path_buf(),
                    expected: expected.expected().to_string(),
                    actual,
                });
            }
        }

        Ok(())
    }

    // ── Validation ──────────────────────────────────────

    /// Whether `path` exists and satisfies every declared expectation.
    pub async fn is_valid(path: &Path, expect: &Integrity) -> bool {
        let Ok(meta) = tokio::fs::metadata(path).await else {
            return false;
        };
        if !meta.is_file() {
            return false;
        }
        if expect.size > 0 && meta.len() != expect.size {
            return false;
        }
        match expect.checksum.as_ref() {
            None => true,
            Some(checksum) => match hash_file(path, checksum).await {
                Ok(actual) => actual == checksum.expected(),
                Err(_) => false,
            },
        }
    }
}

async fn hash_file(path: &Path, checksum: &Checksum) -> LauncherResult<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    let mut hasher = Hasher::for_checksum(Some(checksum));
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finish().unwrap_or_default())
}

fn temp_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{sha1_hex, sha256_hex, StubServer};
    use std::time::Duration;

    fn downloader() -> Downloader {
        Downloader::new(Client::new()).with_policy(RetryPolicy::new(3, Duration::from_millis(5)))
    }

    #[tokio::test]
    async fn second_call_is_served_from_disk() {
        let server = StubServer::start().await;
        server.route("/lib.jar", 200, b"library bytes".to_vec());
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("libs/lib.jar");
        let expect = Integrity::sha256(13, &sha256_hex(b"library bytes"));
        let cancel = CancellationToken::new();
        let source = DownloadSource::new(server.url("/lib.jar"));

        let d = downloader();
        assert_eq!(d.ensure_file(&source, &dest, &expect, &cancel).await.unwrap(), 1);
        let modified = std::fs::metadata(&dest).unwrap().modified().unwrap();

        assert_eq!(d.ensure_file(&source, &dest, &expect, &cancel).await.unwrap(), 0);
        assert_eq!(server.hit_count("/lib.jar"), 1);
        assert_eq!(std::fs::read(&dest).unwrap(), b"library bytes");
        assert_eq!(std::fs::metadata(&dest).unwrap().modified().unwrap(), modified);
    }

    #[tokio::test]
    async fn two_server_errors_then_success() {
        let server = StubServer::start().await;
        server.route("/flaky", 503, b"busy".to_vec());
        server.route("/flaky", 503, b"busy".to_vec());
        server.route("/flaky", 200, b"ok".to_vec());
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("flaky.bin");

        let requests = downloader()
            .ensure_file(
                &DownloadSource::new(server.url("/flaky")),
                &dest,
                &Integrity::none(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(requests, 3);
        assert_eq!(std::fs::read(&dest).unwrap(), b"ok");
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let server = StubServer::start().await;
        server.route("/missing", 404, b"nope".to_vec());
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.bin");

        let err = downloader()
            .ensure_file(
                &DownloadSource::new(server.url("/missing")),
                &dest,
                &Integrity::none(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::DownloadFailed { status: 404, .. }));
        assert_eq!(server.hit_count("/missing"), 1);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn checksum_mismatch_leaves_destination_untouched() {
        let server = StubServer::start().await;
        server.route("/asset", 200, b"tampered".to_vec());
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("asset");
        std::fs::write(&dest, b"previous").unwrap();

        let err = downloader()
            .ensure_file(
                &DownloadSource::new(server.url("/asset")),
                &dest,
                &Integrity::sha1(0, &sha1_hex(b"expected")),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::ChecksumMismatch { .. }));
        assert_eq!(server.hit_count("/asset"), 1);
        assert_eq!(std::fs::read(&dest).unwrap(), b"previous");
        assert!(!temp_path(&dest).exists());
    }

    #[tokio::test]
    async fn stale_file_is_replaced() {
        let server = StubServer::start().await;
        server.route("/mod.jar", 200, b"new".to_vec());
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("mod.jar");
        std::fs::write(&dest, b"old-content").unwrap();

        let expect = Integrity::sha256(3, &sha256_hex(b"new"));
        downloader()
            .ensure_file(
                &DownloadSource::new(server.url("/mod.jar")),
                &dest,
                &expect,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }

    #[tokio::test]
    async fn cancelled_before_start_issues_no_request() {
        let server = StubServer::start().await;
        server.route("/x", 200, b"x".to_vec());
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = downloader()
            .ensure_file(
                &DownloadSource::new(server.url("/x")),
                &dir.path().join("x"),
                &Integrity::none(),
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::Cancelled));
        assert!(server.hits().is_empty());
    }

    #[test]
    fn empty_hash_means_unchecked() {
        assert_eq!(Integrity::sha256(10, "").checksum, None);
        assert_eq!(
            Integrity::sha1(0, "ABCD").checksum,
            Some(Checksum::Sha1("abcd".into()))
        );
    }
}
