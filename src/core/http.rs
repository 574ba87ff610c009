use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::core::downloader::DownloadSource;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::retry::{with_retry, RetryPolicy};

const APP_USER_AGENT: &str = concat!("Keystone/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .default_headers(default_headers)
        .build()
}

/// GET a small text document with retry. Non-2xx statuses surface as
/// `DownloadFailed` so 4xx responses stop the retry loop.
pub async fn fetch_text(
    client: &Client,
    source: &DownloadSource,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> LauncherResult<String> {
    with_retry(policy, cancel, |_| async move {
        let request = client.get(&source.url).headers(source.headers.clone());
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(LauncherError::Cancelled),
            response = request.send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: source.url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    })
    .await
}

/// Like [`fetch_text`], then parse as JSON. Returns the raw body too.
pub async fn fetch_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    source: &DownloadSource,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> LauncherResult<(T, String)> {
    let raw = fetch_text(client, source, policy, cancel).await?;
    let parsed = serde_json::from_str(&raw)?;
    Ok((parsed, raw))
}
