// ─── Retry & Origin Fallback ───
// Shared policy used by the downloader, the manifest client and the loader
// installers: retry one origin with linear backoff, or walk an ordered list
// of origins until one succeeds.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Delay before attempt `n + 1` is `n * backoff_step`.
    pub backoff_step: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, backoff_step: Duration) -> Self {
        Self {
            attempts,
            backoff_step,
        }
    }

    /// Policy for artifact downloads: 3 attempts, `attempt × 1s`.
    pub const fn downloads() -> Self {
        Self::new(3, Duration::from_secs(1))
    }

    /// Policy for the desired-state manifest: 3 attempts, short backoff.
    pub const fn manifest() -> Self {
        Self::new(3, Duration::from_millis(250))
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::downloads()
    }
}

/// Fail fast when the caller already gave up.
pub fn check_cancelled(cancel: &CancellationToken) -> LauncherResult<()> {
    if cancel.is_cancelled() {
        return Err(LauncherError::Cancelled);
    }
    Ok(())
}

/// Run `op` until it succeeds, a non-retryable error occurs, or the policy
/// runs out of attempts. `op` receives the 1-based attempt number.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> LauncherResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = LauncherResult<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        check_cancelled(cancel)?;

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                debug!("Attempt {}/{} failed: {}", attempt, attempts, err);
                last_error = Some(err);
            }
        }

        if attempt < attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(LauncherError::Cancelled),
                _ = tokio::time::sleep(policy.delay_after(attempt)) => {}
            }
        }
    }

    Err(last_error.unwrap_or_else(|| LauncherError::Other("retry loop ran zero attempts".into())))
}

/// Try each origin in order and return the first success.
///
/// Cancellation aborts the walk; any other failure moves on to the next
/// origin. When every origin fails the last error is returned.
pub async fn first_success<O, T, F, Fut>(origins: &[O], mut op: F) -> LauncherResult<T>
where
    O: std::fmt::Display,
    F: FnMut(&O) -> Fut,
    Fut: Future<Output = LauncherResult<T>>,
{
    let mut last_error = None;

    for (index, origin) in origins.iter().enumerate() {
        match op(origin).await {
            Ok(value) => {
                if index > 0 {
                    debug!("Origin {}/{} succeeded: {}", index + 1, origins.len(), origin);
                }
                return Ok(value);
            }
            Err(LauncherError::Cancelled) => return Err(LauncherError::Cancelled),
            Err(err) => {
                warn!(
                    "Origin {}/{} failed ({}): {}",
                    index + 1,
                    origins.len(),
                    origin,
                    err
                );
                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| LauncherError::Other("no origins configured".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    fn status(code: u16) -> LauncherError {
        LauncherError::DownloadFailed {
            url: "http://stub/x".into(),
            status: code,
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = with_retry(fast(), &cancel, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(status(503))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_client_error() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: LauncherResult<()> = with_retry(fast(), &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(status(404)) }
        })
        .await;

        assert!(matches!(
            result,
            Err(LauncherError::DownloadFailed { status: 404, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);

        let result: LauncherResult<()> = with_retry(fast(), &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

        assert!(matches!(result, Err(LauncherError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_success_walks_origins_in_order() {
        let origins = ["a", "b", "c"];
        let mut seen = Vec::new();

        let result = first_success(&origins, |origin| {
            seen.push(origin.to_string());
            let origin = origin.to_string();
            async move {
                if origin == "b" {
                    Ok(origin)
                } else {
                    Err(status(500))
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "b");
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn first_success_surfaces_last_error() {
        let origins = ["a", "b"];
        let result: LauncherResult<()> = first_success(&origins, |origin| {
            let code = if *origin == "a" { 500 } else { 404 };
            async move { Err(status(code)) }
        })
        .await;

        assert!(matches!(
            result,
            Err(LauncherError::DownloadFailed { status: 404, .. })
        ));
    }
}
