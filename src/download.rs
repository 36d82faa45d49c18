//! Download orchestration: trigger, wait, banner check, extract, retry
//!
//! The portal's PDF generation intermittently fails with rate-limit errors
//! (HTTP 429 upstream) and UI timing races, so a download is never trusted
//! on the first try. Each attempt walks an explicit state machine and any
//! attempt failure is retried after a flat delay, up to a bounded number of
//! attempts. Exhaustion is not an error: the caller receives `None` and
//! applies its own skip policy.

use crate::config::DownloadRetryConfig;
use crate::error::{Error, Result};
use crate::extract::extract_access_code;
use async_trait::async_trait;
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;

/// A completed download, handed over by the driver
///
/// Ownership of the file is exclusive to the extraction attempt that
/// receives the handle; the extractor deletes it before the attempt's
/// result is returned.
#[derive(Debug)]
pub struct DownloadHandle {
    /// Where the download landed on disk
    pub path: PathBuf,
}

/// Abstraction over triggering a portal download, enabling testability.
///
/// `trigger_download` performs the UI action that starts the download and
/// waits, bounded, for the file to land on disk; a wait timeout is an
/// attempt failure, not a separate state.
#[async_trait]
pub trait DownloadDriver: Send {
    /// Click the download action and wait for the completed file
    async fn trigger_download(&mut self) -> Result<DownloadHandle>;

    /// Whether the portal's in-page download error banner is visible
    async fn error_banner_visible(&mut self) -> Result<bool>;
}

/// One attempt's position in the download state machine
enum AttemptState {
    /// Invoke the UI action that starts the download (the bounded
    /// download-completion wait is folded into the driver call)
    Triggering,
    /// Settle, then inspect the in-page error indicator
    CheckingErrorBanner(DownloadHandle),
    /// Run the access-code extractor on the completed download
    Extracting(DownloadHandle),
}

/// Coordinates download attempts and retries for one manuscript
pub struct DownloadOrchestrator {
    retry: DownloadRetryConfig,
}

impl DownloadOrchestrator {
    /// Create an orchestrator with the given retry settings
    pub fn new(retry: DownloadRetryConfig) -> Self {
        Self { retry }
    }

    /// Download the manuscript PDF and extract its access code.
    ///
    /// Runs up to `max_attempts` attempts with a flat `retry_delay` between
    /// them (none after the final attempt). Returns `Some(code)` on the
    /// first successful attempt; `None` once all attempts are exhausted or
    /// an attempt fails with a non-transient error.
    pub async fn download_and_extract<D>(&self, driver: &mut D) -> Option<String>
    where
        D: DownloadDriver + ?Sized,
    {
        for attempt in 1..=self.retry.max_attempts {
            tracing::info!(
                attempt = attempt,
                max_attempts = self.retry.max_attempts,
                "Starting download attempt"
            );

            match self.attempt(driver).await {
                Ok(code) => {
                    if attempt > 1 {
                        tracing::info!(attempts = attempt, "Download succeeded after retry");
                    }
                    return Some(code);
                }
                Err(e) if e.is_attempt_failure() => {
                    tracing::warn!(
                        attempt = attempt,
                        error = %e,
                        "Download attempt failed"
                    );

                    if attempt < self.retry.max_attempts {
                        let delay = if self.retry.jitter {
                            add_jitter(self.retry.retry_delay)
                        } else {
                            self.retry.retry_delay
                        };
                        tracing::info!(delay_ms = delay.as_millis(), "Waiting before retry");
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        attempt = attempt,
                        error = %e,
                        "Download attempt failed with non-transient error, giving up"
                    );
                    return None;
                }
            }
        }

        tracing::error!(
            max_attempts = self.retry.max_attempts,
            "All download attempts failed"
        );
        None
    }

    /// Run one attempt through the state machine
    async fn attempt<D>(&self, driver: &mut D) -> Result<String>
    where
        D: DownloadDriver + ?Sized,
    {
        let mut state = AttemptState::Triggering;

        loop {
            state = match state {
                AttemptState::Triggering => {
                    let handle = driver.trigger_download().await?;
                    AttemptState::CheckingErrorBanner(handle)
                }
                AttemptState::CheckingErrorBanner(handle) => {
                    // Give the page a moment to surface the failure banner
                    tokio::time::sleep(self.retry.settle_delay).await;

                    if driver.error_banner_visible().await? {
                        return Err(Error::DownloadUi(
                            "error banner visible after download".to_string(),
                        ));
                    }
                    AttemptState::Extracting(handle)
                }
                AttemptState::Extracting(handle) => {
                    let bytes = tokio::fs::read(&handle.path).await?;
                    return extract_access_code(&bytes, &handle.path);
                }
            };
        }
    }
}

/// Add random jitter to a delay: uniformly between `delay` and `2 * delay`,
/// dispersing retries against the upstream rate limiter.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
