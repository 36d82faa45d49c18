//! fantoccini-backed implementation of the portal UI contract

use crate::config::PortalConfig;
use crate::download::DownloadHandle;
use crate::error::{Error, Result};
use crate::portal::{ManuscriptPortal, selectors};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Drives the manuscripts portal through a WebDriver session.
///
/// Connect with [`WebdriverPortal::connect`], then [`login`](Self::login)
/// once before driving stages. The browser profile must be configured to
/// save PDFs into `config.download_dir` without a save dialog.
pub struct WebdriverPortal {
    client: Client,
    config: PortalConfig,
}

impl WebdriverPortal {
    /// Establish a WebDriver session against the configured endpoint
    pub async fn connect(config: PortalConfig) -> Result<Self> {
        let client = ClientBuilder::native()
            .connect(&config.webdriver_url)
            .await?;
        Ok(Self { client, config })
    }

    /// Log into the portal with the configured credentials.
    ///
    /// Fails with a portal error if the browser is still on the login page
    /// after submitting the form.
    pub async fn login(&mut self) -> Result<()> {
        tracing::info!("Starting login process");

        self.client
            .goto(&format!("{}/login", self.config.base_url))
            .await?;

        let email = self
            .wait_for(Locator::Css(r#"input[type="email"]"#))
            .await?;
        email.send_keys(&self.config.login_email).await?;

        let password = self.client.find(Locator::Css(r#"input[type="password"]"#)).await?;
        password.send_keys(&self.config.login_password).await?;

        let submit = self.client.find(Locator::Css(r#"button[type="submit"]"#)).await?;
        submit.click().await?;

        // Give the post-login redirect time to complete
        tokio::time::sleep(Duration::from_secs(3)).await;

        let url = self.client.current_url().await?;
        if url.path().contains("/login") {
            return Err(Error::Portal("login failed, still on login page".to_string()));
        }

        tracing::info!("Login successful");
        Ok(())
    }

    /// Close the browser session
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }

    async fn wait_for(&self, locator: Locator<'_>) -> Result<Element> {
        Ok(self
            .client
            .wait()
            .at_most(self.config.element_timeout)
            .for_element(locator)
            .await?)
    }

    async fn wait_for_xpath(&self, xpath: &str) -> Result<Element> {
        self.wait_for(Locator::XPath(xpath)).await
    }

    /// Fire the input/change events the portal's form validation listens on.
    /// `send_keys` alone does not always trigger framework-bound handlers.
    async fn dispatch_input_events(&self, element: &Element) -> Result<()> {
        let arg = serde_json::to_value(element)?;
        self.client
            .execute(
                "arguments[0].dispatchEvent(new Event('input', { bubbles: true })); \
                 arguments[0].dispatchEvent(new Event('change', { bubbles: true }));",
                vec![arg],
            )
            .await?;
        Ok(())
    }

    /// Close a modal via its aria-labeled close button
    async fn close_modal(&self) -> Result<()> {
        let close = self.wait_for(Locator::Css(selectors::MODAL_CLOSE)).await?;
        close.click().await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(())
    }

    /// Wait for a fresh, fully written PDF to appear in the download
    /// directory. `before` is the directory snapshot taken prior to the
    /// click; a temp-suffixed file (`.crdownload`, `.part`) means the
    /// download is still in flight.
    async fn wait_for_download(&self, before: &HashSet<PathBuf>) -> Result<PathBuf> {
        let deadline = tokio::time::Instant::now() + self.config.download_timeout;

        loop {
            if let Some(path) = find_new_pdf(&self.config.download_dir, before)? {
                return Ok(path);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::DownloadTimeout(self.config.download_timeout));
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

#[async_trait]
impl ManuscriptPortal for WebdriverPortal {
    async fn filter_by_century(&mut self, century: &str) -> Result<()> {
        tracing::info!(century = century, "Filtering manuscripts by century");

        // Confirm the portal page rendered before touching the filter
        self.wait_for(Locator::Css(selectors::PAGE_TITLE)).await?;

        let filter = self.wait_for_xpath(selectors::CENTURY_FILTER).await?;
        filter.select_by_value(century).await?;

        // Let the filtered list re-render
        tokio::time::sleep(Duration::from_secs(2)).await;

        tracing::info!(century = century, "Century filter applied");
        Ok(())
    }

    async fn verify_locked(&mut self, century: &str, expect_documentation: bool) -> Result<()> {
        tracing::info!(century = century, "Verifying locked manuscript");

        self.wait_for_xpath(&selectors::card(century)).await?;

        if expect_documentation {
            let docs = self
                .wait_for_xpath(&selectors::documentation_button(century))
                .await?;
            docs.click().await?;
            tokio::time::sleep(Duration::from_secs(1)).await;
            self.close_modal().await?;
        }

        self.wait_for_xpath(&selectors::code_input(century)).await?;
        self.wait_for_xpath(&selectors::unlock_button(century)).await?;
        self.wait_for_xpath(&selectors::help_text(century)).await?;

        tracing::info!(century = century, "Locked manuscript verified");
        Ok(())
    }

    async fn verify_unlocked(&mut self, century: &str) -> Result<()> {
        tracing::info!(century = century, "Verifying unlocked manuscript");

        self.wait_for_xpath(&selectors::card(century)).await?;
        self.wait_for_xpath(&selectors::unlocked_status(century)).await?;
        self.wait_for_xpath(&selectors::download_button(century)).await?;

        tracing::info!(century = century, "Unlocked manuscript verified");
        Ok(())
    }

    async fn unlock_with_code(&mut self, century: &str, code: &str, used_api: bool) -> Result<()> {
        tracing::info!(century = century, "Unlocking manuscript");

        let input = self.wait_for_xpath(&selectors::code_input(century)).await?;
        input.clear().await?;
        input.send_keys(code).await?;
        self.dispatch_input_events(&input).await?;

        // Let the form validation enable the button
        tokio::time::sleep(Duration::from_secs(1)).await;

        let unlock = self.wait_for_xpath(&selectors::unlock_button(century)).await?;
        let deadline = tokio::time::Instant::now() + self.config.element_timeout;
        while !unlock.is_enabled().await? {
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Portal(format!(
                    "unlock button never became enabled for Siglo {}",
                    century
                )));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        unlock.click().await?;

        // Let the unlock round-trip complete
        tokio::time::sleep(Duration::from_secs(3)).await;

        if used_api {
            // API unlocks are confirmed with a modal that blocks the card
            self.close_modal().await?;
        }

        self.wait_for_xpath(&selectors::unlocked_status(century)).await?;
        self.wait_for_xpath(&selectors::download_button(century)).await?;

        tracing::info!(century = century, "Manuscript unlocked");
        Ok(())
    }

    async fn book_title(&mut self, century: &str) -> Result<String> {
        let title = self.wait_for_xpath(&selectors::book_title(century)).await?;
        let text = title.text().await?;
        let text = text.trim();

        if text.is_empty() {
            Ok(format!("Manuscrito del Siglo {}", century))
        } else {
            Ok(text.to_string())
        }
    }

    async fn trigger_download(&mut self, century: &str) -> Result<DownloadHandle> {
        tracing::info!(century = century, "Triggering PDF download");

        std::fs::create_dir_all(&self.config.download_dir)?;
        let before = snapshot_dir(&self.config.download_dir)?;

        // Only download when the card confirms it is unlocked
        self.wait_for_xpath(&selectors::unlocked_status(century)).await?;
        let button = self.wait_for_xpath(&selectors::download_button(century)).await?;
        button.click().await?;

        let path = self.wait_for_download(&before).await?;
        tracing::info!(path = %path.display(), "PDF download completed");

        Ok(DownloadHandle { path })
    }

    async fn download_error_banner_visible(&mut self) -> Result<bool> {
        match self.client.find(Locator::XPath(selectors::ERROR_BANNER)).await {
            Ok(banner) => Ok(banner.is_displayed().await?),
            Err(e) if e.is_no_such_element() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Snapshot the paths currently present in the download directory
fn snapshot_dir(dir: &Path) -> std::io::Result<HashSet<PathBuf>> {
    let mut paths = HashSet::new();
    for entry in std::fs::read_dir(dir)? {
        paths.insert(entry?.path());
    }
    Ok(paths)
}

/// Find a newly completed PDF in `dir` that was not in `before`.
///
/// Returns `None` while any in-flight browser temp file is present, so a
/// rename-on-completion download is never picked up half-written.
fn find_new_pdf(dir: &Path, before: &HashSet<PathBuf>) -> std::io::Result<Option<PathBuf>> {
    let mut candidate = None;

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("crdownload") | Some("part") | Some("tmp") => return Ok(None),
            Some("pdf") if !before.contains(&path) => candidate = Some(path),
            _ => {}
        }
    }

    Ok(candidate)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_new_pdf_ignores_preexisting() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("old.pdf");
        fs::write(&old, "x").unwrap();

        let before = snapshot_dir(dir.path()).unwrap();
        assert_eq!(find_new_pdf(dir.path(), &before).unwrap(), None);

        let fresh = dir.path().join("manuscrito.pdf");
        fs::write(&fresh, "y").unwrap();
        assert_eq!(find_new_pdf(dir.path(), &before).unwrap(), Some(fresh));
    }

    #[test]
    fn test_find_new_pdf_waits_out_in_flight_downloads() {
        let dir = TempDir::new().unwrap();
        let before = snapshot_dir(dir.path()).unwrap();

        fs::write(dir.path().join("manuscrito.pdf"), "y").unwrap();
        fs::write(dir.path().join("manuscrito.pdf.crdownload"), "").unwrap();

        // A temp file means the browser is still writing; report nothing yet
        assert_eq!(find_new_pdf(dir.path(), &before).unwrap(), None);

        fs::remove_file(dir.path().join("manuscrito.pdf.crdownload")).unwrap();
        assert!(find_new_pdf(dir.path(), &before).unwrap().is_some());
    }

    #[test]
    fn test_find_new_pdf_ignores_non_pdf_files() {
        let dir = TempDir::new().unwrap();
        let before = snapshot_dir(dir.path()).unwrap();

        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        assert_eq!(find_new_pdf(dir.path(), &before).unwrap(), None);
    }
}
