//! Common test utilities for manuscript-dl E2E tests

use manuscript_dl::{ChallengeApiConfig, Config, PortalConfig};

/// Check whether the live-portal environment variables are present
pub fn has_live_portal() -> bool {
    dotenvy::dotenv().ok();
    std::env::var("PORTAL_BASE_URL").is_ok()
        && std::env::var("PORTAL_EMAIL").is_ok()
        && std::env::var("PORTAL_PASSWORD").is_ok()
}

/// Build a [`Config`] from environment variables.
///
/// Required:
/// - `PORTAL_BASE_URL` - Portal base URL
/// - `PORTAL_EMAIL` - Login email
/// - `PORTAL_PASSWORD` - Login password
///
/// Optional:
/// - `WEBDRIVER_URL` - WebDriver endpoint (default: http://localhost:4444)
/// - `CHALLENGE_ENDPOINT` - Cipher-challenge API URL
/// - `DOWNLOAD_DIR` - Browser download directory (default: ./downloads)
pub fn load_live_config() -> Config {
    dotenvy::dotenv().ok();

    let mut portal = PortalConfig {
        base_url: std::env::var("PORTAL_BASE_URL").unwrap_or_default(),
        login_email: std::env::var("PORTAL_EMAIL").unwrap_or_default(),
        login_password: std::env::var("PORTAL_PASSWORD").unwrap_or_default(),
        ..PortalConfig::default()
    };
    if let Ok(url) = std::env::var("WEBDRIVER_URL") {
        portal.webdriver_url = url;
    }
    if let Ok(dir) = std::env::var("DOWNLOAD_DIR") {
        portal.download_dir = dir.into();
    }

    let mut challenge_api = ChallengeApiConfig::default();
    if let Ok(endpoint) = std::env::var("CHALLENGE_ENDPOINT") {
        challenge_api.endpoint = endpoint;
    }

    Config {
        portal,
        challenge_api,
        ..Config::default()
    }
}
