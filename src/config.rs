//! Configuration types for manuscript-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Portal access configuration (base URL, credentials, WebDriver endpoint)
///
/// Groups settings for reaching and logging into the manuscripts portal.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the portal (default: "http://localhost:3000")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Login email filled into the portal login form
    #[serde(default)]
    pub login_email: String,

    /// Login password filled into the portal login form
    #[serde(default)]
    pub login_password: String,

    /// WebDriver endpoint to connect the browser session to
    /// (default: "http://localhost:4444")
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Directory the browser saves downloads to (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum time to wait for an element to appear (default: 10 seconds)
    #[serde(default = "default_element_timeout", with = "duration_serde")]
    pub element_timeout: Duration,

    /// Maximum time to wait for a triggered download to land on disk
    /// (default: 30 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_email: String::new(),
            login_password: String::new(),
            webdriver_url: default_webdriver_url(),
            download_dir: default_download_dir(),
            element_timeout: default_element_timeout(),
            download_timeout: default_download_timeout(),
        }
    }
}

/// Cipher-challenge API configuration
///
/// The API issues a [`Challenge`](crate::cipher::Challenge) for a book title
/// and the previous stage's unlock code. Used as a nested sub-config within
/// [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChallengeApiConfig {
    /// Full URL of the cipher-challenge endpoint
    #[serde(default = "default_challenge_endpoint")]
    pub endpoint: String,

    /// Request timeout for challenge fetches (default: 30 seconds)
    #[serde(default = "default_api_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for ChallengeApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_challenge_endpoint(),
            timeout: default_api_timeout(),
        }
    }
}

/// Retry configuration for the download-and-extract loop
///
/// The portal's PDF generation intermittently fails (upstream rate-limiting
/// and UI timing races), so each download is attempted up to `max_attempts`
/// times with a flat `retry_delay` between attempts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadRetryConfig {
    /// Maximum number of download attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Flat delay between attempts; no delay after the final attempt
    /// (default: 15 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub retry_delay: Duration,

    /// Settle delay after a download completes, before checking the portal's
    /// error banner (default: 1 second)
    #[serde(default = "default_settle_delay", with = "duration_serde")]
    pub settle_delay: Duration,

    /// Add random jitter to the inter-attempt delay (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for DownloadRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: default_retry_delay(),
            settle_delay: default_settle_delay(),
            jitter: false,
        }
    }
}

/// Top-level configuration for manuscript-dl
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Portal access settings
    #[serde(default)]
    pub portal: PortalConfig,

    /// Cipher-challenge API settings
    #[serde(default)]
    pub challenge_api: ChallengeApiConfig,

    /// Download retry settings
    #[serde(default)]
    pub retry: DownloadRetryConfig,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_element_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_challenge_endpoint() -> String {
    "http://localhost:8000/api/cipher/challenge".to_string()
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(15)
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(1)
}

// Duration serialization helper (serialized as whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.retry_delay, Duration::from_secs(15));
        assert_eq!(config.retry.settle_delay, Duration::from_secs(1));
        assert!(!config.retry.jitter);
        assert_eq!(config.portal.element_timeout, Duration::from_secs(10));
        assert_eq!(config.portal.download_dir, PathBuf::from("./downloads"));
    }

    #[test]
    fn test_retry_config_round_trip() {
        let config = DownloadRetryConfig {
            max_attempts: 3,
            retry_delay: Duration::from_secs(7),
            settle_delay: Duration::from_secs(2),
            jitter: true,
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: DownloadRetryConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.max_attempts, 3);
        assert_eq!(parsed.retry_delay, Duration::from_secs(7));
        assert_eq!(parsed.settle_delay, Duration::from_secs(2));
        assert!(parsed.jitter);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(
            config.challenge_api.endpoint,
            "http://localhost:8000/api/cipher/challenge"
        );
    }

    #[test]
    fn test_partial_portal_config() {
        let json = r#"{
            "portal": {
                "base_url": "https://portal.example.com",
                "login_email": "monje@example.com"
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.portal.base_url, "https://portal.example.com");
        assert_eq!(config.portal.login_email, "monje@example.com");
        // Unspecified fields fall back to defaults
        assert_eq!(config.portal.webdriver_url, "http://localhost:4444");
        assert_eq!(config.portal.download_timeout, Duration::from_secs(30));
    }
}
