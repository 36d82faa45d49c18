//! HTTP client for the cipher-challenge API

use crate::cipher::challenge::{Challenge, decode_password};
use crate::config::ChallengeApiConfig;
use crate::error::{Error, Result};
use serde::Deserialize;

/// Wire shape of a successful challenge response
#[derive(Debug, Deserialize)]
struct ChallengeResponse {
    challenge: Challenge,
}

/// Client for the cipher-challenge endpoint
///
/// Fetches a [`Challenge`] for a book title and the previous stage's unlock
/// code, and can resolve it straight to a password via
/// [`unlock_code_for`](ChallengeClient::unlock_code_for).
#[derive(Debug)]
pub struct ChallengeClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ChallengeClient {
    /// Create a client for the configured endpoint.
    ///
    /// Fails with a configuration error if the endpoint is not a valid URL.
    pub fn new(config: &ChallengeApiConfig) -> Result<Self> {
        url::Url::parse(&config.endpoint).map_err(|e| Error::Config {
            message: format!("invalid challenge endpoint '{}': {}", config.endpoint, e),
            key: Some("challenge_api.endpoint".to_string()),
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Fetch the challenge for `book_title`, authorized by `unlock_code`.
    ///
    /// A non-2xx response surfaces as [`Error::ApiRequest`] carrying the
    /// HTTP status; a 2xx response whose body does not parse as a challenge
    /// surfaces as [`Error::Validation`].
    pub async fn fetch_challenge(&self, book_title: &str, unlock_code: &str) -> Result<Challenge> {
        tracing::info!(
            book_title = %book_title,
            "Fetching cipher challenge"
        );

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("bookTitle", book_title), ("unlockCode", unlock_code)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ApiRequest {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let body = response.text().await?;
        let parsed: ChallengeResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Validation(format!("malformed challenge payload: {}", e)))?;

        tracing::debug!(
            vault_len = parsed.challenge.vault.len(),
            targets_len = parsed.challenge.targets.len(),
            "Challenge received"
        );

        Ok(parsed.challenge)
    }

    /// Fetch the challenge for `book_title` and decode it into the unlock
    /// password for the next stage.
    pub async fn unlock_code_for(&self, book_title: &str, prior_code: &str) -> Result<String> {
        let challenge = self.fetch_challenge(book_title, prior_code).await?;
        let password = decode_password(&challenge);

        tracing::info!(
            book_title = %book_title,
            password_len = password.len(),
            "Password decoded from challenge"
        );

        Ok(password)
    }
}
