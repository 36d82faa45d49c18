//! # manuscript-dl
//!
//! Browser-driven automation library for the manuscripts portal's
//! multi-stage "unlock manuscripts" flow.
//!
//! The portal presents century-labeled manuscript cards behind a chain of
//! unlock codes: each stage's PDF embeds the access code that unlocks the
//! next stage. This crate drives that chain end to end: filter by century,
//! verify the card's lock state, unlock (with a literal code or by decoding
//! a cipher challenge fetched from the backend), download the generated
//! PDF, and extract the embedded access code to feed the next stage.
//!
//! ## Design Philosophy
//!
//! - **Algorithms apart from UI** - password decoding and PDF code
//!   extraction are pure/synchronous and testable without a browser
//! - **Explicit control flow** - downloads run an explicit attempt state
//!   machine; the stage chain threads a `Continue`/`Skip` baton instead of
//!   ambient flags
//! - **Resilient by default** - downloads retry with a flat backoff against
//!   the portal's rate limiter; exhaustion skips forward instead of crashing
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use manuscript_dl::{ChallengeClient, Config, Stage, UnlockFlowDriver, WebdriverPortal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!
//!     let mut portal = WebdriverPortal::connect(config.portal.clone()).await?;
//!     portal.login().await?;
//!
//!     let client = ChallengeClient::new(&config.challenge_api)?;
//!     let mut flow = UnlockFlowDriver::new(portal, client, config.retry.clone());
//!
//!     for report in flow.run(&Stage::default_chain()).await {
//!         println!("Siglo {}: {:?}", report.century, report.outcome);
//!     }
//!
//!     flow.into_portal().close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Cipher challenges and password decoding
pub mod cipher;
/// Configuration types
pub mod config;
/// Download orchestration and retry
pub mod download;
/// Error types
pub mod error;
/// Access-code extraction from downloaded PDFs
pub mod extract;
/// Stage pipeline sequencing
pub mod flow;
/// Portal UI contract and WebDriver implementation
pub mod portal;

pub use cipher::{Challenge, ChallengeClient, decode_password, vault_lookup};
pub use config::{ChallengeApiConfig, Config, DownloadRetryConfig, PortalConfig};
pub use download::{DownloadDriver, DownloadHandle, DownloadOrchestrator};
pub use error::{Error, Result};
pub use extract::{extract_access_code, find_access_code};
pub use flow::{Stage, StageOutcome, StageReport, UnlockFlowDriver, UnlockMethod};
pub use portal::{ManuscriptPortal, WebdriverPortal};
