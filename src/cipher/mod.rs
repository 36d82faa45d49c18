//! Cipher-challenge handling: challenge payloads, password decoding, and the
//! HTTP client that fetches challenges from the portal's backend.
//!
//! The decode path is pure and synchronous; only [`ChallengeClient`] performs
//! I/O, so the algorithm is unit-testable without any network or browser.

mod challenge;
mod client;

pub use challenge::{Challenge, decode_password, vault_lookup};
pub use client::ChallengeClient;
