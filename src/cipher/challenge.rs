//! Challenge payload and password decoding

use serde::{Deserialize, Serialize};

/// A cipher challenge issued by the portal backend
///
/// Describes which vault positions to concatenate to form the unlock
/// password for a manuscript. `hint` and `book_title` are descriptive
/// metadata and play no part in decoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Ordered list of candidate substrings the password is assembled from
    pub vault: Vec<String>,

    /// 0-based positions into `vault`, in password order
    ///
    /// Signed because the backend contract does not rule out negative
    /// values; any out-of-range position resolves to nothing.
    pub targets: Vec<i64>,

    /// Human-readable hint attached to the challenge
    #[serde(default)]
    pub hint: String,

    /// Title of the book the challenge was issued for
    #[serde(rename = "bookTitle", default)]
    pub book_title: String,
}

/// Look up the vault entry at `target` by narrowing over the index space.
///
/// Returns `None` for any out-of-range target (negative or past the end)
/// rather than failing; the caller treats absence as an empty contribution.
///
/// Deliberately a binary search over indices instead of a direct index
/// read, preserving the backend's historical lookup contract. The vault is
/// tens of entries at most, so the difference is unobservable.
pub fn vault_lookup(vault: &[String], target: i64) -> Option<&str> {
    let mut left: i64 = 0;
    let mut right: i64 = vault.len() as i64 - 1;

    while left <= right {
        let mid = (left + right) / 2;
        if mid == target {
            return vault.get(mid as usize).map(String::as_str);
        } else if mid < target {
            left = mid + 1;
        } else {
            right = mid - 1;
        }
    }

    None
}

/// Decode the unlock password for a challenge.
///
/// Resolves each target position against the vault in order and
/// concatenates the results. Out-of-range targets contribute the empty
/// string (a gap, not an error). Pure and deterministic: calling this twice
/// on the same challenge always yields the same password.
pub fn decode_password(challenge: &Challenge) -> String {
    challenge
        .targets
        .iter()
        .map(|&target| vault_lookup(&challenge.vault, target).unwrap_or(""))
        .collect()
}
