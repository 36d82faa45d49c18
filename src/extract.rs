//! Access-code extraction from downloaded manuscript PDFs
//!
//! Generated PDFs embed a line matching, case-insensitively, `acceso:`
//! followed by an alphanumeric code. PDF generation upstream is unreliable
//! (truncated files, parser-hostile output), so extraction runs an ordered
//! list of independent text-acquisition strategies and only reports
//! "not found" once every strategy has been exhausted:
//!
//! 1. Parse the bytes as a structured PDF and search the extracted text
//! 2. Re-read the file from disk and search its raw bytes as UTF-8 text
//! 3. Repeat strategy 1 (covers transient parser nondeterminism)
//! 4. Search the in-memory buffer decoded as UTF-8 text
//!
//! The downloaded file is owned exclusively by the extraction attempt and is
//! deleted exactly once per attempt, on success and on failure alike.

use crate::error::{Error, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Sanctioned embedding format for the access code.
// Fixed literal pattern, cannot fail to compile.
#[allow(clippy::expect_used)]
static ACCESS_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)acceso:\s*([A-Z0-9]+)").expect("valid pattern"));

type StrategyFn = fn(&[u8], &Path) -> Result<String>;

/// Text-acquisition strategies in mandated order. Each is independent of
/// prior failures; all are searched with the same pattern.
const STRATEGIES: [(&str, StrategyFn); 4] = [
    ("parsed document text", parsed_document_text),
    ("raw file text", raw_file_text),
    ("reparsed document text", parsed_document_text),
    ("raw buffer text", raw_buffer_text),
];

/// Search `text` for the access-code pattern.
///
/// Returns the first capture group verbatim; matching is case-insensitive
/// but the captured substring keeps its source casing.
pub fn find_access_code(text: &str) -> Option<String> {
    ACCESS_CODE_RE
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Extract the access code from a downloaded PDF.
///
/// `bytes` is the file content already in memory; `path` is where the
/// download landed on disk (strategy 2 re-reads it). Tries each strategy in
/// order and fails with [`Error::CodeNotFound`] only after all four are
/// exhausted. The file at `path` is deleted exactly once before returning,
/// on every exit; a deletion failure is logged and never overrides the
/// primary result.
pub fn extract_access_code(bytes: &[u8], path: &Path) -> Result<String> {
    let result = run_strategies(bytes, path);

    // Single cleanup path reachable from every exit point
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to clean up downloaded file"
        );
    } else {
        tracing::debug!(path = %path.display(), "Downloaded file cleaned up");
    }

    result
}

fn run_strategies(bytes: &[u8], path: &Path) -> Result<String> {
    for (name, strategy) in STRATEGIES {
        match strategy(bytes, path) {
            Ok(text) => {
                if let Some(code) = find_access_code(&text) {
                    tracing::info!(strategy = name, code = %code, "Access code extracted");
                    return Ok(code);
                }
                tracing::warn!(
                    strategy = name,
                    "Access code not found in text, trying next strategy"
                );
            }
            Err(e) => {
                tracing::warn!(
                    strategy = name,
                    error = %e,
                    "Extraction strategy failed, trying next strategy"
                );
            }
        }
    }

    Err(Error::CodeNotFound {
        path: path.to_path_buf(),
    })
}

/// Strategy 1/3: structured PDF parse of the in-memory bytes
fn parsed_document_text(bytes: &[u8], _path: &Path) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::Io(std::io::Error::other(format!("PDF parse failed: {}", e))))
}

/// Strategy 2: raw file bytes re-read from disk, decoded as UTF-8
fn raw_file_text(_bytes: &[u8], path: &Path) -> Result<String> {
    let raw = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Strategy 4: the in-memory buffer decoded as UTF-8, no filesystem re-read
fn raw_buffer_text(bytes: &[u8], _path: &Path) -> Result<String> {
    Ok(String::from_utf8_lossy(bytes).into_owned())
}
