//! Fingerprint extraction from raw certificate log lines.
//!
//! Only the `data.leaf_cert.fingerprint` path is materialized. Every other
//! field is skipped by serde without being allocated, and the raw line is
//! never re-serialized.

use crate::error::ExtractError;
use serde::Deserialize;
use serde_json::error::Category;

/// Logical path of the deduplication key inside each record.
pub const FINGERPRINT_PATH: &str = "data.leaf_cert.fingerprint";

#[derive(Deserialize)]
struct Envelope {
    data: Option<Data>,
}

#[derive(Deserialize)]
struct Data {
    leaf_cert: Option<LeafCert>,
}

#[derive(Deserialize)]
struct LeafCert {
    fingerprint: Option<String>,
}

/// Extract the certificate fingerprint from one JSON line.
///
/// Trailing whitespace (including the line terminator) is accepted.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidJson`] if the line is not JSON,
/// [`ExtractError::MissingField`] if any step of the path is absent or null,
/// and [`ExtractError::WrongType`] if a value on the path has the wrong type.
pub fn extract_fingerprint(line: &[u8]) -> Result<String, ExtractError> {
    let envelope: Envelope = serde_json::from_slice(line).map_err(|e| match e.classify() {
        Category::Data => ExtractError::WrongType(e.to_string()),
        Category::Io | Category::Syntax | Category::Eof => ExtractError::InvalidJson(e.to_string()),
    })?;

    envelope
        .data
        .and_then(|data| data.leaf_cert)
        .and_then(|leaf| leaf.fingerprint)
        .ok_or(ExtractError::MissingField {
            path: FINGERPRINT_PATH,
        })
}
