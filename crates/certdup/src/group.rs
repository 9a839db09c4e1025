//! Byte-level layout of a duplicate group line.
//!
//! A group is written as
//!
//! ```text
//! {"fingerprint": "<fp>", "certificates": [<record>,<record>,...]}\n
//! ```
//!
//! Records are copied verbatim from the input with only trailing whitespace
//! removed. The line always ends in [`CLOSING_SENTINEL`], which appends
//! overwrite in place.

use crate::error::Result;
use serde::Deserialize;
use serde_json::value::RawValue;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Separator written between two records of the same group.
pub const RECORD_SEPARATOR: &[u8] = b",";

/// Trailing bytes of every group: end of array, end of object, newline.
///
/// Appending seeks back exactly `CLOSING_SENTINEL.len()` bytes from the end
/// of a group file. Changing these bytes changes that distance.
pub const CLOSING_SENTINEL: &[u8; 3] = b"]}\n";

/// Opening bytes of a group, up to and including the `[` of the array.
#[must_use]
pub fn group_prefix(fingerprint: &str) -> Vec<u8> {
    let quoted = serde_json::Value::String(fingerprint.to_owned());
    format!("{{\"fingerprint\": {quoted}, \"certificates\": [").into_bytes()
}

/// Strip trailing ASCII whitespace, including the line terminator.
#[must_use]
pub fn trim_record(raw: &[u8]) -> &[u8] {
    raw.trim_ascii_end()
}

/// Encode a complete group from its records, in order.
///
/// Used by the memory-resident writer, and produces the same bytes the
/// disk-resident writer ends up with after its appends.
pub fn encode_group<'a, I>(fingerprint: &str, records: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut out = group_prefix(fingerprint);
    for (i, record) in records.into_iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(RECORD_SEPARATOR);
        }
        out.extend_from_slice(trim_record(record));
    }
    out.extend_from_slice(CLOSING_SENTINEL);
    out
}

/// A duplicate group read back from an output file.
#[derive(Debug, Deserialize)]
pub struct DuplicateGroup {
    pub fingerprint: String,
    pub certificates: Vec<Box<RawValue>>,
}

impl DuplicateGroup {
    /// Number of records in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }
}

/// Read every group from an output file.
pub fn read_groups<P: AsRef<Path>>(path: P) -> Result<Vec<DuplicateGroup>> {
    let reader = BufReader::new(File::open(path)?);
    let mut groups = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        groups.push(serde_json::from_str(&line)?);
    }

    Ok(groups)
}
