//! Memory-resident group construction.
//!
//! Every location of every fingerprint is kept until the scan ends. Groups
//! are then written in one pass, each record re-read from the input by
//! offset. No temporary files are needed, at the cost of memory that grows
//! with the number of records.

use crate::error::Result;
use crate::group::{group_prefix, trim_record, CLOSING_SENTINEL, RECORD_SEPARATOR};
use crate::index::{MemoryIndex, Occurrence};
use crate::scanner::{LookbackReader, SourceLocation};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

/// Totals from a write pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Groups written.
    pub groups: u64,
    /// Bytes written.
    pub bytes: u64,
}

/// Collects locations during the scan and writes all groups afterwards.
#[derive(Debug, Default)]
pub struct MemoryResidentWriter {
    index: MemoryIndex,
}

impl MemoryResidentWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one scanned occurrence. Nothing is written yet.
    pub fn observe(&mut self, fingerprint: &str, location: SourceLocation) -> Occurrence {
        self.index.observe(fingerprint, location)
    }

    /// The fingerprint index built so far.
    #[must_use]
    pub fn index(&self) -> &MemoryIndex {
        &self.index
    }

    /// Write every duplicated fingerprint's group to `out`, in first-seen
    /// order, reading record bytes through `lookback`.
    pub fn write<R, W>(&self, lookback: &mut LookbackReader<R>, out: W) -> Result<WriteSummary>
    where
        R: Read + Seek,
        W: Write,
    {
        let mut out = CountingWriter::new(out);
        let mut summary = WriteSummary::default();
        let mut buf = Vec::new();

        for (fingerprint, locations) in self.index.duplicates() {
            out.write_all(&group_prefix(fingerprint))?;
            for (i, &location) in locations.iter().enumerate() {
                if i > 0 {
                    out.write_all(RECORD_SEPARATOR)?;
                }
                lookback.read_into(location, &mut buf)?;
                out.write_all(trim_record(&buf))?;
            }
            out.write_all(CLOSING_SENTINEL)?;
            summary.groups += 1;
        }

        out.flush()?;
        summary.bytes = out.written;
        Ok(summary)
    }

    /// Write all groups to a new file at `output`, re-reading from `input`.
    pub fn write_to_path(&self, input: &Path, output: &Path) -> Result<WriteSummary> {
        let mut lookback = LookbackReader::open(input)?;
        let out = BufWriter::new(File::create(output)?);
        self.write(&mut lookback, out)
    }
}

struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{encode_group, DuplicateGroup};
    use std::io::Cursor;

    /// Build an in-memory input and the locations of its lines.
    fn input(lines: &[&str]) -> (Vec<u8>, Vec<SourceLocation>) {
        let mut data = Vec::new();
        let mut locations = Vec::new();
        for line in lines {
            locations.push(SourceLocation::new(data.len() as u64, line.len() as u32));
            data.extend_from_slice(line.as_bytes());
        }
        (data, locations)
    }

    #[test]
    fn test_write_groups_in_first_seen_order() {
        let (data, locs) = input(&["{\"i\":0}\n", "{\"i\":1}\n", "{\"i\":2}\n", "{\"i\":3}\n", "{\"i\":4}"]);
        let mut writer = MemoryResidentWriter::new();
        for (fp, &loc) in ["B", "A", "B", "A", "B"].iter().zip(&locs) {
            writer.observe(fp, loc);
        }

        let mut lookback = LookbackReader::new(Cursor::new(data));
        let mut out = Vec::new();
        let summary = writer.write(&mut lookback, &mut out).unwrap();

        assert_eq!(summary.groups, 2);
        assert_eq!(summary.bytes, out.len() as u64);

        let lines: Vec<DuplicateGroup> = out
            .split(|&b| b == b'\n')
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_slice(l).unwrap())
            .collect();
        assert_eq!(lines[0].fingerprint, "B");
        assert_eq!(lines[0].len(), 3);
        assert_eq!(lines[0].certificates[2].get(), "{\"i\":4}");
        assert_eq!(lines[1].fingerprint, "A");
        assert_eq!(lines[1].len(), 2);
    }

    #[test]
    fn test_write_matches_encode_group() {
        let (data, locs) = input(&["1\n", "2\n", "3\n"]);
        let mut writer = MemoryResidentWriter::new();
        for &loc in &locs {
            writer.observe("X", loc);
        }

        let mut out = Vec::new();
        writer
            .write(&mut LookbackReader::new(Cursor::new(data)), &mut out)
            .unwrap();

        let records: [&[u8]; 3] = [b"1", b"2", b"3"];
        assert_eq!(out, encode_group("X", records));
    }

    #[test]
    fn test_write_skips_singletons() {
        let (data, locs) = input(&["1\n", "2\n"]);
        let mut writer = MemoryResidentWriter::new();
        writer.observe("A", locs[0]);
        writer.observe("B", locs[1]);

        let mut out = Vec::new();
        let summary = writer
            .write(&mut LookbackReader::new(Cursor::new(data)), &mut out)
            .unwrap();

        assert_eq!(summary, WriteSummary::default());
        assert!(out.is_empty());
    }
}
