//! Line scanning and look-back reads over the input log.
//!
//! The scanner walks the input one line at a time and reports where each
//! line lives in the file. Records are never cached: when a writer needs an
//! earlier record it re-reads the stored byte range through a
//! [`LookbackReader`].

use crate::error::{DedupError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Byte range of one record inside the input file.
///
/// `length` includes the line terminator when one is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub offset: u64,
    pub length: u32,
}

impl SourceLocation {
    /// Create a new location.
    #[must_use]
    pub fn new(offset: u64, length: u32) -> Self {
        Self { offset, length }
    }

    /// Offset one past the last byte of the record.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.length)
    }
}

/// One scanned line: where it came from and its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub location: SourceLocation,
    pub bytes: Vec<u8>,
}

/// Longest line, terminator included, that a [`SourceLocation`] can describe.
pub const MAX_RECORD_LEN: u32 = u32::MAX;

/// Forward-only line scanner.
///
/// Holds at most one line in memory. Whitespace-only lines are skipped but
/// still advance the offset, so locations always match the file.
///
/// A line is read at most one byte past the record limit before it is
/// rejected, so an oversized line never costs more than the limit in memory.
pub struct RecordScanner<R> {
    reader: R,
    offset: u64,
    lines_read: u64,
    max_record_len: u32,
}

impl RecordScanner<BufReader<File>> {
    /// Open a file for scanning.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> RecordScanner<R> {
    /// Scan from an already-buffered reader positioned at offset zero.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            lines_read: 0,
            max_record_len: MAX_RECORD_LEN,
        }
    }

    /// Reject lines longer than `limit` bytes, terminator included.
    #[must_use]
    pub fn with_max_record_len(mut self, limit: u32) -> Self {
        self.max_record_len = limit;
        self
    }

    /// Byte offset of the next unread line.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of physical lines consumed so far, blank lines included.
    #[must_use]
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let limit = u64::from(self.max_record_len);
            let consumed = (&mut self.reader)
                .take(limit + 1)
                .read_until(b'\n', &mut buf)?;
            if consumed == 0 {
                return Ok(None);
            }

            let offset = self.offset;
            let length = u32::try_from(consumed)
                .ok()
                .filter(|&length| length <= self.max_record_len)
                .ok_or(DedupError::RecordTooLarge { offset, limit })?;

            self.offset += consumed as u64;
            self.lines_read += 1;

            if buf.trim_ascii().is_empty() {
                continue;
            }

            return Ok(Some(Record {
                location: SourceLocation::new(offset, length),
                bytes: buf,
            }));
        }
    }
}

impl<R: BufRead> Iterator for RecordScanner<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Random-access reader for re-reading earlier records by location.
///
/// Uses its own read-only handle, independent of the scanner's.
pub struct LookbackReader<R> {
    inner: R,
}

impl LookbackReader<File> {
    /// Open the input file for look-back reads.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read + Seek> LookbackReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the exact bytes of a record.
    pub fn read(&mut self, location: SourceLocation) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; location.length as usize];
        self.read_into(location, &mut buf)?;
        Ok(buf)
    }

    /// Read a record into a caller-owned buffer, resizing it to fit.
    pub fn read_into(&mut self, location: SourceLocation, buf: &mut Vec<u8>) -> Result<()> {
        buf.resize(location.length as usize, 0);
        self.inner.seek(SeekFrom::Start(location.offset))?;
        self.inner.read_exact(buf)?;
        Ok(())
    }
}
