//! Disk-resident group construction.
//!
//! Each duplicated fingerprint gets its own group file, created when its
//! second occurrence is scanned and extended in place for every later one.
//! After the scan, [`merge_groups`] concatenates the files into the output.
//!
//! An append never rewrites earlier bytes: it seeks back over the
//! [`CLOSING_SENTINEL`] at the end of the file and writes a separator, the
//! new record, and a fresh sentinel. The file is a complete group line after
//! every write.

use crate::error::Result;
use crate::group::{encode_group, trim_record, CLOSING_SENTINEL, RECORD_SEPARATOR};
use crate::index::{DiskAction, DiskIndex, Occurrence};
use crate::scanner::{LookbackReader, Record};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const SENTINEL_LEN: u64 = CLOSING_SENTINEL.len() as u64;

/// Builds duplicate groups in per-fingerprint files while the input is scanned.
pub struct DiskResidentWriter {
    index: DiskIndex,
    lookback: LookbackReader<File>,
}

impl DiskResidentWriter {
    /// Create a writer reading look-backs from `input` and writing group
    /// files into `group_dir`, which must already exist.
    pub fn new(input: impl AsRef<Path>, group_dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            index: DiskIndex::new(group_dir),
            lookback: LookbackReader::open(input)?,
        })
    }

    /// Handle one scanned record.
    ///
    /// On the second occurrence the first record is re-read from the input
    /// and both are written to a new group file. Later occurrences are
    /// appended to that file.
    pub fn observe(&mut self, fingerprint: &str, record: &Record) -> Result<Occurrence> {
        let action = self.index.observe(fingerprint, record.location);
        let occurrence = action.occurrence();

        match action {
            DiskAction::Hold => {}
            DiskAction::Open { first, group } => {
                let first_bytes = self.lookback.read(first)?;
                group.cursor = open_group(&group.path, fingerprint, &first_bytes, &record.bytes)?;
                debug!(path = %group.path.display(), "Opened group file");
            }
            DiskAction::Append { group } => {
                group.cursor = append_to_group(&group.path, group.cursor, &record.bytes)?;
            }
        }

        Ok(occurrence)
    }

    /// The fingerprint index built so far.
    #[must_use]
    pub fn index(&self) -> &DiskIndex {
        &self.index
    }

    /// Group file paths in creation order.
    #[must_use]
    pub fn group_paths(&self) -> Vec<PathBuf> {
        self.index.group_paths().map(Path::to_path_buf).collect()
    }
}

/// Create a group file holding its first two records.
///
/// Returns the file length, which is the cursor for the next append.
pub fn open_group(path: &Path, fingerprint: &str, first: &[u8], second: &[u8]) -> Result<u64> {
    let bytes = encode_group(fingerprint, [first, second]);
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    Ok(bytes.len() as u64)
}

/// Append one record to a group file whose current length is `cursor`.
///
/// Returns the new file length.
pub fn append_to_group(path: &Path, cursor: u64, record: &[u8]) -> Result<u64> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;

    let sentinel_at = cursor.checked_sub(SENTINEL_LEN).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("group file {} is shorter than its sentinel", path.display()),
        )
    })?;
    file.seek(SeekFrom::Start(sentinel_at))?;

    let mut tail = [0u8; CLOSING_SENTINEL.len()];
    file.read_exact(&mut tail)?;
    if &tail != CLOSING_SENTINEL {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "group file {} does not end with the closing sentinel at offset {sentinel_at}",
                path.display()
            ),
        )
        .into());
    }

    let record = trim_record(record);
    let mut bytes = Vec::with_capacity(RECORD_SEPARATOR.len() + record.len() + CLOSING_SENTINEL.len());
    bytes.extend_from_slice(RECORD_SEPARATOR);
    bytes.extend_from_slice(record);
    bytes.extend_from_slice(CLOSING_SENTINEL);

    file.seek(SeekFrom::Start(sentinel_at))?;
    file.write_all(&bytes)?;
    Ok(file.stream_position()?)
}

/// Concatenate group files, in order, into `output`.
///
/// Bytes are copied without parsing. Returns the number of bytes written.
pub fn merge_groups<I, P>(groups: I, output: &Path) -> Result<u64>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut writer = BufWriter::new(File::create(output)?);
    let mut total = 0u64;

    for group in groups {
        let mut file = File::open(group.as_ref())?;
        total += io::copy(&mut file, &mut writer)?;
    }

    writer.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::DuplicateGroup;
    use crate::scanner::SourceLocation;
    use std::fs;
    use tempfile::TempDir;

    fn parse(path: &Path) -> DuplicateGroup {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_open_group_layout() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("1.jsonline");

        let cursor = open_group(&path, "FP", b"{\"n\":1}\n", b"{\"n\":2}\r\n").unwrap();

        let content = fs::read(&path).unwrap();
        assert_eq!(cursor, content.len() as u64);
        assert_eq!(
            content,
            b"{\"fingerprint\": \"FP\", \"certificates\": [{\"n\":1},{\"n\":2}]}\n"
        );
    }

    #[test]
    fn test_append_after_two_records() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("1.jsonline");

        let cursor = open_group(&path, "FP", b"{\"n\":1}\n", b"{\"n\":2}\n").unwrap();
        let cursor = append_to_group(&path, cursor, b"{\"n\":3}\n").unwrap();

        let content = fs::read(&path).unwrap();
        assert_eq!(cursor, content.len() as u64);
        assert!(content.ends_with(CLOSING_SENTINEL));

        let group = parse(&path);
        assert_eq!(group.len(), 3);
        assert_eq!(group.certificates[2].get(), "{\"n\":3}");
    }

    #[test]
    fn test_append_after_three_records() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("1.jsonline");

        let mut cursor = open_group(&path, "FP", b"1", b"2").unwrap();
        cursor = append_to_group(&path, cursor, b"3").unwrap();
        cursor = append_to_group(&path, cursor, b"4\n").unwrap();

        let content = fs::read(&path).unwrap();
        assert_eq!(cursor, content.len() as u64);
        assert_eq!(
            content,
            b"{\"fingerprint\": \"FP\", \"certificates\": [1,2,3,4]}\n"
        );
    }

    #[test]
    fn test_append_rejects_wrong_cursor() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("1.jsonline");
        let cursor = open_group(&path, "FP", b"1", b"2").unwrap();

        assert!(append_to_group(&path, cursor - 1, b"3").is_err());
        assert!(append_to_group(&path, 2, b"3").is_err());
        // File untouched by rejected appends
        assert_eq!(parse(&path).len(), 2);
    }

    #[test]
    fn test_writer_builds_groups() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("input.jsonl");
        let groups = temp.path().join("groups");
        fs::create_dir(&groups).unwrap();

        let lines = ["{\"id\":0}\n", "{\"id\":1}\n", "{\"id\":2}\n", "{\"id\":3}\n"];
        fs::write(&input, lines.concat()).unwrap();

        let mut offset = 0u64;
        let records: Vec<Record> = lines
            .iter()
            .map(|line| {
                let record = Record {
                    location: SourceLocation::new(offset, line.len() as u32),
                    bytes: line.as_bytes().to_vec(),
                };
                offset += line.len() as u64;
                record
            })
            .collect();

        let mut writer = DiskResidentWriter::new(&input, &groups).unwrap();
        let fps = ["A", "B", "A", "A"];
        let occurrences: Vec<_> = fps
            .iter()
            .zip(&records)
            .map(|(fp, record)| writer.observe(fp, record).unwrap())
            .collect();

        assert_eq!(
            occurrences,
            vec![
                Occurrence::First,
                Occurrence::First,
                Occurrence::Second,
                Occurrence::Repeat
            ]
        );

        let paths = writer.group_paths();
        assert_eq!(paths.len(), 1);
        let group = parse(&paths[0]);
        assert_eq!(group.fingerprint, "A");
        let ids: Vec<_> = group.certificates.iter().map(|c| c.get()).collect();
        assert_eq!(ids, vec!["{\"id\":0}", "{\"id\":2}", "{\"id\":3}"]);
    }

    #[test]
    fn test_merge_groups() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("1.jsonline");
        let b = temp.path().join("2.jsonline");
        open_group(&a, "A", b"1", b"2").unwrap();
        open_group(&b, "B", b"3", b"4").unwrap();

        let output = temp.path().join("merged");
        let written = merge_groups([&a, &b], &output).unwrap();

        let merged = fs::read(&output).unwrap();
        assert_eq!(written, merged.len() as u64);
        let mut expected = fs::read(&a).unwrap();
        expected.extend(fs::read(&b).unwrap());
        assert_eq!(merged, expected);
    }

    #[test]
    fn test_merge_no_groups() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("merged");

        let written = merge_groups(Vec::<PathBuf>::new(), &output).unwrap();

        assert_eq!(written, 0);
        assert_eq!(fs::read(&output).unwrap().len(), 0);
    }
}
