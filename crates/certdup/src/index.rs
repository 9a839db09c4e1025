//! Fingerprint indexes for the two writing strategies.
//!
//! Both indexes classify each observation the same way (see [`Occurrence`]):
//! the first sighting only records state, the second materializes a group
//! with the first record re-read from disk, and later ones append.
//!
//! - [`DiskIndex`] keeps one small entry per fingerprint and hands the writer
//!   the group file it should touch.
//! - [`MemoryIndex`] keeps every location of every fingerprint, in first-seen
//!   order, for a single write pass after the scan.

use crate::scanner::SourceLocation;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File extension of per-fingerprint group files.
pub const GROUP_FILE_EXTENSION: &str = "jsonline";

/// How a fingerprint's history changed after one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// Seen for the first time. Nothing to write yet.
    First,
    /// Seen for the second time. The first record must now be written too.
    Second,
    /// Third or later sighting. Append to the existing group.
    Repeat,
}

// =============================================================================
// Disk-resident index
// =============================================================================

/// A group file that has been written at least once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFile {
    /// Per-fingerprint output file. Fixed once assigned.
    pub path: PathBuf,
    /// Length of the file after the last write.
    pub cursor: u64,
}

/// Per-fingerprint state for the disk-resident strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskEntry {
    /// Only one occurrence so far; nothing has been written.
    FirstSeen { first: SourceLocation },
    /// A group file exists for this fingerprint, at this position in
    /// [`DiskIndex::groups`].
    Flushed { group: usize },
}

/// What the disk writer must do for the record just observed.
#[derive(Debug, PartialEq, Eq)]
pub enum DiskAction<'a> {
    /// First occurrence: nothing to write.
    Hold,
    /// Second occurrence: create `group.path` holding `first` and the
    /// current record, then set `group.cursor`.
    Open {
        first: SourceLocation,
        group: &'a mut GroupFile,
    },
    /// Later occurrence: append the current record to `group`.
    Append { group: &'a mut GroupFile },
}

impl DiskAction<'_> {
    #[must_use]
    pub fn occurrence(&self) -> Occurrence {
        match self {
            DiskAction::Hold => Occurrence::First,
            DiskAction::Open { .. } => Occurrence::Second,
            DiskAction::Append { .. } => Occurrence::Repeat,
        }
    }
}

/// Fingerprint index for the disk-resident strategy.
///
/// Memory use is one entry per unique fingerprint regardless of how many
/// times it repeats. Group files are kept in the order they were opened.
#[derive(Debug)]
pub struct DiskIndex {
    entries: HashMap<String, DiskEntry>,
    groups: Vec<GroupFile>,
    group_dir: PathBuf,
}

impl DiskIndex {
    /// Create an index whose group files live in `group_dir`.
    pub fn new(group_dir: impl AsRef<Path>) -> Self {
        Self {
            entries: HashMap::new(),
            groups: Vec::new(),
            group_dir: group_dir.as_ref().to_path_buf(),
        }
    }

    /// Record one occurrence of `fingerprint` found at `location`.
    pub fn observe(&mut self, fingerprint: &str, location: SourceLocation) -> DiskAction<'_> {
        let Some(entry) = self.entries.get_mut(fingerprint) else {
            self.entries.insert(
                fingerprint.to_owned(),
                DiskEntry::FirstSeen { first: location },
            );
            return DiskAction::Hold;
        };

        match *entry {
            DiskEntry::FirstSeen { first } => {
                let slot = self.groups.len();
                *entry = DiskEntry::Flushed { group: slot };
                // Named by counter so the fingerprint text never reaches the filesystem
                let path = group_file_path(&self.group_dir, slot as u64 + 1);
                self.groups.push(GroupFile { path, cursor: 0 });
                DiskAction::Open {
                    first,
                    group: &mut self.groups[slot],
                }
            }
            DiskEntry::Flushed { group } => DiskAction::Append {
                group: &mut self.groups[group],
            },
        }
    }

    /// Look up the current state of a fingerprint.
    #[must_use]
    pub fn get(&self, fingerprint: &str) -> Option<&DiskEntry> {
        self.entries.get(fingerprint)
    }

    /// The group file of a flushed fingerprint.
    #[must_use]
    pub fn group(&self, fingerprint: &str) -> Option<&GroupFile> {
        match self.entries.get(fingerprint)? {
            DiskEntry::FirstSeen { .. } => None,
            DiskEntry::Flushed { group } => self.groups.get(*group),
        }
    }

    /// Number of distinct fingerprints seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Group files in the order they were opened.
    #[must_use]
    pub fn groups(&self) -> &[GroupFile] {
        &self.groups
    }

    /// Number of fingerprints that have a group file.
    #[must_use]
    pub fn groups_opened(&self) -> u64 {
        self.groups.len() as u64
    }

    /// Group file paths in the order their groups were opened.
    pub fn group_paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.groups.iter().map(|group| group.path.as_path())
    }
}

/// Path of the `n`th group file inside `dir`.
#[must_use]
pub fn group_file_path(dir: &Path, n: u64) -> PathBuf {
    dir.join(format!("{n}.{GROUP_FILE_EXTENSION}"))
}

// =============================================================================
// Memory-resident index
// =============================================================================

/// Fingerprint index for the memory-resident strategy.
///
/// Insertion order is first-seen order, so the write pass is deterministic.
/// Each fingerprint is stored once, as the map key.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    entries: IndexMap<String, Vec<SourceLocation>>,
    duplicated: usize,
}

impl MemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `fingerprint` found at `location`.
    pub fn observe(&mut self, fingerprint: &str, location: SourceLocation) -> Occurrence {
        match self.entries.get_mut(fingerprint) {
            Some(locations) => {
                locations.push(location);
                if locations.len() == 2 {
                    self.duplicated += 1;
                    Occurrence::Second
                } else {
                    Occurrence::Repeat
                }
            }
            None => {
                self.entries.insert(fingerprint.to_owned(), vec![location]);
                Occurrence::First
            }
        }
    }

    /// All recorded locations for a fingerprint, in input order.
    #[must_use]
    pub fn locations(&self, fingerprint: &str) -> Option<&[SourceLocation]> {
        self.entries.get(fingerprint).map(Vec::as_slice)
    }

    /// Fingerprints with two or more occurrences, in first-seen order.
    pub fn duplicates(&self) -> impl Iterator<Item = (&str, &[SourceLocation])> {
        self.entries
            .iter()
            .filter(|(_, locations)| locations.len() > 1)
            .map(|(fingerprint, locations)| (fingerprint.as_str(), locations.as_slice()))
    }

    /// Number of distinct fingerprints seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of fingerprints with two or more occurrences.
    #[must_use]
    pub fn duplicated_fingerprints(&self) -> usize {
        self.duplicated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(offset: u64) -> SourceLocation {
        SourceLocation::new(offset, 10)
    }

    #[test]
    fn test_disk_index_three_way() {
        let mut index = DiskIndex::new("/tmp/groups");

        assert_eq!(index.observe("A", loc(0)), DiskAction::Hold);
        assert_eq!(index.observe("B", loc(10)).occurrence(), Occurrence::First);

        match index.observe("A", loc(20)) {
            DiskAction::Open { first, group } => {
                assert_eq!(first, loc(0));
                assert_eq!(group.path, PathBuf::from("/tmp/groups/1.jsonline"));
                group.cursor = 99;
            }
            other => panic!("Expected Open, got {other:?}"),
        }

        match index.observe("A", loc(30)) {
            DiskAction::Append { group } => assert_eq!(group.cursor, 99),
            other => panic!("Expected Append, got {other:?}"),
        }

        assert_eq!(index.len(), 2);
        assert_eq!(index.groups_opened(), 1);
    }

    #[test]
    fn test_disk_index_state_transitions() {
        let mut index = DiskIndex::new("g");
        index.observe("X", loc(5));
        assert_eq!(
            index.get("X"),
            Some(&DiskEntry::FirstSeen { first: loc(5) })
        );

        index.observe("X", loc(15));
        assert_eq!(index.get("X"), Some(&DiskEntry::Flushed { group: 0 }));
        assert!(index.get("missing").is_none());
    }

    #[test]
    fn test_disk_index_paths_by_counter() {
        let mut index = DiskIndex::new("g");
        for fp in ["../evil", "B", "../evil", "B", "C"] {
            index.observe(fp, loc(0));
        }

        let paths: Vec<_> = index.group_paths().map(Path::to_path_buf).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("g/1.jsonline"), PathBuf::from("g/2.jsonline")]
        );
    }

    #[test]
    fn test_disk_index_group_keeps_cursor() {
        let mut index = DiskIndex::new("g");
        index.observe("A", loc(0));
        index.observe("B", loc(10));
        assert!(index.group("A").is_none());

        for (fp, cursor) in [("B", 40), ("A", 70), ("B", 55)] {
            match index.observe(fp, loc(0)) {
                DiskAction::Open { group, .. } | DiskAction::Append { group } => {
                    group.cursor = cursor
                }
                DiskAction::Hold => panic!("Expected a group for {fp}"),
            }
        }

        assert_eq!(index.group("B").unwrap().cursor, 55);
        assert_eq!(index.group("B").unwrap().path, PathBuf::from("g/1.jsonline"));
        assert_eq!(index.group("A").unwrap().cursor, 70);
        assert_eq!(index.groups().len(), 2);
        assert!(index.group("missing").is_none());
    }

    #[test]
    fn test_memory_index_three_way() {
        let mut index = MemoryIndex::new();

        assert_eq!(index.observe("A", loc(0)), Occurrence::First);
        assert_eq!(index.observe("B", loc(10)), Occurrence::First);
        assert_eq!(index.observe("A", loc(20)), Occurrence::Second);
        assert_eq!(index.observe("A", loc(30)), Occurrence::Repeat);

        assert_eq!(index.locations("A").unwrap(), &[loc(0), loc(20), loc(30)]);
        assert_eq!(index.duplicated_fingerprints(), 1);
    }

    #[test]
    fn test_memory_index_duplicates_first_seen_order() {
        let mut index = MemoryIndex::new();
        for (i, fp) in ["C", "A", "B", "A", "C", "D"].iter().enumerate() {
            index.observe(fp, loc(i as u64 * 10));
        }

        let dups: Vec<_> = index.duplicates().map(|(fp, locs)| (fp, locs.len())).collect();
        assert_eq!(dups, vec![("C", 2), ("A", 2)]);
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_memory_index_order_survives_late_repeats() {
        let mut index = MemoryIndex::new();
        // Z repeats last but was seen first; Y becomes a duplicate first
        for (i, fp) in ["Z", "Y", "X", "Y", "X", "Z", "Y"].iter().enumerate() {
            index.observe(fp, loc(i as u64 * 10));
        }

        let order: Vec<_> = index.duplicates().map(|(fp, _)| fp).collect();
        assert_eq!(order, vec!["Z", "Y", "X"]);
        assert_eq!(index.locations("Y").unwrap(), &[loc(10), loc(30), loc(60)]);
        assert_eq!(index.duplicated_fingerprints(), 3);
    }
}
