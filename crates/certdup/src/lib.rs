//! # certdup
//!
//! Groups certificate-transparency log records that share a certificate
//! fingerprint.
//!
//! The input is newline-delimited JSON, one log entry per line. Each record's
//! fingerprint is read from `data.leaf_cert.fingerprint`. For every
//! fingerprint seen two or more times, one output line is written:
//!
//! ```text
//! {"fingerprint": "AB:CD:...", "certificates": [<record>,<record>,...]}
//! ```
//!
//! Records are copied byte for byte from the input (minus trailing
//! whitespace), never re-serialized.
//!
//! ## Architecture
//!
//! ```text
//! input.jsonlines
//!       |
//!       v
//! RecordScanner ---> extract_fingerprint ---> index observe()
//!                                                 |
//!                   +-----------------------------+-----------------------------+
//!                   | Strategy::Disk                                             | Strategy::Memory
//!                   v                                                            v
//!       DiskResidentWriter                                          MemoryResidentWriter
//!       (group file per fingerprint,                                (all locations kept,
//!        appended during the scan)                                   written after the scan)
//!                   |                                                            |
//!                   v                                                            v
//!             merge_groups                                                write groups
//!                   \                                                           /
//!                    +------------------> output.partial -> output <-----------+
//! ```
//!
//! Both strategies re-read earlier records from the input by byte offset
//! through a [`LookbackReader`] instead of caching record contents.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use certdup::{DedupConfig, Deduplicator, Strategy};
//!
//! let config = DedupConfig::new("ctl_records.jsonlines")
//!     .with_output_dir("output")
//!     .with_strategy(Strategy::Memory);
//!
//! let stats = Deduplicator::new(config).run().unwrap();
//! println!("{} groups written", stats.groups_written);
//! ```

pub mod config;
pub mod disk;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod group;
pub mod index;
pub mod memory;
pub mod progress;
pub mod scanner;
pub mod workspace;

pub use config::{DedupConfig, MalformedPolicy, Strategy};
pub use disk::{append_to_group, merge_groups, open_group, DiskResidentWriter};
pub use engine::{deduplicate, DedupStats, Deduplicator};
pub use error::{DedupError, ExtractError, Result};
pub use fingerprint::{extract_fingerprint, FINGERPRINT_PATH};
pub use group::{read_groups, DuplicateGroup, CLOSING_SENTINEL};
pub use index::{DiskAction, DiskEntry, DiskIndex, GroupFile, MemoryIndex, Occurrence};
pub use memory::{MemoryResidentWriter, WriteSummary};
pub use progress::{NoopReporter, Phase, ProgressReporter, TracingReporter};
pub use scanner::{LookbackReader, Record, RecordScanner, SourceLocation, MAX_RECORD_LEN};
